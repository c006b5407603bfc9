//! Shared channel table.

use crate::channel::{ChannelId, ChannelState, ChannelTable};
use std::sync::{PoisonError, RwLock};

/// Single source of truth for the channel table.
///
/// Every critical section is a copy of the table, so the timer engine never
/// waits behind anything slower than another copy.
#[derive(Debug, Default)]
pub struct ChannelStore {
    table: RwLock<ChannelTable>,
}

impl ChannelStore {
    /// Creates a store holding the given table.
    pub fn new(table: ChannelTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Returns a consistent copy of the whole table.
    pub fn snapshot(&self) -> ChannelTable {
        // The table is plain data; a panicking holder cannot leave it torn.
        *self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a new table atomically.
    pub fn replace(&self, table: ChannelTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    /// Returns the current state of one channel.
    pub fn read_channel(&self, id: ChannelId) -> ChannelState {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .channel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_replace_then_snapshot() {
        let store = ChannelStore::default();
        let table = ChannelTable::new([
            ChannelState::new(true, 10, 100),
            ChannelState::new(false, 20, 200),
            ChannelState::new(true, 30, 300),
            ChannelState::new(false, 40, 400),
        ]);
        store.replace(table);
        assert_eq!(store.snapshot(), table);
        assert_eq!(
            store.read_channel(ChannelId::new(2).unwrap()),
            ChannelState::new(true, 30, 300)
        );
    }

    #[test]
    fn test_concurrent_replace_never_tears() {
        let store = Arc::new(ChannelStore::new(ChannelTable::uniform(ChannelState::new(
            true, 0, 0,
        ))));

        // Each writer installs a table whose every field carries its own tag.
        let writers: Vec<_> = (1..=8)
            .map(|tag| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        store.replace(ChannelTable::uniform(ChannelState::new(true, tag, tag)));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = store.snapshot();
                        let tag = snapshot.channels()[0].duty_cycle;
                        for state in snapshot.channels() {
                            assert_eq!(state.duty_cycle, tag);
                            assert_eq!(state.period, tag);
                        }
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
    }
}
