//! Device interface over the channel table.
//!
//! The device behaves like a character device with a fixed record size:
//! every read returns the whole table and every write replaces it, and any
//! request that is not exactly [`TABLE_SIZE`] bytes is rejected without
//! side effects. Opening creates no per-opener state.

use crate::channel::{ChannelTable, TABLE_SIZE};
use crate::store::ChannelStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Whole-table read/write contract shared by local and remote devices.
pub trait TableDevice {
    /// Copies a snapshot of the table into `buf`, which must be exactly
    /// [`TABLE_SIZE`] bytes long. Returns the number of bytes read.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Replaces the table from `buf`, which must be exactly [`TABLE_SIZE`]
    /// bytes long. Returns the number of bytes written.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Reads and decodes the whole table.
    fn read_table(&self) -> Result<ChannelTable> {
        let mut buf = [0u8; TABLE_SIZE];
        self.read(&mut buf)?;
        ChannelTable::from_bytes(&buf)
    }

    /// Encodes and writes the whole table.
    fn write_table(&self, table: &ChannelTable) -> Result<()> {
        self.write(&table.to_bytes())?;
        Ok(())
    }
}

/// The LED device resource.
#[derive(Clone)]
pub struct LedDevice {
    store: Arc<ChannelStore>,
}

impl LedDevice {
    /// Creates the device on top of a shared store.
    pub fn new(store: Arc<ChannelStore>) -> Self {
        Self { store }
    }

    /// Opens the device. Never fails; every opener sees the same table.
    pub fn open(&self) -> OpenDevice {
        debug!("LED device opened");
        OpenDevice {
            store: self.store.clone(),
        }
    }
}

/// An open handle to the LED device.
#[derive(Clone)]
pub struct OpenDevice {
    store: Arc<ChannelStore>,
}

impl OpenDevice {
    /// Closes the handle. The device stays valid for later opens.
    pub fn close(self) {
        debug!("LED device closed");
    }
}

fn check_size(actual: usize) -> Result<()> {
    if actual != TABLE_SIZE {
        return Err(Error::SizeMismatch {
            expected: TABLE_SIZE,
            actual,
        });
    }
    Ok(())
}

impl TableDevice for OpenDevice {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        check_size(buf.len())?;
        buf.copy_from_slice(&self.store.snapshot().to_bytes());
        debug!("LED device read {} bytes", TABLE_SIZE);
        Ok(TABLE_SIZE)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        check_size(buf.len())?;
        // Decode before touching the store so the lock only covers the swap.
        let table = ChannelTable::from_bytes(buf)?;
        self.store.replace(table);
        debug!("LED device wrote {} bytes", TABLE_SIZE);
        Ok(TABLE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;

    fn device() -> (Arc<ChannelStore>, OpenDevice) {
        let store = Arc::new(ChannelStore::new(ChannelTable::uniform(
            ChannelState::default(),
        )));
        let device = LedDevice::new(store.clone()).open();
        (store, device)
    }

    #[test]
    fn test_read_returns_snapshot() {
        let (store, device) = device();
        let mut buf = [0u8; TABLE_SIZE];
        assert_eq!(device.read(&mut buf).unwrap(), TABLE_SIZE);
        assert_eq!(ChannelTable::from_bytes(&buf).unwrap(), store.snapshot());
    }

    #[test]
    fn test_write_replaces_table() {
        let (store, device) = device();
        let table = ChannelTable::new([
            ChannelState::new(false, 1, 10),
            ChannelState::new(true, 2, 20),
            ChannelState::new(false, 3, 30),
            ChannelState::new(true, 4, 40),
        ]);
        assert_eq!(device.write(&table.to_bytes()).unwrap(), TABLE_SIZE);
        assert_eq!(store.snapshot(), table);
        assert_eq!(device.read_table().unwrap(), table);
    }

    #[test]
    fn test_wrong_size_read_copies_nothing() {
        let (_store, device) = device();
        for size in [0, 12, 47, 49, 96] {
            let mut buf = vec![0xAAu8; size];
            let err = device.read(&mut buf).unwrap_err();
            assert!(matches!(err, Error::SizeMismatch { expected: 48, actual } if actual == size));
            assert!(buf.iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn test_wrong_size_write_leaves_store() {
        let (store, device) = device();
        let before = store.snapshot();
        for size in [0, 1, 47, 49, 480] {
            assert!(device.write(&vec![0u8; size]).is_err());
            assert_eq!(store.snapshot(), before);
        }
    }

    #[test]
    fn test_reopen_after_close() {
        let store = Arc::new(ChannelStore::default());
        let led = LedDevice::new(store);
        let first = led.open();
        first
            .write_table(&ChannelTable::uniform(ChannelState::new(true, 75, 400)))
            .unwrap();
        first.close();

        let second = led.open();
        assert_eq!(
            second.read_table().unwrap(),
            ChannelTable::uniform(ChannelState::new(true, 75, 400))
        );
    }
}
