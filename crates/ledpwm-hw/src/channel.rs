//! Channel configuration model and its 48-byte wire layout.
//!
//! Layout: 4 consecutive records of `(enabled, duty_cycle, period)`, each field
//! a little-endian `i32`, in channel-index order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of LED channels.
pub const CHANNEL_COUNT: usize = 4;

/// Size of one field on the wire.
const FIELD_SIZE: usize = 4;

/// Size of one channel record on the wire.
pub const RECORD_SIZE: usize = 3 * FIELD_SIZE;

/// Size of a full channel table on the wire.
pub const TABLE_SIZE: usize = CHANNEL_COUNT * RECORD_SIZE;

/// Index of one LED channel, always in `0..CHANNEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Creates a channel id, rejecting indices outside the channel range.
    pub fn new(index: usize) -> Result<Self> {
        if index < CHANNEL_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidChannel(index as i64))
        }
    }

    /// Returns the zero-based index.
    pub fn index(self) -> usize {
        self.0
    }

    /// Iterates over every channel in index order.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..CHANNEL_COUNT).map(ChannelId)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value as usize)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LED{}", self.0)
    }
}

/// Configuration of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// When false the output is forced off.
    pub enabled: bool,
    /// Percentage of the period spent on (0-100).
    pub duty_cycle: i32,
    /// Full on+off cycle length in milliseconds.
    pub period: i32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: true,
            duty_cycle: 50,
            period: 1000,
        }
    }
}

impl ChannelState {
    /// Creates a channel state.
    pub fn new(enabled: bool, duty_cycle: i32, period: i32) -> Self {
        Self {
            enabled,
            duty_cycle,
            period,
        }
    }

    /// Returns the value of one field as it appears on the wire.
    pub fn get(&self, field: Field) -> i32 {
        match field {
            Field::OnOff => self.enabled as i32,
            Field::DutyCycle => self.duty_cycle,
            Field::Period => self.period,
        }
    }

    /// Sets one field from its wire value.
    pub fn set(&mut self, field: Field, value: i32) {
        match field {
            Field::OnOff => self.enabled = value != 0,
            Field::DutyCycle => self.duty_cycle = value,
            Field::Period => self.period = value,
        }
    }

    fn encode_into(&self, out: &mut [u8]) {
        for (field, chunk) in Field::ALL.iter().zip(out.chunks_exact_mut(FIELD_SIZE)) {
            chunk.copy_from_slice(&self.get(*field).to_le_bytes());
        }
    }

    fn decode(record: &[u8]) -> Self {
        let mut state = Self::new(false, 0, 0);
        for (field, chunk) in Field::ALL.iter().zip(record.chunks_exact(FIELD_SIZE)) {
            let value = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            state.set(*field, value);
        }
        state
    }
}

/// Selector for one field of a channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Field {
    /// Enabled flag.
    OnOff = 0,
    /// Duty cycle percentage.
    DutyCycle = 1,
    /// Period in milliseconds.
    Period = 2,
}

impl Field {
    /// Fields in wire order.
    pub const ALL: [Field; 3] = [Field::OnOff, Field::DutyCycle, Field::Period];

    /// Converts a selector byte to a field.
    pub fn from_byte(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Field::OnOff),
            1 => Ok(Field::DutyCycle),
            2 => Ok(Field::Period),
            _ => Err(Error::InvalidField(value.to_string())),
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "on" | "onoff" | "enabled" => Ok(Field::OnOff),
            "duty" | "duty_cycle" | "duty-cycle" => Ok(Field::DutyCycle),
            "period" => Ok(Field::Period),
            _ => Err(Error::InvalidField(s.to_string())),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::OnOff => write!(f, "on/off"),
            Field::DutyCycle => write!(f, "duty cycle"),
            Field::Period => write!(f, "period"),
        }
    }
}

/// State of every channel, indexed by channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelTable {
    channels: [ChannelState; CHANNEL_COUNT],
}

impl ChannelTable {
    /// Creates a table from per-channel states.
    pub fn new(channels: [ChannelState; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Creates a table with every channel set to the same state.
    pub fn uniform(state: ChannelState) -> Self {
        Self::new([state; CHANNEL_COUNT])
    }

    /// Returns the state of one channel.
    pub fn channel(&self, id: ChannelId) -> ChannelState {
        self.channels[id.index()]
    }

    /// Returns a mutable reference to one channel.
    pub fn channel_mut(&mut self, id: ChannelId) -> &mut ChannelState {
        &mut self.channels[id.index()]
    }

    /// Returns all channel states in index order.
    pub fn channels(&self) -> &[ChannelState; CHANNEL_COUNT] {
        &self.channels
    }

    /// Serializes the table into its wire layout.
    pub fn to_bytes(&self) -> [u8; TABLE_SIZE] {
        let mut out = [0u8; TABLE_SIZE];
        for (state, record) in self.channels.iter().zip(out.chunks_exact_mut(RECORD_SIZE)) {
            state.encode_into(record);
        }
        out
    }

    /// Deserializes a table from exactly `TABLE_SIZE` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TABLE_SIZE {
            return Err(Error::SizeMismatch {
                expected: TABLE_SIZE,
                actual: bytes.len(),
            });
        }

        let mut channels = [ChannelState::new(false, 0, 0); CHANNEL_COUNT];
        for (state, record) in channels.iter_mut().zip(bytes.chunks_exact(RECORD_SIZE)) {
            *state = ChannelState::decode(record);
        }
        Ok(Self { channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        assert_eq!(TABLE_SIZE, 48);
    }

    #[test]
    fn test_wire_layout() {
        let mut table = ChannelTable::uniform(ChannelState::new(false, 0, 0));
        *table.channel_mut(ChannelId::new(1).unwrap()) = ChannelState::new(true, 25, 0x0102);

        let bytes = table.to_bytes();
        // Channel 1 record starts at byte 12
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[25, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0x02, 0x01, 0, 0]);
        assert!(bytes[..12].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_negative_values_survive() {
        let table = ChannelTable::new([
            ChannelState::new(true, -5, -1),
            ChannelState::new(false, 150, i32::MAX),
            ChannelState::new(true, 0, 0),
            ChannelState::new(true, 100, 2000),
        ]);
        assert_eq!(ChannelTable::from_bytes(&table.to_bytes()).unwrap(), table);
    }

    #[test]
    fn test_nonzero_enabled_decodes_true() {
        let mut bytes = [0u8; TABLE_SIZE];
        bytes[0..4].copy_from_slice(&7i32.to_le_bytes());
        let table = ChannelTable::from_bytes(&bytes).unwrap();
        assert!(table.channel(ChannelId::new(0).unwrap()).enabled);

        // The flag is normalized, so it reads back as 1
        assert_eq!(&table.to_bytes()[0..4], &1i32.to_le_bytes());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_size() {
        assert!(matches!(
            ChannelTable::from_bytes(&[0u8; 47]),
            Err(Error::SizeMismatch {
                expected: 48,
                actual: 47
            })
        ));
        assert!(ChannelTable::from_bytes(&[0u8; 49]).is_err());
    }

    #[test]
    fn test_channel_id_range() {
        assert!(ChannelId::new(3).is_ok());
        assert!(ChannelId::new(4).is_err());
        assert!(ChannelId::try_from(9u8).is_err());
        assert_eq!(ChannelId::all().count(), CHANNEL_COUNT);
    }

    #[test]
    fn test_field_parse() {
        assert_eq!("duty".parse::<Field>().unwrap(), Field::DutyCycle);
        assert_eq!("ON".parse::<Field>().unwrap(), Field::OnOff);
        assert_eq!("period".parse::<Field>().unwrap(), Field::Period);
        assert!("brightness".parse::<Field>().is_err());
        assert!(Field::from_byte(3).is_err());
    }

    #[test]
    fn test_field_get_set() {
        let mut state = ChannelState::default();
        state.set(Field::OnOff, 0);
        state.set(Field::Period, 4000);
        assert_eq!(state.get(Field::OnOff), 0);
        assert_eq!(state.get(Field::Period), 4000);
        assert_eq!(state.get(Field::DutyCycle), 50);
    }
}
