//! Command frame encoding.
//!
//! Frame layout (10 bytes):
//! - `[0]` direction: 0 = read (request and response), 1 = write
//! - `[1]` channel: 0-3
//! - `[2]` field: 0 = on/off, 1 = duty cycle, 2 = period
//! - `[3..7]` value: little-endian `i32`
//! - `[7..10]` unused

use crate::channel::{ChannelId, Field};
use crate::{Error, Result};

/// Size of a command frame on the wire.
pub const FRAME_SIZE: usize = 10;

/// Frame direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Read = 0,
    Write = 1,
}

impl Direction {
    /// Converts a direction byte.
    pub fn from_byte(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Direction::Read),
            1 => Ok(Direction::Write),
            _ => Err(Error::InvalidDirection(value)),
        }
    }
}

/// Request to read or write one field of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub direction: Direction,
    pub channel: ChannelId,
    pub field: Field,
    /// New value for writes, current value in read responses.
    pub value: i32,
}

impl CommandFrame {
    /// Builds a read request.
    pub fn read(channel: ChannelId, field: Field) -> Self {
        Self {
            direction: Direction::Read,
            channel,
            field,
            value: 0,
        }
    }

    /// Builds a write request.
    pub fn write(channel: ChannelId, field: Field, value: i32) -> Self {
        Self {
            direction: Direction::Write,
            channel,
            field,
            value,
        }
    }

    /// Encodes the frame; unused bytes are zero.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut buffer = [0u8; FRAME_SIZE];
        buffer[0] = self.direction as u8;
        buffer[1] = self.channel.index() as u8;
        buffer[2] = self.field as u8;
        buffer[3..7].copy_from_slice(&self.value.to_le_bytes());
        buffer
    }

    /// Decodes a frame, ignoring the unused bytes.
    pub fn decode(buffer: &[u8; FRAME_SIZE]) -> Result<Self> {
        Ok(Self {
            direction: Direction::from_byte(buffer[0])?,
            channel: ChannelId::try_from(buffer[1])?,
            field: Field::from_byte(buffer[2])?,
            value: i32::from_le_bytes([buffer[3], buffer[4], buffer[5], buffer[6]]),
        })
    }
}
