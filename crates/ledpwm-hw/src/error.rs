//! Error types for the LED PWM library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving LEDs or accessing the channel table.
#[derive(Error, Debug)]
pub enum Error {
    /// Read or write request whose size is not exactly one channel table.
    #[error("Channel table size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Copy between the caller and the device failed part way.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Channel index outside the fixed channel range.
    #[error("Invalid channel (must be 0-3): {0}")]
    InvalidChannel(i64),

    /// Unknown field selector or field name.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Unknown command frame direction byte.
    #[error("Invalid command direction: {0}")]
    InvalidDirection(u8),

    /// Physical output could not be driven.
    #[error("LED output error on channel {channel}: {source}")]
    Output {
        channel: usize,
        #[source]
        source: std::io::Error,
    },

    /// GPIO chip could not be opened.
    #[error("Failed to open GPIO chip {chip}: {source}")]
    GpioChip {
        chip: String,
        #[source]
        source: gpio_cdev::Error,
    },

    /// GPIO line could not be requested or driven.
    #[error("GPIO error on channel {channel}: {source}")]
    Gpio {
        channel: usize,
        #[source]
        source: gpio_cdev::Error,
    },

    /// I/O error outside of output driving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
