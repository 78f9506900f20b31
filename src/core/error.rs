use thiserror::Error;

/// Custom error types for the clock core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RTC error: {0}")]
    Rtc(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new RTC error
    pub fn rtc(msg: impl Into<String>) -> Self {
        Error::Rtc(msg.into())
    }

    /// Creates a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Reasons a received DCF77 telegram is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("marker bit {index} does not hold its fixed value")]
    Marker { index: usize },

    #[error("{field} bit {index} is undefined")]
    UndefinedBit { field: &'static str, index: usize },

    #[error("{field} parity mismatch")]
    Parity { field: &'static str },

    #[error("{field} is not a valid BCD value")]
    Bcd { field: &'static str },

    #[error("decoded {field} is out of range")]
    OutOfRange { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("bad band");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad band");
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(DecodeError::Parity { field: "minute" }.to_string(), "minute parity mismatch");
        assert_eq!(
            DecodeError::UndefinedBit { field: "hour", index: 31 }.to_string(),
            "hour bit 31 is undefined"
        );
    }
}
