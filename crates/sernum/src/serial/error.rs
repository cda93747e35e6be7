use core::fmt;

/// Reasons a string is not a well-formed serial number for a given
/// [`SerialFormat`].
///
/// Positions are zero-based byte offsets into the rejected input.
///
/// [`SerialFormat`]: crate::SerialFormat
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerialError {
    InvalidLen { len: usize, expected: usize },
    InvalidSeparator { byte: u8, index: usize },
    InvalidCharacter { byte: u8, index: usize },
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLen { len, expected } => {
                write!(f, "invalid length: {len} (expected {expected})")
            }
            Self::InvalidSeparator { byte, index } => {
                write!(f, "expected separator at {index}, found byte {byte:#04x}")
            }
            Self::InvalidCharacter { byte, index } => {
                write!(f, "invalid character {byte:#04x} at {index}")
            }
        }
    }
}

impl core::error::Error for SerialError {}
