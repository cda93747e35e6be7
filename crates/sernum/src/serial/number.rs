use crate::{SerialError, SerialFormat};
use core::{fmt, str::FromStr};

/// A serial number that is known to be well formed.
///
/// Values are produced by [`SerialFormat::generate`], by parsing, or by a
/// store loading what it previously accepted. Holding a `SerialNumber` says
/// nothing about whether it has been persisted; the allocator only hands out
/// serials a store has accepted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Parses a serial in the [`SerialFormat::STANDARD`] shape.
    ///
    /// # Errors
    ///
    /// See [`SerialFormat::validate`].
    pub fn parse(s: &str) -> Result<Self, SerialError> {
        SerialFormat::STANDARD.parse(s)
    }

    /// Wraps a value that was validated elsewhere or read back from a store.
    pub(crate) const fn from_trusted(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for SerialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SerialNumber {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for SerialNumber {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SerialNumber {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_uses_standard_format() {
        let serial: SerialNumber = "AB12C-34DE".parse().unwrap();
        assert_eq!(serial, "AB12C-34DE");
        assert_eq!(serial.to_string(), "AB12C-34DE");
        assert!("AB12C34DE".parse::<SerialNumber>().is_err());
    }
}
