use crate::{RandSource, SerialError, SerialNumber};

/// Upper-case ASCII letters followed by the decimal digits.
pub const ALPHANUMERIC: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The shape of a serial number: which symbols may appear, how they are
/// grouped and what separates the groups.
///
/// A serial is a sequence of groups joined by `separator`. Every symbol in
/// every group is drawn independently and uniformly from `alphabet`; there is
/// no checksum or embedded structure, so uniqueness comes entirely from the
/// store rejecting duplicates.
///
/// [`SerialFormat::STANDARD`] is the production shape, `XXXXX-XXXX` over
/// `[A-Z0-9]`. Smaller formats exist so that the candidate space can be made
/// tiny when exercising collision behavior.
///
/// # Example
/// ```
/// use sernum::{SerialFormat, ThreadRandom};
///
/// let serial = SerialFormat::STANDARD.generate(&ThreadRandom);
/// assert_eq!(serial.as_str().len(), 10);
/// assert_eq!(serial.as_str().as_bytes()[5], b'-');
/// assert!(SerialFormat::STANDARD.validate(serial.as_str()).is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialFormat {
    alphabet: &'static [u8],
    groups: &'static [usize],
    separator: u8,
}

impl SerialFormat {
    /// Five symbols, a hyphen, four symbols, over [`ALPHANUMERIC`].
    pub const STANDARD: Self = Self::new(ALPHANUMERIC, &[5, 4], b'-');

    /// Creates a format from its parts.
    ///
    /// # Panics
    ///
    /// Panics if the alphabet or group list is empty, if any group has zero
    /// length, or if the separator is itself part of the alphabet. These are
    /// programming errors; the check runs at compile time when the format is
    /// declared as a `const`.
    pub const fn new(alphabet: &'static [u8], groups: &'static [usize], separator: u8) -> Self {
        assert!(!alphabet.is_empty(), "alphabet must not be empty");
        assert!(!groups.is_empty(), "a format needs at least one group");

        let mut i = 0;
        while i < groups.len() {
            assert!(groups[i] > 0, "groups must not be empty");
            i += 1;
        }

        let mut j = 0;
        while j < alphabet.len() {
            assert!(alphabet[j] != separator, "separator must not be in the alphabet");
            assert!(alphabet[j].is_ascii(), "alphabet must be ASCII");
            j += 1;
        }

        Self {
            alphabet,
            groups,
            separator,
        }
    }

    pub const fn alphabet(&self) -> &'static [u8] {
        self.alphabet
    }

    pub const fn groups(&self) -> &'static [usize] {
        self.groups
    }

    pub const fn separator(&self) -> u8 {
        self.separator
    }

    /// Number of randomly drawn symbols, separators excluded.
    pub fn symbols(&self) -> usize {
        self.groups.iter().sum()
    }

    /// Total length of a formatted serial, separators included.
    pub fn len(&self) -> usize {
        self.symbols() + self.groups.len() - 1
    }

    /// Number of distinct serials this format can express, or `None` if that
    /// does not fit in a `u128`.
    pub fn capacity(&self) -> Option<u128> {
        let symbols = u32::try_from(self.symbols()).ok()?;
        (self.alphabet.len() as u128).checked_pow(symbols)
    }

    /// Draws a fresh candidate. Candidates are not checked against anything;
    /// a candidate only becomes a serial once a store accepts it.
    pub fn generate<R>(&self, rng: &R) -> SerialNumber
    where
        R: RandSource + ?Sized,
    {
        let n = self.alphabet.len();
        let mut out = String::with_capacity(self.len());
        for (g, &width) in self.groups.iter().enumerate() {
            if g > 0 {
                out.push(char::from(self.separator));
            }
            for _ in 0..width {
                // Out-of-range draws wrap rather than index out of bounds.
                let idx = rng.rand_below(n) % n;
                out.push(char::from(self.alphabet[idx]));
            }
        }
        SerialNumber::from_trusted(out)
    }

    /// Checks that `s` has exactly this format's shape.
    ///
    /// # Errors
    ///
    /// Returns the first deviation found, scanning left to right.
    pub fn validate(&self, s: &str) -> Result<(), SerialError> {
        let bytes = s.as_bytes();
        let expected = self.len();
        if bytes.len() != expected {
            return Err(SerialError::InvalidLen {
                len: bytes.len(),
                expected,
            });
        }

        let mut index = 0;
        for (g, &width) in self.groups.iter().enumerate() {
            if g > 0 {
                let byte = bytes[index];
                if byte != self.separator {
                    return Err(SerialError::InvalidSeparator { byte, index });
                }
                index += 1;
            }
            for _ in 0..width {
                let byte = bytes[index];
                if !self.alphabet.contains(&byte) {
                    return Err(SerialError::InvalidCharacter { byte, index });
                }
                index += 1;
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, s: &str) -> bool {
        self.validate(s).is_ok()
    }

    /// Validates `s` and wraps it as a [`SerialNumber`].
    ///
    /// # Errors
    ///
    /// See [`Self::validate`].
    pub fn parse(&self, s: &str) -> Result<SerialNumber, SerialError> {
        self.validate(s)?;
        Ok(SerialNumber::from_trusted(s.to_owned()))
    }
}

impl Default for SerialFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}
