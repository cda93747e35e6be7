use crate::SerialNumber;
use chrono::{DateTime, NaiveDate, Utc};
use core::fmt;

/// Store-assigned identity of a [`SerialRecord`]. Monotonic, never reused
/// while the record exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct RecordId(pub i64);

/// Identity of the user a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct OwnerId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Descriptive fields attached to every serial in a batch.
///
/// Opaque to the allocator; only [`BatchMetadata::validate`] looks inside.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct BatchMetadata {
    pub model_number: String,
    pub quantity: u32,
    pub date_of_manufacturing: NaiveDate,
    pub brazer_name: String,
    pub operator_code: String,
    pub code_a: Option<String>,
    pub code_b: Option<String>,
    pub code_c: Option<String>,
    pub code_d: Option<String>,
}

impl BatchMetadata {
    /// Checks required fields and normalizes the optional codes: surrounding
    /// whitespace is trimmed and blank codes become `None`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first problem found.
    pub fn validate(mut self) -> Result<Self, String> {
        for (name, value) in [
            ("model number", &mut self.model_number),
            ("brazer name", &mut self.brazer_name),
            ("operator code", &mut self.operator_code),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(format!("{name} must not be blank"));
            }
            if trimmed.len() != value.len() {
                *value = trimmed.to_owned();
            }
        }
        if self.quantity == 0 {
            return Err("quantity must be at least 1".to_owned());
        }
        for code in [
            &mut self.code_a,
            &mut self.code_b,
            &mut self.code_c,
            &mut self.code_d,
        ] {
            *code = code
                .take()
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty());
        }
        Ok(self)
    }

    pub fn codes(&self) -> [Option<&str>; 4] {
        [
            self.code_a.as_deref(),
            self.code_b.as_deref(),
            self.code_c.as_deref(),
            self.code_d.as_deref(),
        ]
    }
}

/// A record about to be inserted. The store assigns `id` and `created_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSerialRecord {
    pub serial_number: SerialNumber,
    pub owner_id: OwnerId,
    pub metadata: BatchMetadata,
}

/// A persisted serial.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "camelCase"))]
pub struct SerialRecord {
    pub id: RecordId,
    pub serial_number: SerialNumber,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub metadata: BatchMetadata,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn sample_metadata(model: &str) -> BatchMetadata {
    BatchMetadata {
        model_number: model.to_owned(),
        quantity: 3,
        date_of_manufacturing: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        brazer_name: "R. Osei".to_owned(),
        operator_code: "OP-7".to_owned(),
        code_a: Some("A1".to_owned()),
        code_b: None,
        code_c: None,
        code_d: None,
    }
}
