//! Turning records into files people open elsewhere.
//!
//! Exporters are pure transformations: they read a slice of records and write
//! bytes. Choosing records, and where the bytes go, is the caller's business.

mod csv;
#[cfg(feature = "serde")]
mod json;
#[cfg(feature = "pdf")]
mod pdf;
mod text;
#[cfg(feature = "xlsx")]
mod xlsx;

pub use self::csv::*;
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
#[cfg(feature = "serde")]
pub use json::*;
#[cfg_attr(docsrs, doc(cfg(feature = "pdf")))]
#[cfg(feature = "pdf")]
pub use pdf::*;
pub use text::*;
#[cfg_attr(docsrs, doc(cfg(feature = "xlsx")))]
#[cfg(feature = "xlsx")]
pub use xlsx::*;

use crate::SerialRecord;
use chrono::SecondsFormat;
use std::io;

/// Column names of the tabular formats, one per record field.
pub const TABLE_HEADER: [&str; 13] = [
    "id",
    "serialNumber",
    "modelNumber",
    "quantity",
    "dateOfManufacturing",
    "brazerName",
    "operatorCode",
    "codeA",
    "codeB",
    "codeC",
    "codeD",
    "ownerId",
    "createdAt",
];

/// Title of the document formats.
pub const REPORT_TITLE: &str = "Serial Number Report";

/// Columns of the document formats.
pub const REPORT_HEADER: [&str; 7] = [
    "ID",
    "Model",
    "Qty",
    "Date",
    "Brazer",
    "Operator",
    "Serial Number",
];

/// `record` as text cells, in [`TABLE_HEADER`] order. Absent codes are empty.
pub(crate) fn table_cells(record: &SerialRecord) -> [String; 13] {
    let m = &record.metadata;
    let [a, b, c, d] = m.codes().map(|code| code.unwrap_or_default().to_owned());
    [
        record.id.to_string(),
        record.serial_number.to_string(),
        m.model_number.clone(),
        m.quantity.to_string(),
        m.date_of_manufacturing.to_string(),
        m.brazer_name.clone(),
        m.operator_code.clone(),
        a,
        b,
        c,
        d,
        record.owner_id.to_string(),
        record.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}

/// `record` as text cells, in [`REPORT_HEADER`] order.
pub(crate) fn report_cells(record: &SerialRecord) -> [String; 7] {
    let m = &record.metadata;
    [
        record.id.to_string(),
        m.model_number.clone(),
        m.quantity.to_string(),
        m.date_of_manufacturing.to_string(),
        m.brazer_name.clone(),
        m.operator_code.clone(),
        record.serial_number.to_string(),
    ]
}

/// Writes a set of records in some file format.
pub trait Exporter {
    /// Conventional file extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Writes `records`, in the given order, to `out`.
    ///
    /// # Errors
    /// Whatever `out` reports.
    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()>;
}

impl<E: Exporter + ?Sized> Exporter for &E {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        (**self).export(records, out)
    }
}

impl<E: Exporter + ?Sized> Exporter for Box<E> {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        (**self).export(records, out)
    }
}

#[cfg(test)]
pub(crate) fn sample_records() -> Vec<SerialRecord> {
    use crate::{OwnerId, RecordId, record::sample_metadata};
    use chrono::{TimeZone, Utc};

    let mut second = sample_metadata("HX-100");
    second.brazer_name = "Smith, \"Jo\"".to_owned();
    second.code_d = Some("D4".to_owned());
    vec![
        SerialRecord {
            id: RecordId(1),
            serial_number: "7K3QZ-9F2A".parse().unwrap(),
            metadata: sample_metadata("HX-200"),
            owner_id: OwnerId(1),
            created_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap(),
        },
        SerialRecord {
            id: RecordId(2),
            serial_number: "AB12C-3D4E".parse().unwrap(),
            metadata: second,
            owner_id: OwnerId(2),
            created_at: Utc.with_ymd_and_hms(2025, 6, 3, 14, 0, 0).unwrap(),
        },
    ]
}
