use super::{TABLE_HEADER, table_cells};
use crate::{Exporter, SerialRecord};
use ::csv::{Terminator, WriterBuilder};
use std::io;

/// Comma-separated values with a header row, quoted per RFC 4180 and
/// terminated with CRLF.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::CRLF)
            .from_writer(out);
        writer.write_record(TABLE_HEADER)?;
        for r in records {
            writer.write_record(table_cells(r))?;
        }
        writer.flush()
    }
}
