use crate::{Exporter, SerialRecord};
use std::io;

/// A pretty-printed JSON array of records, camelCase keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, records)?;
        out.write_all(b"\n")
    }
}
