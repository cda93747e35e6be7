use super::{REPORT_HEADER, REPORT_TITLE, report_cells};
use crate::{Exporter, SerialRecord};
use chrono::{DateTime, Utc};
use std::io;

/// Column widths in characters, matching [`REPORT_HEADER`]. The last column
/// is never cut.
const WIDTHS: [usize; 7] = [6, 14, 5, 12, 18, 12, 13];

/// A fixed-width text rendition of the printed report: a centered title, the
/// generation time and one row per record. Cells wider than their column are
/// cut short, except the serial number.
#[derive(Clone, Copy, Debug)]
pub struct TextReportExporter {
    generated_at: DateTime<Utc>,
}

impl TextReportExporter {
    pub const fn new(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }
}

impl Exporter for TextReportExporter {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        let width: usize = WIDTHS.iter().sum();
        let generated = format!(
            "Generated on: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        writeln!(out, "{REPORT_TITLE:^width$}")?;
        writeln!(out, "{generated:^width$}")?;
        writeln!(out)?;

        write_line(out, &REPORT_HEADER)?;
        writeln!(out, "{}", "-".repeat(width))?;
        for r in records {
            write_line(out, &report_cells(r))?;
        }
        writeln!(out, "{}", "-".repeat(width))?;
        writeln!(out, "{} record(s)", records.len())
    }
}

fn write_line<S: AsRef<str>>(out: &mut dyn io::Write, cells: &[S; 7]) -> io::Result<()> {
    let mut line = String::new();
    let [rest @ .., last] = cells;
    for (cell, width) in rest.iter().zip(WIDTHS) {
        // One column of padding between cells.
        let text: String = cell.as_ref().chars().take(width - 1).collect();
        line.push_str(&format!("{text:<width$}"));
    }
    line.push_str(last.as_ref());
    writeln!(out, "{}", line.trim_end())
}
