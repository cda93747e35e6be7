use super::TABLE_HEADER;
use crate::{Exporter, SerialRecord};
use chrono::SecondsFormat;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::io;

/// Name of the single worksheet.
pub const XLSX_SHEET: &str = "Serials";

/// An Excel workbook with one `Serials` sheet: a bold header row, then one row
/// per record. Ids and quantities are numeric cells, absent codes are blank.
#[derive(Clone, Copy, Debug, Default)]
pub struct XlsxExporter;

impl Exporter for XlsxExporter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        let bytes = workbook(records).map_err(|e| io::Error::other(e.to_string()))?;
        out.write_all(&bytes)
    }
}

fn workbook(records: &[SerialRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(XLSX_SHEET)?;

    let bold = Format::new().set_bold();
    for (col, name) in (0u16..).zip(TABLE_HEADER) {
        sheet.write_string_with_format(0, col, name, &bold)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (row, record) in (1u32..).zip(records) {
        write_record(sheet, row, record)?;
    }
    sheet.set_column_width(1, 14)?;
    sheet.set_column_width(2, 16)?;
    sheet.set_column_width(4, 20)?;
    sheet.set_column_width(5, 20)?;
    sheet.set_column_width(12, 26)?;

    workbook.save_to_buffer()
}

fn write_record(sheet: &mut Worksheet, row: u32, r: &SerialRecord) -> Result<(), XlsxError> {
    let m = &r.metadata;
    sheet.write_number(row, 0, r.id.0 as f64)?;
    sheet.write_string(row, 1, r.serial_number.as_str())?;
    sheet.write_string(row, 2, m.model_number.as_str())?;
    sheet.write_number(row, 3, m.quantity)?;
    sheet.write_string(row, 4, m.date_of_manufacturing.to_string())?;
    sheet.write_string(row, 5, m.brazer_name.as_str())?;
    sheet.write_string(row, 6, m.operator_code.as_str())?;
    for (col, code) in (7u16..).zip(m.codes()) {
        if let Some(code) = code {
            sheet.write_string(row, col, code)?;
        }
    }
    sheet.write_number(row, 11, r.owner_id.0 as f64)?;
    sheet.write_string(row, 12, r.created_at.to_rfc3339_opts(SecondsFormat::Millis, true))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::sample_records;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn writes_a_zip_packaged_workbook() {
        let mut buf = Vec::new();
        XlsxExporter.export(&sample_records(), &mut buf).unwrap();

        assert!(buf.starts_with(b"PK\x03\x04"));
        assert!(contains(&buf, b"xl/workbook.xml"));
        assert!(contains(&buf, b"xl/worksheets/sheet1.xml"));
        assert!(!contains(&buf, b"xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn empty_export_still_has_a_sheet() {
        let mut buf = Vec::new();
        XlsxExporter.export(&[], &mut buf).unwrap();
        assert!(contains(&buf, b"xl/worksheets/sheet1.xml"));
    }
}
