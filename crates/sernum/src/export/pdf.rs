use super::{REPORT_HEADER, REPORT_TITLE, report_cells};
use crate::{Exporter, SerialRecord};
use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, Point, Pt};
use std::io;

// US Letter, in points. Layout runs top-down; the renderer flips y.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 30.0;
/// Rows stop here and continue on a new page.
const PAGE_BREAK: f32 = 720.0;

const TITLE_SIZE: f32 = 20.0;
const SUBTITLE_SIZE: f32 = 10.0;
const TABLE_SIZE: f32 = 8.0;
const ROW_HEIGHT: f32 = 12.0;
const COLUMN_WIDTHS: [f32; 7] = [30.0, 60.0, 35.0, 70.0, 80.0, 80.0, 100.0];

/// Helvetica averages about half an em per glyph.
const GLYPH_WIDTH: f32 = 0.5;

/// The printable report as a paginated PDF: title and generation time on the
/// first page, then the table, with the header repeated on every page.
#[derive(Clone, Copy, Debug)]
pub struct PdfReportExporter {
    generated_at: DateTime<Utc>,
}

impl PdfReportExporter {
    pub const fn new(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }
}

impl Exporter for PdfReportExporter {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn export(&self, records: &[SerialRecord], out: &mut dyn io::Write) -> io::Result<()> {
        let pages = layout(records, self.generated_at);
        let bytes = render(&pages)?;
        out.write_all(&bytes)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Text {
    content: String,
    size: f32,
    bold: bool,
    x: f32,
    y: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Page {
    texts: Vec<Text>,
    /// Vertical offsets of horizontal rules spanning the table.
    rules: Vec<f32>,
}

impl Page {
    fn text(&mut self, content: impl Into<String>, size: f32, bold: bool, x: f32, y: f32) {
        self.texts.push(Text {
            content: content.into(),
            size,
            bold,
            x,
            y,
        });
    }

    fn centered(&mut self, content: &str, size: f32, y: f32) {
        let width = content.chars().count() as f32 * size * GLYPH_WIDTH;
        self.text(content, size, false, (PAGE_WIDTH - width) / 2.0, y);
    }

    /// Writes one table row at `y`, cutting cells to their column.
    fn row<S: AsRef<str>>(&mut self, cells: &[S; 7], bold: bool, y: f32) {
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
            let fits = (width / (TABLE_SIZE * GLYPH_WIDTH)) as usize;
            let content: String = cell.as_ref().chars().take(fits.saturating_sub(1)).collect();
            self.text(content, TABLE_SIZE, bold, x, y);
            x += width;
        }
    }

    /// Header row and its rule. Returns where the first data row goes.
    fn header(&mut self, y: f32) -> f32 {
        self.row(&REPORT_HEADER, true, y);
        let rule = y + ROW_HEIGHT / 2.0;
        self.rules.push(rule);
        rule + ROW_HEIGHT
    }
}

fn layout(records: &[SerialRecord], generated_at: DateTime<Utc>) -> Vec<Page> {
    let mut page = Page::default();
    let mut y = MARGIN + TITLE_SIZE;
    page.centered(REPORT_TITLE, TITLE_SIZE, y);
    y += TITLE_SIZE;
    let generated = format!(
        "Generated on: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    page.centered(&generated, SUBTITLE_SIZE, y);
    y += SUBTITLE_SIZE * 3.0;
    y = page.header(y);

    let mut pages = Vec::new();
    for record in records {
        if y > PAGE_BREAK {
            pages.push(std::mem::take(&mut page));
            y = page.header(MARGIN + ROW_HEIGHT);
        }
        page.row(&report_cells(record), false, y);
        y += ROW_HEIGHT;
    }
    pages.push(page);
    pages
}

fn render(pages: &[Page]) -> io::Result<Vec<u8>> {
    let (width, height) = (at(PAGE_WIDTH), at(PAGE_HEIGHT));
    let (doc, first_page, first_layer) = PdfDocument::new(REPORT_TITLE, width, height, "Table");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let mut first = Some((first_page, first_layer));
    for page in pages {
        let (page_index, layer_index) = match first.take() {
            Some(indices) => indices,
            None => doc.add_page(width, height, "Table"),
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for t in &page.texts {
            let font: &IndirectFontRef = if t.bold { &bold } else { &regular };
            layer.use_text(t.content.clone(), t.size, at(t.x), at(PAGE_HEIGHT - t.y), font);
        }
        for &y in &page.rules {
            let y = at(PAGE_HEIGHT - y);
            layer.add_line(Line {
                points: vec![
                    (Point::new(at(MARGIN), y), false),
                    (Point::new(at(PAGE_WIDTH - MARGIN), y), false),
                ],
                is_closed: false,
            });
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn pdf_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::other(err.to_string())
}

fn at(points: f32) -> Mm {
    Mm::from(Pt(points))
}
