//! PDF export of the attendance report.
//!
//! Rendering happens in two steps. [`paginate`] lays the table out into [`Page`]s of positioned
//! text, with column positions computed from the width of their contents. [`render`] then
//! draws those pages with `printpdf`.
//!
//! All coordinates are in points, measured from the bottom-left corner of a US Letter page, the
//! same way PDF measures them.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use crate::error::{AppError, AppResult};
use crate::models::ReportRow;

pub const PDF_MIME: &str = "application/pdf";
pub const PDF_FILE_NAME: &str = "attendance_report.pdf";

pub const TITLE: &str = "Attendance Report";

/// Column headers of the PDF export.
pub const PDF_HEADERS: [&str; 5] = ["Name", "Roll No", "Date", "Time", "Status"];

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

const LEFT_MARGIN: f32 = 50.0;
const RIGHT_MARGIN: f32 = 50.0;
const BOTTOM_MARGIN: f32 = 50.0;

/// Distance from the top of the page to the title baseline.
const TITLE_OFFSET: f32 = 50.0;
/// Distance from the top of the page to the header baseline.
const HEADER_OFFSET: f32 = 80.0;
const ROW_PITCH: f32 = 20.0;

/// Space kept between the widest cell of a column and the next column.
const COLUMN_GAP: f32 = 16.0;

pub const TITLE_SIZE: f32 = 14.0;
pub const BODY_SIZE: f32 = 10.0;

/// Advance widths of the printable ASCII characters in Helvetica, in 1/1000 of the font size.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of anything outside printable ASCII.
const DEFAULT_WIDTH: u16 = 556;

/// Approximate rendered width of `text` in Helvetica at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            u32::from(match c {
                ' '..='~' => HELVETICA_WIDTHS[c as usize - ' ' as usize],
                _ => DEFAULT_WIDTH,
            })
        })
        .sum();

    units as f32 * size / 1000.0
}

/// Slack allowed when comparing measured widths, so text sized to a column always fits it.
const WIDTH_TOLERANCE: f32 = 0.01;

fn fits(text: &str, width: f32, size: f32) -> bool {
    text_width(text, size) <= width + WIDTH_TOLERANCE
}

/// Splits `text` into lines no wider than `width`, breaking after a space where one is available.
///
/// Every character is kept: the lines concatenate back to `text`. A single character wider than
/// `width` still gets a line of its own.
fn wrap_to_width(text: &str, width: f32, size: f32) -> Vec<String> {
    if fits(text, width, size) {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if current.chars().count() == 1 || fits(&current, width, size) {
            continue;
        }
        current.pop();

        let carry = match current.rfind(' ') {
            Some(space) if space + 1 < current.len() => current.split_off(space + 1),
            _ => String::new(),
        };
        lines.push(std::mem::take(&mut current));

        if !carry.is_empty() && !fits(&format!("{carry}{c}"), width, size) {
            lines.push(carry);
        } else {
            current = carry;
        }
        current.push(c);
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Fits `natural` column widths into `available` space.
///
/// Columns no wider than an even share of what is left keep their width. The remaining columns
/// split the rest equally.
fn shrink_to_fit(natural: Vec<f32>, available: f32) -> Vec<f32> {
    if natural.iter().sum::<f32>() <= available {
        return natural;
    }

    let mut kept = vec![false; natural.len()];
    let share = loop {
        let kept_total: f32 = natural
            .iter()
            .zip(&kept)
            .filter(|(_, k)| **k)
            .map(|(width, _)| width)
            .sum();
        let flexible = kept.iter().filter(|k| !**k).count();
        let share = (available - kept_total).max(0.0) / flexible as f32;

        let mut changed = false;
        for (width, k) in natural.iter().zip(kept.iter_mut()) {
            if !*k && *width <= share {
                *k = true;
                changed = true;
            }
        }

        if !changed {
            break share;
        }
    };

    natural
        .into_iter()
        .zip(kept)
        .map(|(width, k)| if k { width } else { share })
        .collect()
}

/// A piece of text anchored at its left baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// The contents of one table cell, wrapped over as many baselines as it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub fragments: Vec<PlacedText>,
}

impl Cell {
    /// The full cell value.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect()
    }
}

/// One line of the table: the header, or a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Baseline of the first text line.
    pub y: f32,
    pub cells: Vec<Cell>,
}

impl Line {
    /// Baseline of the lowest wrapped fragment.
    pub fn bottom(&self) -> f32 {
        self.cells
            .iter()
            .flat_map(|cell| &cell.fragments)
            .map(|fragment| fragment.y)
            .fold(self.y, f32::min)
    }

    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(Cell::text).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Only the first page carries the title.
    pub title: Option<PlacedText>,
    pub header: Line,
    pub rows: Vec<Line>,
}

/// Column positions of a table, computed from the widths of its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    /// Left edge of each column.
    pub offsets: Vec<f32>,
    /// Space available to the text of each column, not counting the gap after it.
    pub widths: Vec<f32>,
}

impl TableLayout {
    /// Sizes every column to its widest cell, with [`COLUMN_GAP`] between columns.
    ///
    /// If the table would run past the right margin, the columns are narrowed with
    /// `shrink_to_fit` and cells wider than their column wrap onto extra lines.
    pub fn fit(headers: &[&str], rows: &[Vec<String>]) -> Self {
        let natural: Vec<f32> = headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                rows.iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| text_width(cell, BODY_SIZE))
                    .fold(text_width(header, BODY_SIZE), f32::max)
            })
            .collect();

        let gaps = COLUMN_GAP * natural.len().saturating_sub(1) as f32;
        let widths = shrink_to_fit(natural, PAGE_WIDTH - LEFT_MARGIN - RIGHT_MARGIN - gaps);

        let mut offsets = Vec::with_capacity(widths.len());
        let mut x = LEFT_MARGIN;
        for width in &widths {
            offsets.push(x);
            x += width + COLUMN_GAP;
        }

        Self { offsets, widths }
    }

    fn line(&self, y: f32, cells: &[impl AsRef<str>]) -> Line {
        Line {
            y,
            cells: cells
                .iter()
                .zip(self.offsets.iter().zip(&self.widths))
                .map(|(cell, (&x, &width))| Cell {
                    fragments: wrap_to_width(cell.as_ref(), width, BODY_SIZE)
                        .into_iter()
                        .enumerate()
                        .map(|(i, text)| PlacedText {
                            x,
                            y: y - ROW_PITCH * i as f32,
                            text,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Lays out the title, header and rows over as many pages as needed.
///
/// Rows are placed at a fixed pitch below the header, with wrapped cells taking one pitch per
/// extra line. When a row would reach below the bottom margin, a new page starts with the
/// header repeated at the top. A row never gets split across pages.
pub fn paginate(headers: &[&str], rows: &[Vec<String>]) -> Vec<Page> {
    let layout = TableLayout::fit(headers, rows);
    let header_y = PAGE_HEIGHT - HEADER_OFFSET;
    let first_row_y = header_y - ROW_PITCH;

    let title = PlacedText {
        x: (PAGE_WIDTH - text_width(TITLE, TITLE_SIZE)) / 2.0,
        y: PAGE_HEIGHT - TITLE_OFFSET,
        text: TITLE.to_string(),
    };

    let mut pages = Vec::new();
    let mut page = Page {
        title: Some(title),
        header: layout.line(header_y, headers),
        rows: Vec::new(),
    };
    let mut y = first_row_y;

    for row in rows {
        let mut line = layout.line(y, row.as_slice());

        if line.bottom() < BOTTOM_MARGIN && !page.rows.is_empty() {
            let next = Page {
                title: None,
                header: layout.line(header_y, headers),
                rows: Vec::new(),
            };
            pages.push(std::mem::replace(&mut page, next));

            y = first_row_y;
            line = layout.line(y, row.as_slice());
        }

        y = line.bottom() - ROW_PITCH;
        page.rows.push(line);
    }

    pages.push(page);
    pages
}

/// Lays out the report as it appears in the PDF export.
pub fn layout(rows: &[ReportRow]) -> Vec<Page> {
    let cells: Vec<Vec<String>> = rows.iter().map(ReportRow::cells).collect();

    paginate(&PDF_HEADERS, &cells)
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

fn draw(layer: &PdfLayerReference, text: &PlacedText, size: f32, font: &IndirectFontRef) {
    layer.use_text(text.text.clone(), size, mm(text.x), mm(text.y), font);
}

fn pdf_error(err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("PDF export: {err}"))
}

/// Draws laid-out pages into a PDF document.
pub fn render(pages: &[Page]) -> AppResult<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(TITLE, mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Page 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(
                mm(PAGE_WIDTH),
                mm(PAGE_HEIGHT),
                format!("Page {}", index + 1),
            );
            doc.get_page(page_index).get_layer(layer_index)
        };

        if let Some(title) = &page.title {
            draw(&layer, title, TITLE_SIZE, &bold);
        }
        for line in std::iter::once(&page.header).chain(&page.rows) {
            for fragment in line.cells.iter().flat_map(|cell| &cell.fragments) {
                draw(&layer, fragment, BODY_SIZE, &regular);
            }
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// Renders the report as a paginated PDF document.
pub fn to_pdf(rows: &[ReportRow]) -> AppResult<Vec<u8>> {
    render(&layout(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_NAME: &str = "Venkata Subrahmanya Lakshmi Narasimha Chakravarthy Ramaswamy";

    fn rows(n: usize) -> Vec<Vec<String>> {
        (0..n)
            .map(|i| {
                vec![
                    format!("Student {i}"),
                    format!("R{i:03}"),
                    "2025-03-14".to_string(),
                    "09:15:30".to_string(),
                    "Present".to_string(),
                ]
            })
            .collect()
    }

    fn row_count(pages: &[Page]) -> usize {
        pages.iter().map(|page| page.rows.len()).sum()
    }

    fn placed_rows(pages: &[Page]) -> Vec<Vec<String>> {
        pages
            .iter()
            .flat_map(|page| &page.rows)
            .map(Line::texts)
            .collect()
    }

    #[test]
    fn first_page_holds_thirty_three_rows() {
        let pages = paginate(&PDF_HEADERS, &rows(33));
        assert_eq!(pages.len(), 1);

        let pages = paginate(&PDF_HEADERS, &rows(34));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].rows.len(), 33);
        assert_eq!(pages[1].rows.len(), 1);
    }

    #[test]
    fn every_row_is_placed_once_and_in_order() {
        let input = rows(100);
        let pages = paginate(&PDF_HEADERS, &input);

        assert_eq!(row_count(&pages), 100);
        assert_eq!(placed_rows(&pages), input);

        // Every column is as wide as its widest cell, so nothing wraps.
        for line in pages.iter().flat_map(|page| &page.rows) {
            assert!(line.cells.iter().all(|cell| cell.fragments.len() == 1));
        }
    }

    #[test]
    fn rows_stay_above_the_bottom_margin() {
        let mut input = rows(80);
        for row in input.iter_mut().step_by(7) {
            row[0] = format!("{LONG_NAME} {LONG_NAME}");
        }

        let pages = paginate(&PDF_HEADERS, &input);
        assert_eq!(placed_rows(&pages), input);

        for page in &pages {
            assert_eq!(page.header.y, PAGE_HEIGHT - HEADER_OFFSET);
            for line in &page.rows {
                assert!(line.bottom() >= BOTTOM_MARGIN);
                assert!(line.y < page.header.y);
            }
        }
    }

    #[test]
    fn only_the_first_page_has_a_title() {
        let pages = paginate(&PDF_HEADERS, &rows(40));

        let title = pages[0].title.as_ref().unwrap();
        assert_eq!(title.text, TITLE);
        assert_eq!(title.y, PAGE_HEIGHT - TITLE_OFFSET);
        assert!((title.x * 2.0 + text_width(TITLE, TITLE_SIZE) - PAGE_WIDTH).abs() < 0.01);
        assert!(pages[1].title.is_none());
    }

    #[test]
    fn empty_report_is_a_single_page_with_a_header() {
        let pages = paginate(&PDF_HEADERS, &[]);

        assert_eq!(pages.len(), 1);
        assert!(pages[0].rows.is_empty());
        assert_eq!(pages[0].header.texts(), PDF_HEADERS);
    }

    #[test]
    fn columns_are_sized_to_their_contents() {
        let name = "Bartholomew Maximilian Featherstonehaugh";
        let mut input = rows(2);
        input[0][0] = name.to_string();

        let layout = TableLayout::fit(&PDF_HEADERS, &input);
        let name_width = text_width(name, BODY_SIZE);

        assert_eq!(layout.offsets[0], LEFT_MARGIN);
        assert_eq!(layout.widths[0], name_width);
        assert!(layout.offsets[1] >= LEFT_MARGIN + name_width + COLUMN_GAP - 0.01);
        assert_eq!(layout.widths[4], text_width("Present", BODY_SIZE));

        let pages = paginate(&PDF_HEADERS, &input);
        assert_eq!(pages[0].rows[0].cells[0].fragments.len(), 1);
        assert_eq!(pages[0].rows[0].cells[0].text(), name);
    }

    #[test]
    fn oversized_tables_wrap_inside_the_margins() {
        let mut input = rows(1);
        input[0][0] = "W".repeat(80);

        let layout = TableLayout::fit(&PDF_HEADERS, &input);
        let right_edge = layout.offsets[4] + layout.widths[4];
        assert!(right_edge <= PAGE_WIDTH - RIGHT_MARGIN + 0.01);

        let pages = paginate(&PDF_HEADERS, &input);
        let line = &pages[0].rows[0];
        assert_eq!(line.texts(), input[0]);

        let name = &line.cells[0];
        assert!(name.fragments.len() > 1);
        for (i, fragment) in name.fragments.iter().enumerate() {
            assert!(text_width(&fragment.text, BODY_SIZE) <= layout.widths[0] + 0.01);
            assert_eq!(fragment.x, layout.offsets[0]);
            assert_eq!(fragment.y, line.y - ROW_PITCH * i as f32);
        }

        // Narrow columns keep their natural width and stay on one line.
        assert_eq!(line.cells[2].fragments.len(), 1);
        assert_eq!(layout.widths[2], text_width("2025-03-14", BODY_SIZE));
        assert_eq!(line.cells[4].fragments.len(), 1);
    }

    #[test]
    fn long_names_break_between_words() {
        let mut input = rows(1);
        input[0][0] = LONG_NAME.to_string();

        let pages = paginate(&PDF_HEADERS, &input);
        let cell = &pages[0].rows[0].cells[0];

        assert_eq!(cell.text(), LONG_NAME);
        assert!(cell.fragments.len() > 1);
        for fragment in &cell.fragments[..cell.fragments.len() - 1] {
            assert!(fragment.text.ends_with(' '));
        }
    }

    #[test]
    fn wrapped_rows_push_later_rows_to_the_next_page() {
        let mut input = rows(33);
        input[0][0] = [LONG_NAME; 3].join(" ");

        let pages = paginate(&PDF_HEADERS, &input);
        let extra_lines = pages[0].rows[0].cells[0].fragments.len() - 1;
        assert!(extra_lines > 0);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].rows.len(), 33 - extra_lines);
        assert_eq!(placed_rows(&pages), input);

        let first = &pages[0].rows;
        assert_eq!(first[1].y, first[0].bottom() - ROW_PITCH);
    }

    #[test]
    fn a_row_taller_than_the_page_still_gets_placed() {
        let mut input = rows(2);
        input[0][0] = "W".repeat(2000);

        let pages = paginate(&PDF_HEADERS, &input);

        assert_eq!(pages.len(), 2);
        assert_eq!(placed_rows(&pages), input);
        assert_eq!(pages[1].rows[0].y, PAGE_HEIGHT - HEADER_OFFSET - ROW_PITCH);
    }

    #[test]
    fn rendering_draws_every_laid_out_page() {
        let pages = paginate(&PDF_HEADERS, &rows(50));
        let bytes = render(&pages).unwrap();

        assert!(bytes.starts_with(b"%PDF"));

        let document = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(document.get_pages().len(), pages.len());
    }
}
