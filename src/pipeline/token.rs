//! Token normalisation: one token shape for both source kinds.
//!
//! Page-text fragments carry an `(x, y)` baseline position; spreadsheet cells
//! carry an exact `(row, col)` address. Both become a [`Token`] with
//! trimmed, non-empty text. Blank fragments and empty cells are dropped here
//! so later stages never see them.

use serde::{Deserialize, Serialize};

/// Where a token sits in its source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    /// Page-text baseline coordinate (PDF units, y grows upwards).
    Page { x: f32, y: f32 },
    /// Spreadsheet cell address (0-based, absolute within the sheet).
    Cell { row: u32, col: u32 },
}

impl Position {
    /// Horizontal page coordinate, if this is a page-text token.
    pub fn x(&self) -> Option<f32> {
        match self {
            Position::Page { x, .. } => Some(*x),
            Position::Cell { .. } => None,
        }
    }

    /// Column index, if this is a spreadsheet token.
    pub fn col(&self) -> Option<u32> {
        match self {
            Position::Cell { col, .. } => Some(*col),
            Position::Page { .. } => None,
        }
    }
}

/// A non-empty, trimmed piece of text at a known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: Position,
}

impl Token {
    /// Build a token, returning `None` when the text is blank.
    pub fn new(text: &str, position: Position) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                text: trimmed.to_string(),
                position,
            })
        }
    }
}

// ── Page-text source ─────────────────────────────────────────────────────

/// One positioned text fragment as delivered by the PDF decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

/// All fragments of one page, in decoder order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_number: usize,
    pub fragments: Vec<TextFragment>,
}

impl PageText {
    pub fn new(page_number: usize, fragments: Vec<TextFragment>) -> Self {
        Self {
            page_number,
            fragments,
        }
    }
}

/// Turn a page's fragments into tokens, dropping blank ones.
pub fn normalize_fragments(page: &PageText) -> Vec<Token> {
    page.fragments
        .iter()
        .filter(|f| f.x.is_finite() && f.y.is_finite())
        .filter_map(|f| Token::new(&f.text, Position::Page { x: f.x, y: f.y }))
        .collect()
}

// ── Spreadsheet source ───────────────────────────────────────────────────

/// A decoded cell value, classified once at load time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Text form of the value. Integral numbers print without a fraction.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One worksheet: a dense grid anchored at `(start_row, start_col)`.
///
/// Rows run `start_row ..= max_row()`; cell `i` of a row sits in column
/// `start_col + i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub start_row: u32,
    pub start_col: u32,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, start_row: u32, start_col: u32, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            start_row,
            start_col,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_empty))
    }

    pub fn min_row(&self) -> u32 {
        self.start_row
    }

    /// Last row of the used range. Equals `min_row` for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.start_row + (self.rows.len() as u32).saturating_sub(1)
    }

    /// Non-empty cells of one row, by ascending column.
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (u32, &CellValue)> {
        let start_col = self.start_col;
        let cells: &[CellValue] = if row < self.start_row {
            &[]
        } else {
            self.rows
                .get((row - self.start_row) as usize)
                .map(Vec::as_slice)
                .unwrap_or(&[])
        };
        cells
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_empty())
            .map(move |(i, v)| (start_col + i as u32, v))
    }
}

/// All sheets of one workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Turn one sheet row into tokens, by ascending column.
pub fn normalize_row_cells(sheet: &Sheet, row: u32) -> Vec<Token> {
    sheet
        .row_cells(row)
        .filter_map(|(col, value)| {
            let text = value.to_text()?;
            Token::new(&text, Position::Cell { row, col })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fragments_are_dropped() {
        let page = PageText::new(
            1,
            vec![
                TextFragment::new("  E001 ", 10.0, 700.0),
                TextFragment::new("   ", 50.0, 700.0),
                TextFragment::new("", 60.0, 700.0),
                TextFragment::new("CS", 80.0, 700.0),
            ],
        );
        let tokens = normalize_fragments(&page);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "E001");
        assert_eq!(tokens[0].position.x(), Some(10.0));
        assert_eq!(tokens[1].text, "CS");
    }

    #[test]
    fn non_finite_coordinates_are_dropped() {
        let page = PageText::new(1, vec![TextFragment::new("x", f32::NAN, 1.0)]);
        assert!(normalize_fragments(&page).is_empty());
    }

    #[test]
    fn integral_numbers_print_without_fraction() {
        assert_eq!(CellValue::Number(12345.0).to_text().as_deref(), Some("12345"));
        assert_eq!(CellValue::Number(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(CellValue::Empty.to_text(), None);
        assert_eq!(CellValue::Text("  ".into()).to_text(), None);
    }

    #[test]
    fn sheet_addressing_is_absolute() {
        let sheet = Sheet::new(
            "S",
            2,
            1,
            vec![
                vec!["a".into(), CellValue::Empty, "c".into()],
                vec![CellValue::Number(4.0)],
            ],
        );
        assert_eq!(sheet.min_row(), 2);
        assert_eq!(sheet.max_row(), 3);
        assert_eq!(sheet.row_cells(0).count(), 0);
        assert_eq!(sheet.row_cells(9).count(), 0);
        let second: Vec<_> = sheet.row_cells(3).collect();
        assert_eq!(second, vec![(1, &CellValue::Number(4.0))]);

        let tokens = normalize_row_cells(&sheet, 2);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].position, Position::Cell { row: 2, col: 3 });
        assert_eq!(tokens[1].position.col(), Some(3));
        assert_eq!(tokens[1].position.x(), None);
    }
}
