//! Row grouping: cluster tokens into visual rows.
//!
//! Page text has no line structure, only baselines. Tokens are sorted top of
//! page first (descending y, ties by ascending x) and a new row starts
//! whenever the y-gap to the previous token exceeds the tolerance. Each row
//! is then re-sorted left to right.
//!
//! Spreadsheet rows need no clustering: a row is every cell sharing one row
//! index, in column order.

use super::token::{normalize_row_cells, Sheet, Token};
use std::cmp::Ordering;

/// Tokens believed to lie on one visual line, ordered left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub tokens: Vec<Token>,
}

impl Row {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Space-joined text of the whole row.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Group page tokens into rows, top to bottom.
///
/// O(n log n), dominated by the sort. The first token always opens row 0.
pub fn group_page_rows(mut tokens: Vec<Token>, tolerance: f32) -> Vec<Row> {
    tokens.sort_by(|a, b| {
        let (ax, ay) = page_xy(a);
        let (bx, by) = page_xy(b);
        by.partial_cmp(&ay)
            .unwrap_or(Ordering::Equal)
            .then(ax.partial_cmp(&bx).unwrap_or(Ordering::Equal))
    });

    let mut rows: Vec<Row> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut prev_y: Option<f32> = None;

    for token in tokens {
        let (_, y) = page_xy(&token);
        if let Some(py) = prev_y {
            if (py - y).abs() > tolerance {
                rows.push(finish_row(std::mem::take(&mut current)));
            }
        }
        prev_y = Some(y);
        current.push(token);
    }
    if !current.is_empty() {
        rows.push(finish_row(current));
    }

    rows
}

fn finish_row(mut tokens: Vec<Token>) -> Row {
    tokens.sort_by(|a, b| {
        page_xy(a)
            .0
            .partial_cmp(&page_xy(b).0)
            .unwrap_or(Ordering::Equal)
    });
    Row::new(tokens)
}

fn page_xy(token: &Token) -> (f32, f32) {
    match token.position {
        super::token::Position::Page { x, y } => (x, y),
        super::token::Position::Cell { row, col } => (col as f32, -(row as f32)),
    }
}

/// One spreadsheet row as a [`Row`], by ascending column.
pub fn group_sheet_row(sheet: &Sheet, row: u32) -> Row {
    Row::new(normalize_row_cells(sheet, row))
}
