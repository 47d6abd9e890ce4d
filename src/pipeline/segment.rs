//! Block segmentation (spreadsheet path).
//!
//! A cutoff sheet stacks many institutes vertically. Each institute starts
//! with a marker row (a `code name` cell, or a bare code cell with the name
//! a few columns to the right), followed somewhere below by a header row of
//! category codes, followed by course rows with one rank per category column.
//!
//! [`BlockSegmenter::find_blocks`] cuts the sheet into one row range per
//! marker. Ranges are contiguous: each block ends on the row before the next
//! marker, and the last block ends on the sheet's last used row.
//! [`BlockSegmenter::locate_category_header`] then finds the header inside a
//! block, and [`CategoryHeaderInfo::split_row`] reads a data row through it.
//!
//! Every sheet row is read as a [`Row`] of cell tokens, so the category
//! labels and institute codes are found by the same [`AnchorDetector`] the
//! page-text path uses.

use super::anchor::AnchorDetector;
use super::rows::{group_sheet_row, Row};
use super::token::Sheet;
use crate::config::Thresholds;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// The contiguous row range of one institute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstituteBlock {
    pub start_row: u32,
    pub end_row: u32,
    pub institute_code: String,
    pub institute_name: String,
}

/// The category header of one block: which column holds which category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryHeaderInfo {
    pub header_row: u32,
    /// `(column, category)` in ascending column order.
    pub categories: Vec<(u32, String)>,
}

/// One data row read through a category header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutoffRowParts {
    /// Left-most text left of the first category column.
    pub course: Option<String>,
    /// `(category, raw rank)` for every category cell holding a number.
    pub ranks: Vec<(String, i64)>,
}

impl CategoryHeaderInfo {
    fn first_column(&self) -> u32 {
        self.categories.first().map_or(u32::MAX, |(c, _)| *c)
    }

    /// Read one data row: the course cell and one raw rank per category.
    ///
    /// Ranks are returned unvalidated; range checks happen when the record
    /// is finalised.
    pub fn split_row(&self, row: &Row) -> CutoffRowParts {
        let first = self.first_column();
        let course = row
            .tokens
            .iter()
            .filter(|t| t.position.col().is_some_and(|c| c < first))
            .find(|t| t.text.chars().any(char::is_alphabetic))
            .map(|t| t.text.clone());

        let ranks = self
            .categories
            .iter()
            .filter_map(|(col, category)| {
                let token = row.tokens.iter().find(|t| t.position.col() == Some(*col))?;
                parse_rank(&token.text).map(|rank| (category.clone(), rank))
            })
            .collect();

        CutoffRowParts { course, ranks }
    }
}

static RE_RANK_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?(?:\d+|\d{1,3}(?:[,\s]\d{2,3})+)$").unwrap());

/// A rank from cell text: digits with optional thousands separators.
/// Dashes, fractions and words are not ranks.
pub fn parse_rank(text: &str) -> Option<i64> {
    let t = text.trim();
    if !RE_RANK_TEXT.is_match(t) {
        return None;
    }
    t.chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect::<String>()
        .parse()
        .ok()
}

/// Cuts sheets into institute blocks and finds their category headers.
#[derive(Debug, Clone)]
pub struct BlockSegmenter<'a> {
    detector: &'a AnchorDetector,
    name_lookahead_cols: u32,
    header_search_rows: u32,
    min_header_categories: usize,
}

impl<'a> BlockSegmenter<'a> {
    pub fn new(detector: &'a AnchorDetector, thresholds: &Thresholds) -> Self {
        Self {
            detector,
            name_lookahead_cols: thresholds.name_lookahead_cols,
            header_search_rows: thresholds.header_search_rows,
            min_header_categories: thresholds.min_header_categories,
        }
    }

    pub fn header_search_rows(&self) -> u32 {
        self.header_search_rows
    }

    /// Every institute block of the sheet, ordered by start row.
    pub fn find_blocks(&self, sheet: &Sheet) -> Vec<InstituteBlock> {
        if sheet.rows.is_empty() {
            return Vec::new();
        }

        let mut markers: Vec<(u32, String, String)> = Vec::new();
        for row in sheet.min_row()..=sheet.max_row() {
            if let Some((code, name)) = self.marker_in_row(&group_sheet_row(sheet, row)) {
                debug!(sheet = %sheet.name, row, code = %code, "institute marker");
                markers.push((row, code, name));
            }
        }

        let max_row = sheet.max_row();
        let mut blocks = Vec::with_capacity(markers.len());
        for (i, (start_row, code, name)) in markers.iter().enumerate() {
            let end_row = markers
                .get(i + 1)
                .map_or(max_row, |(next_start, _, _)| next_start - 1);
            blocks.push(InstituteBlock {
                start_row: *start_row,
                end_row,
                institute_code: code.clone(),
                institute_name: name.clone(),
            });
        }
        blocks
    }

    /// First institute marker in a row: `(code, name)`.
    fn marker_in_row(&self, row: &Row) -> Option<(String, String)> {
        for token in &row.tokens {
            let Some(parts) = self.detector.match_code(&token.text) else {
                continue;
            };
            // The code must open the cell and must not carry glued branch
            // letters (those are course-level codes, not institutes).
            if parts.start != 0 || parts.branch_code.is_some() {
                continue;
            }

            let rest = token.text[parts.end..]
                .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ',' | '.'))
                .trim();
            if rest.chars().any(char::is_alphabetic) {
                return Some((parts.institute_code, rest.to_string()));
            }
            if rest.is_empty() {
                if let Some(name) = token.position.col().and_then(|col| self.name_to_the_right(row, col)) {
                    return Some((parts.institute_code, name));
                }
            }
        }
        None
    }

    fn name_to_the_right(&self, row: &Row, col: u32) -> Option<String> {
        let last = col.saturating_add(self.name_lookahead_cols);
        row.tokens
            .iter()
            .filter(|t| t.position.col().is_some_and(|c| c > col && c <= last))
            .find(|t| {
                t.text.chars().any(char::is_alphabetic)
                    && !self.detector.is_category(&t.text)
                    && self.detector.match_code(&t.text).is_none()
            })
            .map(|t| t.text.clone())
    }

    /// The row with the most distinct category codes among the marker row
    /// and the `header_search_rows` rows below it, if it reaches the minimum.
    pub fn locate_category_header(
        &self,
        sheet: &Sheet,
        block: &InstituteBlock,
    ) -> Option<CategoryHeaderInfo> {
        let last = block
            .end_row
            .min(block.start_row.saturating_add(self.header_search_rows));

        let mut best: Option<CategoryHeaderInfo> = None;
        for row in block.start_row..=last {
            let candidate = self.header_candidate(row, &group_sheet_row(sheet, row));
            let better = match &best {
                None => true,
                Some(b) => candidate.categories.len() > b.categories.len(),
            };
            if better && !candidate.categories.is_empty() {
                best = Some(candidate);
            }
        }

        let header = best.filter(|h| h.categories.len() >= self.min_header_categories)?;
        debug!(
            sheet = %sheet.name,
            code = %block.institute_code,
            header_row = header.header_row,
            columns = header.categories.len(),
            "category header located"
        );
        Some(header)
    }

    fn header_candidate(&self, header_row: u32, row: &Row) -> CategoryHeaderInfo {
        let mut seen = HashSet::new();
        let categories = self
            .detector
            .detect(row)
            .categories
            .into_iter()
            .filter_map(|label| {
                let col = row.tokens.get(label.token_index)?.position.col()?;
                seen.insert(label.value.clone()).then_some((col, label.value))
            })
            .collect();
        CategoryHeaderInfo {
            header_row,
            categories,
        }
    }

    /// Whether a row repeats the category header (degenerate data row).
    pub fn is_header_row(&self, row: &Row) -> bool {
        self.header_candidate(0, row).categories.len() >= self.min_header_categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vocabulary;
    use crate::pipeline::token::CellValue;

    const CATS: [&str; 9] = ["1G", "1K", "1R", "2AG", "2AK", "2AR", "GM", "SCG", "STG"];

    fn grid(height: usize) -> Vec<Vec<CellValue>> {
        vec![vec![CellValue::Empty; 12]; height]
    }

    fn put(rows: &mut [Vec<CellValue>], r: usize, c: usize, v: CellValue) {
        rows[r][c] = v;
    }

    fn header(rows: &mut [Vec<CellValue>], r: usize) {
        put(rows, r, 0, "Course".into());
        for (i, cat) in CATS.iter().enumerate() {
            put(rows, r, 2 + i, (*cat).into());
        }
    }

    fn detector() -> AnchorDetector {
        AnchorDetector::new(&Vocabulary::default()).unwrap()
    }

    #[test]
    fn two_markers_partition_the_sheet() {
        let mut rows = grid(60);
        put(&mut rows, 5, 0, "E010 First Engineering College".into());
        header(&mut rows, 7);
        put(&mut rows, 40, 0, "E020".into());
        put(&mut rows, 40, 2, "Second Institute of Technology".into());
        header(&mut rows, 42);
        let sheet = Sheet::new("Cutoffs", 0, 0, rows);

        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());
        let blocks = seg.find_blocks(&sheet);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start_row, blocks[0].end_row), (5, 39));
        assert_eq!((blocks[1].start_row, blocks[1].end_row), (40, sheet.max_row()));
        assert_eq!(blocks[0].institute_code, "E010");
        assert_eq!(blocks[0].institute_name, "First Engineering College");
        assert_eq!(blocks[1].institute_name, "Second Institute of Technology");

        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end_row + 1, pair[1].start_row);
        }

        let h = seg.locate_category_header(&sheet, &blocks[0]).unwrap();
        assert_eq!(h.header_row, 7);
        assert_eq!(h.categories.len(), 9);
        assert_eq!(h.categories[0], (2, "1G".to_string()));
    }

    #[test]
    fn bare_code_without_name_is_not_a_marker() {
        let mut rows = grid(3);
        put(&mut rows, 1, 0, "E010".into());
        put(&mut rows, 1, 1, "GM".into());
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        assert!(BlockSegmenter::new(&d, &Thresholds::default())
            .find_blocks(&sheet)
            .is_empty());
    }

    #[test]
    fn name_beyond_lookahead_is_ignored() {
        let mut rows = grid(2);
        put(&mut rows, 0, 0, "E010".into());
        put(&mut rows, 0, 5, "Far Away College".into());
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        assert!(BlockSegmenter::new(&d, &Thresholds::default())
            .find_blocks(&sheet)
            .is_empty());
    }

    #[test]
    fn header_outside_budget_is_not_found() {
        let mut rows = grid(30);
        put(&mut rows, 0, 0, "E010 Slow College".into());
        header(&mut rows, 15);
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());
        let blocks = seg.find_blocks(&sheet);
        assert_eq!(blocks.len(), 1);
        assert!(seg.locate_category_header(&sheet, &blocks[0]).is_none());
    }

    #[test]
    fn too_few_categories_is_not_a_header() {
        let mut rows = grid(5);
        put(&mut rows, 0, 0, "E010 Tiny College".into());
        put(&mut rows, 2, 3, "GM".into());
        put(&mut rows, 2, 4, "SCG".into());
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());
        let blocks = seg.find_blocks(&sheet);
        assert!(seg.locate_category_header(&sheet, &blocks[0]).is_none());
    }

    #[test]
    fn split_row_reads_course_and_ranks() {
        let mut rows = grid(3);
        header(&mut rows, 0);
        put(&mut rows, 1, 0, "AI Artificial Intelligence".into());
        put(&mut rows, 1, 2, CellValue::Number(12345.0));
        put(&mut rows, 1, 3, "23,456".into());
        put(&mut rows, 1, 4, "--".into());
        put(&mut rows, 1, 8, CellValue::Number(600000.0));
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());
        let h = seg.header_candidate(0, &group_sheet_row(&sheet, 0));

        let parts = h.split_row(&group_sheet_row(&sheet, 1));
        assert_eq!(parts.course.as_deref(), Some("AI Artificial Intelligence"));
        assert_eq!(
            parts.ranks,
            vec![
                ("1G".to_string(), 12345),
                ("1K".to_string(), 23456),
                ("GM".to_string(), 600000),
            ]
        );
    }

    #[test]
    fn rank_parsing() {
        assert_eq!(parse_rank("1"), Some(1));
        assert_eq!(parse_rank("1.5"), None);
        assert_eq!(parse_rank("1,234"), Some(1234));
        assert_eq!(parse_rank("500000"), Some(500000));
        assert_eq!(parse_rank("1,23,456"), Some(123456));
        assert_eq!(parse_rank("-"), None);
        assert_eq!(parse_rank("N/A"), None);
        assert_eq!(parse_rank(""), None);
    }

    #[test]
    fn header_search_covers_marker_row_plus_budget() {
        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());

        let mut rows = grid(30);
        put(&mut rows, 0, 0, "E010 Edge College".into());
        header(&mut rows, 10);
        let sheet = Sheet::new("S", 0, 0, rows);
        let blocks = seg.find_blocks(&sheet);
        assert_eq!(seg.locate_category_header(&sheet, &blocks[0]).unwrap().header_row, 10);

        let mut rows = grid(30);
        put(&mut rows, 0, 0, "E010 Edge College".into());
        header(&mut rows, 11);
        let sheet = Sheet::new("S", 0, 0, rows);
        let blocks = seg.find_blocks(&sheet);
        assert!(seg.locate_category_header(&sheet, &blocks[0]).is_none());
    }

    #[test]
    fn numeric_cells_are_read_through_tokens() {
        let mut rows = grid(2);
        header(&mut rows, 0);
        put(&mut rows, 1, 0, "CS Computer Science".into());
        put(&mut rows, 1, 2, CellValue::Number(1.5));
        put(&mut rows, 1, 3, CellValue::Number(-4.0));
        let sheet = Sheet::new("S", 0, 0, rows);
        let d = detector();
        let seg = BlockSegmenter::new(&d, &Thresholds::default());
        let h = seg.header_candidate(0, &group_sheet_row(&sheet, 0));
        assert!(seg.is_header_row(&group_sheet_row(&sheet, 0)));
        assert!(!seg.is_header_row(&group_sheet_row(&sheet, 1)));

        let parts = h.split_row(&group_sheet_row(&sheet, 1));
        assert_eq!(parts.ranks, vec![("1K".to_string(), -4)]);
    }
}
