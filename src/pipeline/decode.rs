//! Source decoding: open a file and load its primitives up front.
//!
//! These adapters sit outside the extraction core. They turn a PDF into
//! [`PageText`] (text segments with their lower-left corner) and a workbook
//! into [`Workbook`] (typed cell grids), then close the file. Extraction
//! never touches the decoder again.
//!
//! Both calls are blocking. Async callers run them under
//! `tokio::task::spawn_blocking`, since pdfium keeps thread-local state and
//! calamine does synchronous I/O.

use super::token::{CellValue, PageText, Sheet, TextFragment, Workbook};
use crate::error::ExtractError;
use calamine::{open_workbook_auto, Data, Reader};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Spreadsheet extensions calamine can open.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let bindings = match std::env::var(PDFIUM_LIB_ENV) {
        Ok(path) if !path.trim().is_empty() => Pdfium::bind_to_library(path.trim()),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Load every page's text segments.
///
/// Pages come back in document order, numbered from 1.
pub fn decode_pdf(path: &Path, password: Option<&str>) -> Result<Vec<PageText>, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ExtractError::DecodeFailed {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| ExtractError::DecodeFailed {
            path: path.to_path_buf(),
            detail: format!("page {}: {e:?}", idx + 1),
        })?;

        let fragments: Vec<TextFragment> = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextFragment::new(segment.text(), bounds.left().value, bounds.bottom().value)
            })
            .collect();

        debug!(page = idx + 1, fragments = fragments.len(), "page text loaded");
        pages.push(PageText::new(idx + 1, fragments));
    }

    info!(path = %path.display(), pages = pages.len(), "PDF decoded");
    Ok(pages)
}

/// Load every sheet's used range as typed cells.
pub fn decode_workbook(path: &Path) -> Result<Workbook, ExtractError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ExtractError::DecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::DecodeFailed {
                path: path.to_path_buf(),
                detail: format!("sheet '{name}': {e}"),
            })?;

        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();

        debug!(sheet = %name, rows = rows.len(), "sheet loaded");
        sheets.push(Sheet::new(name, start_row, start_col, rows));
    }

    info!(path = %path.display(), sheets = sheets.len(), "workbook decoded");
    Ok(Workbook { sheets })
}

/// Map a calamine cell onto the three-way cell variant.
pub fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if !s.trim().is_empty() => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        _ => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_mapping() {
        assert_eq!(cell_value(&Data::Int(42)), CellValue::Number(42.0));
        assert_eq!(cell_value(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(cell_value(&Data::String("GM".into())), CellValue::Text("GM".into()));
        assert_eq!(cell_value(&Data::String("  ".into())), CellValue::Empty);
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn unreadable_workbook_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(matches!(
            decode_workbook(&path),
            Err(ExtractError::DecodeFailed { .. })
        ));
    }
}
