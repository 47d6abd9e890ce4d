//! Error types for the admission-tables library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal** for one call: the document cannot be read
//!   at all (missing file, unknown format, wrong password) or the
//!   configuration is unusable. Returned as `Err(ExtractError)` from the
//!   file-level entry points and from [`crate::config::ExtractionConfigBuilder`]
//!   validation.
//!
//! * [`DocumentError`] — **Non-fatal**: one block or one document produced
//!   zero records, but the run goes on. Stored as text inside
//!   [`crate::output::RunSummary::errors`] so a batch never stops on a single
//!   malformed document.
//!
//! Out-of-range cutoff ranks are neither: they are dropped and counted in
//! [`crate::output::RunSummary::filtered`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the admission-tables library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The extension does not map to a known document kind.
    #[error("Unsupported input format for '{path}': expected .pdf, .xlsx, .xlsm, .xlsb, .xls or .ods")]
    UnsupportedFormat { path: PathBuf },

    // ── Decoder errors ────────────────────────────────────────────────────
    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The upstream decoder (pdfium or calamine) could not read the file.
    #[error("Failed to decode '{path}': {detail}")]
    DecodeFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use a specific copy,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configured regular expression does not compile.
    #[error("Invalid pattern for {name}: {detail}")]
    InvalidPattern { name: String, detail: String },

    /// The TOML configuration file could not be read or parsed.
    #[error("Failed to load configuration '{path}': {detail}")]
    ConfigLoad { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for one block or one document.
///
/// Rendered with `Display` into the run summary; the extraction continues
/// with the next block or document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// No row with enough category codes was found near the block start.
    #[error(
        "Sheet '{sheet}': no category header within {searched_rows} rows of institute {institute_code} (row {start_row})"
    )]
    NoCategoryHeader {
        sheet: String,
        institute_code: String,
        start_row: u32,
        searched_rows: u32,
    },

    /// The decoder ran but produced no text primitives.
    #[error("{source_name}: decoder produced no text")]
    EmptyDocument { source_name: String },

    /// The decoder failed outright; the whole document is skipped.
    #[error("{source_name}: {detail}")]
    Decode { source_name: String, detail: String },
}

impl DocumentError {
    /// Wrap a fatal per-file error so a batch can record it and move on.
    pub fn from_fatal(source_name: impl Into<String>, err: &ExtractError) -> Self {
        DocumentError::Decode {
            source_name: source_name.into(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_category_header_display() {
        let e = DocumentError::NoCategoryHeader {
            sheet: "Round 1".into(),
            institute_code: "E010".into(),
            start_row: 5,
            searched_rows: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("E010"), "got: {msg}");
        assert!(msg.contains("row 5"), "got: {msg}");
        assert!(msg.contains("Round 1"), "got: {msg}");
    }

    #[test]
    fn fatal_is_wrapped_with_source() {
        let fatal = ExtractError::DecodeFailed {
            path: PathBuf::from("broken.xlsx"),
            detail: "zip header missing".into(),
        };
        let e = DocumentError::from_fatal("broken.xlsx", &fatal);
        let msg = e.to_string();
        assert!(msg.starts_with("broken.xlsx:"), "got: {msg}");
        assert!(msg.contains("zip header missing"));
    }

    #[test]
    fn invalid_pattern_display() {
        let e = ExtractError::InvalidPattern {
            name: "institute_code_pattern".into(),
            detail: "unclosed group".into(),
        };
        assert!(e.to_string().contains("institute_code_pattern"));
    }

    #[test]
    fn output_write_failed_has_source() {
        use std::error::Error as _;
        let e = ExtractError::OutputWriteFailed {
            path: PathBuf::from("/nope/out.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing dir"),
        };
        assert!(e.source().is_some());
    }
}
