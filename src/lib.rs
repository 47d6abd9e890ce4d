//! # admission-tables
//!
//! Layout-aware extraction of admission tables from PDFs and spreadsheets.
//!
//! ## Why this crate?
//!
//! Option-entry lists and cutoff-rank sheets published by admission
//! authorities have no reliable delimiters. Columns exist only as x-positions
//! on a page, records wrap over several lines, and one sheet stacks dozens of
//! institutes each with its own header row. Generic table extractors either
//! merge neighbouring columns or drop wrapped lines, and the damage is silent:
//! a fee lands in a course name, a rank shifts to the wrong category.
//!
//! This crate finds low-ambiguity anchors (institute codes, fee amounts,
//! category labels), learns column boundaries from them as it reads, and
//! reassembles multi-line records with an explicit state machine. Every
//! fallback is deterministic and every dropped value is counted.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / workbook
//!  │
//!  ├─ 1. Decode     pdfium text segments or calamine cells (spawn_blocking)
//!  ├─ 2. Tokens     trimmed, positioned text
//!  ├─ 3. Rows       baseline clustering (PDF) or row index (sheet)
//!  ├─ 4. Anchors    codes, fees, categories; learned column boundary
//!  ├─ 5. Blocks     per-institute ranges + category header (sheet only)
//!  ├─ 6. Assemble   Idle/Accumulating record state machine
//!  └─ 7. Canonical  noise stripping, placeholder names, city lookup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use admission_tables::{extract_batch, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder().year(2024).round("Round 1").build()?;
//!     let output = extract_batch(&["options.pdf", "cutoffs.xlsx"], None, &config).await?;
//!     println!("{} preferences, {} cutoffs", output.preferences.len(), output.cutoffs.len());
//!     eprintln!("filtered: {}, errors: {:?}", output.summary.filtered, output.summary.errors);
//!     Ok(())
//! }
//! ```
//!
//! Already have decoded primitives? Skip the file layer:
//!
//! ```rust
//! use admission_tables::{Extractor, ExtractionConfig, PageText, TextFragment};
//!
//! let extractor = Extractor::new(ExtractionConfig::default()).unwrap();
//! let page = PageText::new(1, vec![
//!     TextFragment::new("E001 ABC Engineering College", 40.0, 700.0),
//!     TextFragment::new("CS Computer Science", 150.0, 700.0),
//!     TextFragment::new("1,23,000", 310.0, 700.0),
//! ]);
//! let out = extractor.extract_preferences("options.pdf", &[page]);
//! assert_eq!(out.records[0].institute_code, "E001");
//! assert_eq!(out.records[0].fee.as_deref(), Some("1,23,000"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `admit-extract` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! admission-tables = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, SessionInfo, Thresholds, Vocabulary};
pub use error::{DocumentError, ExtractError};
pub use extract::{extract_batch, extract_file, write_json, Extractor};
pub use output::{
    BatchOutput, CutoffEntry, DocumentKind, DocumentReport, DocumentResult, Extraction,
    PreferenceEntry, RunSummary,
};
pub use pipeline::token::{CellValue, PageText, Sheet, TextFragment, Workbook};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, DocumentStream};
