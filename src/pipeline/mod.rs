//! Pipeline stages for layout-aware table extraction.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the two source kinds share every
//! stage that does not depend on geometry.
//!
//! ## Data Flow
//!
//! ```text
//! page text ──▶ token ──▶ rows ──▶ anchor ⇄ boundary ──▶ assemble ──▶ canonical
//! workbook  ──▶ token ──▶ segment ──▶ rows ──▶ anchor ──▶ assemble ──▶ canonical
//! ```
//!
//! 1. [`decode`]    — load PDF text segments (pdfium) or workbook cells
//!    (calamine) up front; the only stage doing I/O
//! 2. [`token`]     — one trimmed, non-empty token shape for both sources
//! 3. [`rows`]      — cluster page tokens into visual rows by baseline
//! 4. [`anchor`]    — institute codes, fee amounts, category labels; row
//!    noise filters
//! 5. [`boundary`]  — learned column boundary and token bucketing for rows
//!    without a fee anchor
//! 6. [`segment`]   — split a sheet into institute blocks and find each
//!    block's category header
//! 7. [`assemble`]  — Idle/Accumulating state machine joining continuation
//!    rows onto their record
//! 8. [`canonical`] — noise stripping, placeholder names, city lookup

pub mod anchor;
pub mod assemble;
pub mod boundary;
pub mod canonical;
pub mod decode;
pub mod rows;
pub mod segment;
pub mod token;

