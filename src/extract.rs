//! Extraction entry points.
//!
//! [`Extractor`] holds the compiled form of an [`ExtractionConfig`] (anchor
//! patterns, keyword matchers, cleanup rules) and runs either source path
//! over primitives already in memory:
//!
//! * [`Extractor::extract_preferences`] — page text → [`PreferenceEntry`]
//! * [`Extractor::extract_cutoffs`] — workbook → [`CutoffEntry`]
//!
//! The file-level functions add decoding on the blocking pool, and
//! [`extract_batch`] runs many files through [`crate::stream::extract_stream`]
//! and merges the results back into input order.
//!
//! Learner and segmenter state is created fresh inside every call, so one
//! `Extractor` can serve any number of documents concurrently and running
//! it twice on the same input gives the same output.

use crate::config::ExtractionConfig;
use crate::error::{DocumentError, ExtractError};
use crate::output::{
    BatchOutput, CutoffEntry, DocumentKind, DocumentResult, Extraction, PreferenceEntry,
    RunSummary,
};
use crate::pipeline::anchor::AnchorDetector;
use crate::pipeline::assemble::{PendingCutoff, PendingPreference, RecordAssembler, RowEvent};
use crate::pipeline::boundary::{bucket_row, ExtractionContext, KeywordMatcher};
use crate::pipeline::canonical::{infer_year, Canonicalizer};
use crate::pipeline::decode;
use crate::pipeline::rows::{group_page_rows, group_sheet_row};
use crate::pipeline::segment::{BlockSegmenter, InstituteBlock, CategoryHeaderInfo};
use crate::pipeline::token::{normalize_fragments, PageText, Sheet, Workbook};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A compiled, reusable extractor.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    detector: AnchorDetector,
    keywords: KeywordMatcher,
    canonicalizer: Canonicalizer,
    initial_context: ExtractionContext,
}

impl Extractor {
    /// Compile every pattern in the configuration.
    ///
    /// # Errors
    /// [`ExtractError::InvalidPattern`] for a pattern that does not compile,
    /// [`ExtractError::InvalidConfig`] for inverted default boundaries.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let detector = AnchorDetector::new(&config.vocabulary)?;
        let keywords = KeywordMatcher::new(&config.vocabulary.institution_keywords)?;
        let canonicalizer = Canonicalizer::new(&config.vocabulary, &config.thresholds)?;
        let initial_context = ExtractionContext::new(&config.thresholds)?;
        Ok(Self {
            config,
            detector,
            keywords,
            canonicalizer,
            initial_context,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    // ── Page-text path ───────────────────────────────────────────────────

    /// Extract preference entries from the pages of one document.
    ///
    /// Pages are processed in `page_number` order with one learner state
    /// carried across all of them. `source` labels errors in the summary.
    pub fn extract_preferences(&self, source: &str, pages: &[PageText]) -> Extraction<PreferenceEntry> {
        let mut summary = RunSummary::default();
        let mut ordered: Vec<&PageText> = pages.iter().collect();
        ordered.sort_by_key(|p| p.page_number);

        let mut ctx = self.initial_context.clone();
        let mut assembler = RecordAssembler::<PendingPreference>::new();
        let mut token_count = 0usize;

        for page in ordered {
            let tokens = normalize_fragments(page);
            token_count += tokens.len();
            let rows = group_page_rows(tokens, self.config.thresholds.row_tolerance);
            debug!(page = page.page_number, rows = rows.len(), "page grouped");

            for row in rows {
                let anchors = self.detector.detect(&row);
                if self.detector.is_noise_row(&row, &anchors) {
                    summary.noise_rows += 1;
                    continue;
                }
                let buckets = bucket_row(&row, &anchors, &mut ctx, &self.keywords);
                match &anchors.institute {
                    Some(code) => {
                        assembler.push(RowEvent::Anchor(PendingPreference::open(code, buckets)))
                    }
                    None if buckets.is_empty() => {}
                    None => assembler.push(RowEvent::Continuation(buckets)),
                }
            }
        }

        if token_count == 0 {
            let err = DocumentError::EmptyDocument {
                source_name: source.to_string(),
            };
            warn!("{}", err);
            summary.record_error(&err);
            summary.failed_documents = 1;
            return Extraction {
                records: Vec::new(),
                summary,
            };
        }

        let assembled = assembler.finish();
        summary.rows_discarded = assembled.discarded_rows;
        summary.records_discarded = assembled.discarded_records;
        summary.ambiguous_tokens = ctx.ambiguous_tokens;
        summary.boundary_recalibrations = ctx.recalibrations;

        let records: Vec<PreferenceEntry> = assembled
            .records
            .into_iter()
            .enumerate()
            .map(|(i, pending)| self.finalize_preference(i + 1, pending))
            .collect();

        summary.institutes_found = records
            .iter()
            .map(|r| r.institute_code.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        summary.records_produced = records.len();

        info!(
            source,
            records = records.len(),
            institutes = summary.institutes_found,
            ambiguous = summary.ambiguous_tokens,
            "preferences extracted"
        );
        Extraction { records, summary }
    }

    fn finalize_preference(&self, ordinal: usize, pending: PendingPreference) -> PreferenceEntry {
        let priority = pending
            .priority_parts
            .iter()
            .flat_map(|p| p.split_whitespace())
            .find_map(|w| w.trim_end_matches(['.', ')']).parse::<u32>().ok())
            .unwrap_or(ordinal as u32);

        let branch_code = pending.branch_code.clone().or_else(|| {
            pending
                .course_parts
                .first()
                .and_then(|p| p.split_whitespace().next())
                .filter(|w| self.canonicalizer.is_known_branch(w))
                .map(str::to_uppercase)
        });

        let institute_name = self
            .canonicalizer
            .institute_name(&pending.institute_text(), &pending.institute_code);
        let city = self.canonicalizer.city(&institute_name);

        PreferenceEntry {
            priority,
            branch_name: self
                .canonicalizer
                .branch_name(&pending.course_text(), branch_code.as_deref()),
            fee: self.canonicalizer.clean_fee(&self.detector, &pending.fee_text()),
            institute_code: pending.institute_code,
            branch_code,
            institute_name,
            city,
        }
    }

    // ── Spreadsheet path ─────────────────────────────────────────────────

    /// Extract cutoff entries from every sheet of a workbook.
    ///
    /// Sheets are independent; their summaries are merged in sheet order.
    pub fn extract_cutoffs(&self, source: &str, workbook: &Workbook) -> Extraction<CutoffEntry> {
        let mut out = Extraction::default();

        if workbook.sheets.iter().all(Sheet::is_empty) {
            let err = DocumentError::EmptyDocument {
                source_name: source.to_string(),
            };
            warn!("{}", err);
            out.summary.record_error(&err);
            out.summary.failed_documents = 1;
            return out;
        }

        for sheet in &workbook.sheets {
            let sheet_out = self.extract_sheet(sheet);
            out.records.extend(sheet_out.records);
            out.summary.merge(&sheet_out.summary);
        }

        info!(
            source,
            records = out.records.len(),
            blocks = out.summary.institutes_found,
            filtered = out.summary.filtered,
            errors = out.summary.errors.len(),
            "cutoffs extracted"
        );
        out
    }

    /// Extract cutoff entries from one sheet.
    pub fn extract_sheet(&self, sheet: &Sheet) -> Extraction<CutoffEntry> {
        let mut out = Extraction::default();
        if sheet.is_empty() {
            return out;
        }

        let segmenter = BlockSegmenter::new(&self.detector, &self.config.thresholds);
        let blocks = segmenter.find_blocks(sheet);
        out.summary.institutes_found = blocks.len();

        let year = self.config.session.year.or_else(|| infer_year(&sheet.name));
        let round = self.config.session.round.clone();

        for block in &blocks {
            let Some(header) = segmenter.locate_category_header(sheet, block) else {
                let err = DocumentError::NoCategoryHeader {
                    sheet: sheet.name.clone(),
                    institute_code: block.institute_code.clone(),
                    start_row: block.start_row,
                    searched_rows: segmenter.header_search_rows(),
                };
                warn!("{}", err);
                out.summary.record_error(&err);
                continue;
            };

            let before = out.records.len();
            self.extract_block(sheet, &segmenter, block, &header, year, round.as_deref(), &mut out);
            debug!(
                code = %block.institute_code,
                records = out.records.len() - before,
                "block extracted"
            );
        }

        out.summary.records_produced = out.records.len();
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_block(
        &self,
        sheet: &Sheet,
        segmenter: &BlockSegmenter<'_>,
        block: &InstituteBlock,
        header: &CategoryHeaderInfo,
        year: Option<u16>,
        round: Option<&str>,
        out: &mut Extraction<CutoffEntry>,
    ) {
        let mut assembler = RecordAssembler::<PendingCutoff>::new();

        for row_index in header.header_row + 1..=block.end_row {
            let row = group_sheet_row(sheet, row_index);
            if segmenter.is_header_row(&row) {
                out.summary.noise_rows += 1;
                continue;
            }
            let parts = header.split_row(&row);
            let event = match (&parts.course, parts.ranks.is_empty()) {
                (None, true) => continue,
                (None, false) => RowEvent::Continuation(parts),
                // A course without ranks only extends the open name when it
                // could not start a course of its own.
                (Some(course), true)
                    if assembler.is_accumulating() && !self.starts_course(course) =>
                {
                    RowEvent::Continuation(parts)
                }
                (Some(_), _) => RowEvent::Anchor(PendingCutoff::open(parts)),
            };
            assembler.push(event);
        }

        let assembled = assembler.finish();
        out.summary.rows_discarded += assembled.discarded_rows;
        out.summary.records_discarded += assembled.discarded_records;

        let institute = self
            .canonicalizer
            .institute_name(&block.institute_name, &block.institute_code);
        let (min, max) = (self.config.thresholds.min_rank, self.config.thresholds.max_rank);

        for pending in assembled.records {
            let raw_course = pending.course_text();
            let cleaned = self.canonicalizer.clean_text(&raw_course);
            let course = if cleaned.is_empty() { raw_course } else { cleaned };

            for (category, rank) in pending.ranks {
                let accepted = (min..=max)
                    .contains(&rank)
                    .then(|| u32::try_from(rank).ok())
                    .flatten();
                let Some(cutoff_rank) = accepted else {
                    debug!(code = %block.institute_code, %category, rank, "rank out of range, dropped");
                    out.summary.filtered += 1;
                    continue;
                };
                out.records.push(CutoffEntry {
                    institute: institute.clone(),
                    institute_code: block.institute_code.clone(),
                    course: course.clone(),
                    category,
                    cutoff_rank,
                    year,
                    round: round.map(str::to_string),
                });
            }
        }
    }

    /// Whether course text opens with an upper-case branch code
    /// (`ME Mechanical`, not `is` or `Me`).
    fn starts_course(&self, course: &str) -> bool {
        course.split_whitespace().next().is_some_and(|w| {
            w.chars().all(|c| c.is_ascii_uppercase()) && self.canonicalizer.is_known_branch(w)
        })
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Decode one file on the blocking pool and extract it.
    ///
    /// `kind` overrides the extension-based guess.
    ///
    /// # Errors
    /// Fatal errors for this file only: missing or unreadable file, unknown
    /// extension, wrong password, decoder failure.
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
        kind: Option<DocumentKind>,
    ) -> Result<DocumentResult, ExtractError> {
        let start = Instant::now();
        let path = path.as_ref().to_path_buf();
        check_readable(&path)?;
        let kind = kind
            .or_else(|| DocumentKind::from_path(&path))
            .ok_or_else(|| ExtractError::UnsupportedFormat { path: path.clone() })?;

        let source = path.display().to_string();
        let extractor = self.clone();
        let blocking_source = source.clone();
        let mut result = tokio::task::spawn_blocking(move || -> Result<DocumentResult, ExtractError> {
            let mut result = DocumentResult {
                index: 0,
                source: blocking_source,
                kind: Some(kind),
                preferences: Vec::new(),
                cutoffs: Vec::new(),
                summary: RunSummary::default(),
                duration_ms: 0,
            };
            match kind {
                DocumentKind::Preferences => {
                    let pages = decode::decode_pdf(&path, extractor.config.password.as_deref())?;
                    let ex = extractor.extract_preferences(&result.source, &pages);
                    result.preferences = ex.records;
                    result.summary = ex.summary;
                }
                DocumentKind::Cutoffs => {
                    let workbook = decode::decode_workbook(&path)?;
                    let ex = extractor.extract_cutoffs(&result.source, &workbook);
                    result.cutoffs = ex.records;
                    result.summary = ex.summary;
                }
            }
            Ok(result)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {e}")))??;

        result.duration_ms = start.elapsed().as_millis() as u64;
        debug!(source = %source, ms = result.duration_ms, "document done");
        Ok(result)
    }
}

fn check_readable(path: &Path) -> Result<(), ExtractError> {
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(ExtractError::DecodeFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}

/// Extract one file with a fresh [`Extractor`].
pub async fn extract_file(
    path: impl AsRef<Path>,
    kind: Option<DocumentKind>,
    config: &ExtractionConfig,
) -> Result<DocumentResult, ExtractError> {
    Extractor::new(config.clone())?.extract_file(path, kind).await
}

/// Extract many files and merge the results in input order.
///
/// Per-document failures are recorded in the summary and never abort the
/// batch. Only an unusable configuration is an error.
pub async fn extract_batch<P: AsRef<Path>>(
    inputs: &[P],
    kind: Option<DocumentKind>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    let sources: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let total = sources.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<DocumentResult> = crate::stream::extract_stream(sources, kind, config)?
        .collect()
        .await;
    results.sort_by_key(|r| r.index);

    let output = BatchOutput::from_results(results);
    info!(
        documents = total,
        records = output.record_count(),
        failed = output.summary.failed_documents,
        "batch complete"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, output.record_count());
    }
    Ok(output)
}

/// Serialise `value` as pretty JSON to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_json<T: serde::Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), ExtractError> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| ExtractError::Internal(format!("JSON serialisation failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::token::{CellValue, TextFragment};

    fn extractor() -> Extractor {
        Extractor::new(ExtractionConfig::default()).unwrap()
    }

    fn frag(text: &str, x: f32, y: f32) -> TextFragment {
        TextFragment::new(text, x, y)
    }

    #[test]
    fn priority_taken_from_leading_number() {
        let page = PageText::new(
            1,
            vec![
                frag("7", 10.0, 700.0),
                frag("E001", 40.0, 700.0),
                frag("CS Computer Science", 100.0, 700.0),
                frag("1,23,000", 310.0, 700.0),
                frag("ABC College", 400.0, 700.0),
            ],
        );
        let out = extractor().extract_preferences("t", &[page]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].priority, 7);
        assert_eq!(out.records[0].branch_code.as_deref(), Some("CS"));
    }

    #[test]
    fn ordinal_priority_when_none_printed() {
        let page = PageText::new(
            1,
            vec![
                frag("E001", 40.0, 700.0),
                frag("CS", 100.0, 700.0),
                frag("E002", 40.0, 600.0),
                frag("ME", 100.0, 600.0),
            ],
        );
        let out = extractor().extract_preferences("t", &[page]);
        let p: Vec<_> = out.records.iter().map(|r| r.priority).collect();
        assert_eq!(p, vec![1, 2]);
        assert_eq!(out.records[0].branch_name, "Computer Science and Engineering");
        assert_eq!(out.records[1].institute_name, "College E002");
    }

    #[test]
    fn pages_follow_page_number_not_slice_order() {
        let p2 = PageText::new(2, vec![frag("E002", 40.0, 700.0)]);
        let p1 = PageText::new(1, vec![frag("E001", 40.0, 700.0)]);
        let out = extractor().extract_preferences("t", &[p2, p1]);
        let codes: Vec<_> = out.records.iter().map(|r| r.institute_code.as_str()).collect();
        assert_eq!(codes, vec!["E001", "E002"]);
    }

    #[test]
    fn empty_pages_are_an_empty_document() {
        let out = extractor().extract_preferences("blank.pdf", &[PageText::new(1, vec![frag("  ", 1.0, 1.0)])]);
        assert!(out.records.is_empty());
        assert_eq!(out.summary.failed_documents, 1);
        assert!(out.summary.errors[0].contains("blank.pdf"));
    }

    #[test]
    fn wrapped_course_row_continues_record() {
        let mut rows = vec![vec![CellValue::Empty; 6]; 5];
        rows[0][0] = "E010 Some College".into();
        rows[1][0] = "Course".into();
        rows[1][2] = "GM".into();
        rows[1][3] = "1G".into();
        rows[1][4] = "SCG".into();
        rows[2][0] = "CS Computer".into();
        rows[2][2] = CellValue::Number(100.0);
        rows[3][0] = "Science".into();
        let sheet = Sheet::new("2024", 0, 0, rows);
        let out = extractor().extract_sheet(&sheet);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].course, "CS Computer Science");
        assert_eq!(out.records[0].year, Some(2024));
    }

    #[tokio::test]
    async fn missing_file_is_fatal_for_that_file() {
        let err = extractor()
            .extract_file("/definitely/not/here.pdf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        let err = extractor().extract_file(&path, None).await.unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn write_json_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.json");
        write_json(&BatchOutput::default(), &path).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        let back: BatchOutput = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, BatchOutput::default());
    }
}
