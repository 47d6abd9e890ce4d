//! Output types: extracted records, run summaries and batch results.
//!
//! Everything here is plain data with `serde` derives so the CLI (or any
//! caller) can write it straight to JSON. Field names serialise in
//! camelCase to match the dashboard's existing JSON files.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One row of a student's option-entry (preference) list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceEntry {
    /// Option number as printed, or the record's ordinal when none was found.
    pub priority: u32,
    pub institute_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
    pub institute_name: String,
    pub branch_name: String,
    /// Fee amount as printed (`"1,23,000"`), digits and separators only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    /// A known city found in the institute text, else the state name.
    pub city: String,
}

/// One closing rank for one course and category at one institute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffEntry {
    pub institute: String,
    pub institute_code: String,
    pub course: String,
    pub category: String,
    pub cutoff_rank: u32,
    pub year: Option<u16>,
    pub round: Option<String>,
}

/// Counters and messages for one extraction run.
///
/// Summaries from several sheets or documents combine with
/// [`RunSummary::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Distinct institutes seen (preference path) or blocks found (cutoff path).
    pub institutes_found: usize,
    pub records_produced: usize,
    /// Non-fatal errors, one message each.
    pub errors: Vec<String>,
    /// Cutoff values dropped by range validation.
    pub filtered: usize,
    /// Tokens that fell in the ambiguous zone and were settled by keyword.
    pub ambiguous_tokens: usize,
    /// Fee anchors that re-learned the column boundary.
    pub boundary_recalibrations: usize,
    /// Footer, column-title and repeated header rows skipped.
    pub noise_rows: usize,
    /// Continuation rows seen before any record was open.
    pub rows_discarded: usize,
    /// Pending records dropped for lacking a usable primary part.
    pub records_discarded: usize,
    /// Documents that failed to decode or produced no primitives.
    pub failed_documents: usize,
}

impl RunSummary {
    /// Record a non-fatal error.
    pub fn record_error(&mut self, error: &DocumentError) {
        self.errors.push(error.to_string());
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.institutes_found += other.institutes_found;
        self.records_produced += other.records_produced;
        self.errors.extend(other.errors.iter().cloned());
        self.filtered += other.filtered;
        self.ambiguous_tokens += other.ambiguous_tokens;
        self.boundary_recalibrations += other.boundary_recalibrations;
        self.noise_rows += other.noise_rows;
        self.rows_discarded += other.rows_discarded;
        self.records_discarded += other.records_discarded;
        self.failed_documents += other.failed_documents;
    }
}

/// Records of one kind plus the summary of the run that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction<R> {
    pub records: Vec<R>,
    pub summary: RunSummary,
}

impl<R> Default for Extraction<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            summary: RunSummary::default(),
        }
    }
}

/// Which table layout a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Page-text option-entry list (PDF).
    Preferences,
    /// Spreadsheet of cutoff ranks per institute block.
    Cutoffs,
}

impl DocumentKind {
    /// Infer the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Preferences),
            e if crate::pipeline::decode::WORKBOOK_EXTENSIONS.contains(&e) => {
                Some(DocumentKind::Cutoffs)
            }
            _ => None,
        }
    }
}

/// The outcome of extracting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    /// Position of the document in the batch input (0-based).
    pub index: usize,
    /// Path or label of the source.
    pub source: String,
    /// `None` when the kind could not be determined.
    pub kind: Option<DocumentKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<PreferenceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cutoffs: Vec<CutoffEntry>,
    pub summary: RunSummary,
    pub duration_ms: u64,
}

impl DocumentResult {
    /// A result for a document that could not be extracted at all.
    pub fn failed(
        index: usize,
        source: impl Into<String>,
        kind: Option<DocumentKind>,
        error: &DocumentError,
    ) -> Self {
        let mut summary = RunSummary {
            failed_documents: 1,
            ..RunSummary::default()
        };
        summary.record_error(error);
        Self {
            index,
            source: source.into(),
            kind,
            preferences: Vec::new(),
            cutoffs: Vec::new(),
            summary,
            duration_ms: 0,
        }
    }

    pub fn record_count(&self) -> usize {
        self.preferences.len() + self.cutoffs.len()
    }

    pub fn is_failed(&self) -> bool {
        self.summary.failed_documents > 0
    }
}

/// Per-document line of a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub source: String,
    pub kind: Option<DocumentKind>,
    pub records: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Merged result of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutput {
    pub preferences: Vec<PreferenceEntry>,
    pub cutoffs: Vec<CutoffEntry>,
    pub summary: RunSummary,
    pub documents: Vec<DocumentReport>,
}

impl BatchOutput {
    /// Concatenate document results. Callers pass them in input order.
    pub fn from_results(results: impl IntoIterator<Item = DocumentResult>) -> Self {
        let mut out = BatchOutput::default();
        for result in results {
            out.summary.merge(&result.summary);
            out.documents.push(DocumentReport {
                records: result.record_count(),
                source: result.source,
                kind: result.kind,
                errors: result.summary.errors,
                duration_ms: result.duration_ms,
            });
            out.preferences.extend(result.preferences);
            out.cutoffs.extend(result.cutoffs);
        }
        out
    }

    pub fn record_count(&self) -> usize {
        self.preferences.len() + self.cutoffs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/list.PDF")), Some(DocumentKind::Preferences));
        assert_eq!(DocumentKind::from_path(Path::new("cut.xlsx")), Some(DocumentKind::Cutoffs));
        assert_eq!(DocumentKind::from_path(Path::new("cut.ods")), Some(DocumentKind::Cutoffs));
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn merge_adds_counters_and_keeps_errors() {
        let mut a = RunSummary {
            institutes_found: 2,
            records_produced: 10,
            filtered: 1,
            errors: vec!["first".into()],
            ..RunSummary::default()
        };
        let b = RunSummary {
            institutes_found: 1,
            records_produced: 4,
            ambiguous_tokens: 3,
            errors: vec!["second".into()],
            ..RunSummary::default()
        };
        a.merge(&b);
        assert_eq!(a.institutes_found, 3);
        assert_eq!(a.records_produced, 14);
        assert_eq!(a.filtered, 1);
        assert_eq!(a.ambiguous_tokens, 3);
        assert_eq!(a.errors, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn preference_entry_serialises_camel_case() {
        let e = PreferenceEntry {
            priority: 1,
            institute_code: "E001".into(),
            branch_code: Some("CS".into()),
            institute_name: "ABC Engineering College".into(),
            branch_name: "CS Computer Science".into(),
            fee: None,
            city: "Karnataka".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["instituteCode"], "E001");
        assert_eq!(json["branchName"], "CS Computer Science");
        assert!(json.get("fee").is_none());
    }

    #[test]
    fn batch_concatenates_in_given_order() {
        let failed = DocumentResult::failed(
            1,
            "b.pdf",
            Some(DocumentKind::Preferences),
            &DocumentError::EmptyDocument {
                source_name: "b.pdf".into(),
            },
        );
        let ok = DocumentResult {
            index: 0,
            source: "a.xlsx".into(),
            kind: Some(DocumentKind::Cutoffs),
            preferences: Vec::new(),
            cutoffs: vec![CutoffEntry {
                institute: "X".into(),
                institute_code: "E010".into(),
                course: "AI".into(),
                category: "GM".into(),
                cutoff_rank: 5,
                year: None,
                round: None,
            }],
            summary: RunSummary {
                records_produced: 1,
                ..RunSummary::default()
            },
            duration_ms: 3,
        };
        let batch = BatchOutput::from_results(vec![ok, failed]);
        assert_eq!(batch.record_count(), 1);
        assert_eq!(batch.summary.failed_documents, 1);
        assert_eq!(batch.summary.errors.len(), 1);
        assert_eq!(batch.documents[0].source, "a.xlsx");
        assert_eq!(batch.documents[1].errors.len(), 1);
    }
}
