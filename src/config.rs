//! Configuration types for table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`] or loaded from a TOML file. The config
//! splits into three parts:
//!
//! * [`Vocabulary`] — the injected word lists and patterns (institute-code
//!   format, category codes, branch names, cities, noise words). The
//!   algorithms never hard-code any of these.
//! * [`Thresholds`] — numeric knobs (row tolerance, header search budget,
//!   rank bounds, default column boundaries).
//! * [`SessionInfo`] — the admission year and round stamped onto cutoff
//!   entries.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Configuration for one extraction run or batch.
///
/// # Example
/// ```rust
/// use admission_tables::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .row_tolerance(8.0)
///     .year(2024)
///     .round("Round 2")
///     .build()
///     .unwrap();
/// assert_eq!(config.session.year, Some(2024));
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Patterns and word lists consumed by the extractor.
    pub vocabulary: Vocabulary,

    /// Numeric knobs for grouping, segmentation and validation.
    pub thresholds: Thresholds,

    /// Year and round stamped onto cutoff entries.
    pub session: SessionInfo,

    /// Number of documents decoded and extracted at once in a batch. Default:
    /// available parallelism.
    ///
    /// Each document carries its own learner state, so documents never share
    /// mutable data; this only bounds how many run at the same time.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional per-document progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            thresholds: Thresholds::default(),
            session: SessionInfo::default(),
            concurrency: default_concurrency(),
            password: None,
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("vocabulary", &self.vocabulary)
            .field("thresholds", &self.thresholds)
            .field("session", &self.session)
            .field("concurrency", &self.concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reopen a built configuration for further overrides.
    pub fn into_builder(self) -> ExtractionConfigBuilder {
        ExtractionConfigBuilder { config: self }
    }

    /// Parse a TOML document with optional `[vocabulary]`, `[thresholds]`
    /// and `[session]` tables. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ExtractError> {
        let file: ConfigFile =
            toml::from_str(input).map_err(|e| ExtractError::InvalidConfig(e.to_string()))?;
        file.into_builder().build()
    }

    /// Read and parse a TOML configuration file.
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ExtractError::ConfigLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| ExtractError::ConfigLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        file.into_builder().build()
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.config.vocabulary = vocabulary;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn session(mut self, session: SessionInfo) -> Self {
        self.config.session = session;
        self
    }

    pub fn row_tolerance(mut self, units: f32) -> Self {
        self.config.thresholds.row_tolerance = units;
        self
    }

    pub fn header_search_rows(mut self, rows: u32) -> Self {
        self.config.thresholds.header_search_rows = rows.max(1);
        self
    }

    pub fn min_header_categories(mut self, n: usize) -> Self {
        self.config.thresholds.min_header_categories = n.max(1);
        self
    }

    pub fn rank_bounds(mut self, min: i64, max: i64) -> Self {
        self.config.thresholds.min_rank = min;
        self.config.thresholds.max_rank = max;
        self
    }

    pub fn default_boundaries(mut self, fee_start: f32, college_start: f32) -> Self {
        self.config.thresholds.default_fee_start = fee_start;
        self.config.thresholds.default_college_start = college_start;
        self
    }

    pub fn fee_margin(mut self, units: f32) -> Self {
        self.config.thresholds.fee_margin = units;
        self
    }

    pub fn fee_column_width(mut self, units: f32) -> Self {
        self.config.thresholds.fee_column_width = units;
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.config.session.year = Some(year);
        self
    }

    pub fn round(mut self, round: impl Into<String>) -> Self {
        self.config.session.round = Some(round.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Regex compilation is checked separately when an
    /// [`crate::extract::Extractor`] is created.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let t = &self.config.thresholds;
        if !(t.row_tolerance > 0.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "row_tolerance must be > 0, got {}",
                t.row_tolerance
            )));
        }
        if t.fee_margin < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "fee_margin must be ≥ 0, got {}",
                t.fee_margin
            )));
        }
        if !(t.fee_column_width > 0.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "fee_column_width must be > 0, got {}",
                t.fee_column_width
            )));
        }
        if t.default_fee_start >= t.default_college_start {
            return Err(ExtractError::InvalidConfig(format!(
                "default_fee_start ({}) must be below default_college_start ({})",
                t.default_fee_start, t.default_college_start
            )));
        }
        if t.min_rank > t.max_rank {
            return Err(ExtractError::InvalidConfig(format!(
                "min_rank ({}) must not exceed max_rank ({})",
                t.min_rank, t.max_rank
            )));
        }
        if t.min_header_categories == 0 {
            return Err(ExtractError::InvalidConfig(
                "min_header_categories must be ≥ 1".into(),
            ));
        }
        if self.config.vocabulary.category_codes.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "category_codes must not be empty".into(),
            ));
        }
        if self.config.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Injected data ────────────────────────────────────────────────────────

/// Patterns and word lists the extractor consumes but does not own.
///
/// Every list is matched case-insensitively unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Regex for an institute code. Must define a `code` group; an optional
    /// `branch` group captures trailing branch letters (`E001CS`).
    pub institute_code_pattern: String,

    /// Regex for a fee amount: a grouped-digit number with at least one
    /// thousands separator.
    pub fee_pattern: String,

    /// Closed set of category labels (matched exactly, case-insensitive).
    pub category_codes: Vec<String>,

    /// Branch code → branch name fallback table.
    pub branch_names: BTreeMap<String, String>,

    /// Known city names used to derive the location field.
    pub cities: Vec<String>,

    /// Location used when no known city is found.
    pub state_name: String,

    /// Words that route an ambiguous-zone token to the institute name.
    pub institution_keywords: Vec<String>,

    /// Words stripped from free text (spelled-out amounts and currency).
    pub noise_words: Vec<String>,

    /// Column-title phrases; a row with two or more of them and no code
    /// is a repeated table header.
    pub header_markers: Vec<String>,

    /// Regexes for whole rows to drop (page footers, print stamps).
    pub skip_row_patterns: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let branch_names = [
            ("AI", "Artificial Intelligence and Machine Learning"),
            ("AE", "Aeronautical Engineering"),
            ("BT", "Biotechnology"),
            ("CE", "Civil Engineering"),
            ("CH", "Chemical Engineering"),
            ("CS", "Computer Science and Engineering"),
            ("DS", "Computer Science and Engineering (Data Science)"),
            ("EC", "Electronics and Communication Engineering"),
            ("EE", "Electrical and Electronics Engineering"),
            ("EI", "Electronics and Instrumentation Engineering"),
            ("IE", "Information Science and Engineering"),
            ("IS", "Information Science and Engineering"),
            ("ME", "Mechanical Engineering"),
            ("RO", "Robotics and Automation"),
            ("TX", "Textile Technology"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            institute_code_pattern: r"\b(?P<code>E\d{3})(?P<branch>[A-Z]{1,3})?\b".into(),
            fee_pattern: r"\d{1,3}(?:,\d{2,3})+(?:\.\d+)?".into(),
            category_codes: to_strings(&[
                "1G", "1K", "1R", "2AG", "2AK", "2AR", "2BG", "2BK", "2BR", "3AG", "3AK", "3AR",
                "3BG", "3BK", "3BR", "GM", "GMK", "GMR", "SCG", "SCK", "SCR", "STG", "STK", "STR",
            ]),
            branch_names,
            cities: to_strings(&[
                "Bangalore",
                "Bengaluru",
                "Mysore",
                "Mysuru",
                "Mangalore",
                "Mangaluru",
                "Hubli",
                "Dharwad",
                "Belgaum",
                "Belagavi",
                "Tumkur",
                "Davangere",
                "Shimoga",
                "Hassan",
                "Udupi",
                "Gulbarga",
                "Kalaburagi",
                "Bellary",
                "Mandya",
                "Bidar",
            ]),
            state_name: "Karnataka".into(),
            institution_keywords: to_strings(&[
                "College",
                "Institute",
                "Institution",
                "University",
                "Academy",
                "Road",
                "Rd",
                "District",
                "Dist",
                "Taluk",
                "Nagar",
                "Layout",
                "Campus",
                "Post",
            ]),
            noise_words: to_strings(&[
                "Lakh", "Lakhs", "Thousand", "Hundred", "Rupees", "Rs", "Only", "One", "Two",
                "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
                "Twelve", "Fifteen", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy",
                "Eighty", "Ninety",
            ]),
            header_markers: to_strings(&[
                "Sl No",
                "Sl. No",
                "Option No",
                "Priority",
                "Course Code",
                "Course Name",
                "College Code",
                "College Name",
                "Fee",
                "Fees",
            ]),
            skip_row_patterns: to_strings(&[
                r"(?i)^page\s*\d+(\s*of\s*\d+)?$",
                r"(?i)^printed\s+on\b",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Numeric knobs for grouping, segmentation and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Maximum y-distance (page units) between consecutive tokens of one
    /// visual row. Default: 10.0.
    pub row_tolerance: f32,

    /// Rows scanned below an institute marker when looking for the category
    /// header. The marker row itself is scanned too. Default: 10.
    pub header_search_rows: u32,

    /// Distinct category codes a row needs to count as a header. Default: 3.
    pub min_header_categories: usize,

    /// Columns to the right of a bare code cell searched for the institute
    /// name. Default: 3.
    pub name_lookahead_cols: u32,

    /// Smallest accepted cutoff rank (inclusive). Default: 1.
    pub min_rank: i64,

    /// Largest accepted cutoff rank (inclusive). Default: 500000.
    pub max_rank: i64,

    /// Fee-column start before any fee anchor is seen. Default: 300.0.
    pub default_fee_start: f32,

    /// Institute-column start before any fee anchor is seen. Default: 380.0.
    pub default_college_start: f32,

    /// Learned fee start = fee anchor x − this margin. Default: 10.0.
    pub fee_margin: f32,

    /// Learned college start = fee anchor x + this width. Default: 70.0.
    pub fee_column_width: f32,

    /// Course text shorter than this falls back to the branch table.
    /// Default: 3.
    pub min_branch_name_len: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            row_tolerance: 10.0,
            header_search_rows: 10,
            min_header_categories: 3,
            name_lookahead_cols: 3,
            min_rank: 1,
            max_rank: 500_000,
            default_fee_start: 300.0,
            default_college_start: 380.0,
            fee_margin: 10.0,
            fee_column_width: 70.0,
            min_branch_name_len: 3,
        }
    }
}

/// Admission session stamped onto cutoff entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionInfo {
    /// Admission year. When `None`, inferred from the sheet name.
    pub year: Option<u16>,
    /// Counselling round label, e.g. "Round 1".
    pub round: Option<String>,
}

/// On-disk shape of a TOML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    vocabulary: Vocabulary,
    thresholds: Thresholds,
    session: SessionInfo,
    concurrency: Option<usize>,
}

impl ConfigFile {
    fn into_builder(self) -> ExtractionConfigBuilder {
        let mut builder = ExtractionConfig::builder()
            .vocabulary(self.vocabulary)
            .thresholds(self.thresholds)
            .session(self.session);
        if let Some(n) = self.concurrency {
            builder = builder.concurrency(n);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builds() {
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.thresholds.max_rank, 500_000);
        assert_eq!(config.thresholds.min_rank, 1);
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn inverted_boundaries_rejected() {
        let err = ExtractionConfig::builder()
            .default_boundaries(400.0, 300.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("default_fee_start"));
    }

    #[test]
    fn zero_fee_width_rejected() {
        assert!(ExtractionConfig::builder()
            .fee_column_width(0.0)
            .build()
            .is_err());
    }

    #[test]
    fn inverted_rank_bounds_rejected() {
        assert!(ExtractionConfig::builder()
            .rank_bounds(10, 5)
            .build()
            .is_err());
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let config = ExtractionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn toml_partial_tables_keep_defaults() {
        let config = ExtractionConfig::from_toml_str(
            r#"
            concurrency = 2

            [thresholds]
            row_tolerance = 6.5
            header_search_rows = 4

            [session]
            year = 2023
            round = "Mock"

            [vocabulary]
            state_name = "Goa"
            cities = ["Panaji", "Margao"]
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.row_tolerance, 6.5);
        assert_eq!(config.thresholds.header_search_rows, 4);
        assert_eq!(config.thresholds.max_rank, 500_000);
        assert_eq!(config.session.year, Some(2023));
        assert_eq!(config.session.round.as_deref(), Some("Mock"));
        assert_eq!(config.vocabulary.state_name, "Goa");
        assert_eq!(config.vocabulary.cities.len(), 2);
        assert!(!config.vocabulary.category_codes.is_empty());
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn toml_with_bad_value_is_invalid_config() {
        let err = ExtractionConfig::from_toml_str("[thresholds]\nrow_tolerance = \"wide\"\n")
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn load_toml_missing_file() {
        let err = ExtractionConfig::load_toml("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ExtractError::ConfigLoad { .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ExtractionConfig::builder()
            .password("hunter2")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
