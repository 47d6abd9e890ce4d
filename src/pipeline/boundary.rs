//! Column boundary learning and token bucketing (page-text path).
//!
//! Every non-anchor token of a row lands in one logical bucket: priority
//! number, course name, fee, or institute name. Two rules decide, in order:
//!
//! 1. **Fee anchor present.** Tokens are split purely by index around the fee
//!    token: left of it → course, the token itself → fee, right of it →
//!    institute. The fee anchor's x-position then re-calibrates the learned
//!    boundary so later rows see fresh geometry.
//! 2. **No fee anchor (continuation row).** Tokens are placed by their
//!    x-position against the learned boundary: left of `fee_start` → course,
//!    right of `college_start` → institute. Tokens between the two are
//!    resolved by keyword: an institutional keyword routes to the institute
//!    name, anything else to the course name.
//!
//! Tokens left of the institute code go to the priority bucket under both
//! rules. Inside the code token itself, text before the code is priority
//! and text after it is institute name.
//!
//! The boundary lives in an [`ExtractionContext`] that the caller creates per
//! document and passes by reference through every row.

use super::anchor::RowAnchors;
use super::rows::Row;
use crate::config::Thresholds;
use crate::error::ExtractError;
use regex::Regex;
use tracing::{debug, trace};

/// Learned x-coordinates of the fee and institute-name columns.
///
/// Invariant: `fee_start < college_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBoundary {
    fee_start: f32,
    college_start: f32,
}

/// Which side of the learned boundary an x-coordinate falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Course,
    Ambiguous,
    Institute,
}

impl ColumnBoundary {
    /// Returns `None` unless `fee_start < college_start`.
    pub fn new(fee_start: f32, college_start: f32) -> Option<Self> {
        (fee_start < college_start).then_some(Self {
            fee_start,
            college_start,
        })
    }

    pub fn fee_start(&self) -> f32 {
        self.fee_start
    }

    pub fn college_start(&self) -> f32 {
        self.college_start
    }

    /// Re-learn both edges from an observed fee anchor at `fee_x`.
    ///
    /// The update is skipped when the margins would break the ordering
    /// invariant.
    pub fn recalibrate(&mut self, fee_x: f32, margin: f32, fee_width: f32) {
        if let Some(next) = Self::new(fee_x - margin, fee_x + fee_width) {
            *self = next;
        }
    }

    pub fn zone(&self, x: f32) -> Zone {
        if x < self.fee_start {
            Zone::Course
        } else if x > self.college_start {
            Zone::Institute
        } else {
            Zone::Ambiguous
        }
    }
}

/// Per-document mutable state of the page-text path.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub boundary: ColumnBoundary,
    margin: f32,
    fee_width: f32,
    /// Rows that carried a fee anchor and re-calibrated the boundary.
    pub recalibrations: usize,
    /// Tokens resolved by the keyword heuristic.
    pub ambiguous_tokens: usize,
}

impl ExtractionContext {
    pub fn new(thresholds: &Thresholds) -> Result<Self, ExtractError> {
        let boundary =
            ColumnBoundary::new(thresholds.default_fee_start, thresholds.default_college_start)
                .ok_or_else(|| {
                    ExtractError::InvalidConfig(
                        "default_fee_start must be below default_college_start".into(),
                    )
                })?;
        Ok(Self {
            boundary,
            margin: thresholds.fee_margin,
            fee_width: thresholds.fee_column_width,
            recalibrations: 0,
            ambiguous_tokens: 0,
        })
    }

    fn observe_fee(&mut self, fee_x: f32) {
        self.boundary.recalibrate(fee_x, self.margin, self.fee_width);
        self.recalibrations += 1;
        debug!(
            fee_start = self.boundary.fee_start,
            college_start = self.boundary.college_start,
            "boundary re-learned from fee anchor"
        );
    }
}

/// Case-insensitive whole-word matcher over a keyword list.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    re: Option<Regex>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self, ExtractError> {
        let words: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if words.is_empty() {
            return Ok(Self { re: None });
        }
        let re = Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).map_err(|e| {
            ExtractError::InvalidPattern {
                name: "institution_keywords".into(),
                detail: e.to_string(),
            }
        })?;
        Ok(Self { re: Some(re) })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// The logical destination of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Priority,
    Course,
    Fee,
    Institute,
}

/// Text fragments of one row, split by bucket, in token order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBuckets {
    pub priority: Vec<String>,
    pub course: Vec<String>,
    pub fee: Vec<String>,
    pub institute: Vec<String>,
}

impl RowBuckets {
    fn push(&mut self, bucket: Bucket, text: &str) {
        if text.is_empty() {
            return;
        }
        let list = match bucket {
            Bucket::Priority => &mut self.priority,
            Bucket::Course => &mut self.course,
            Bucket::Fee => &mut self.fee,
            Bucket::Institute => &mut self.institute,
        };
        list.push(text.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
            && self.course.is_empty()
            && self.fee.is_empty()
            && self.institute.is_empty()
    }
}

/// Split a row's tokens into buckets, updating the learned boundary when
/// the row carries a fee anchor.
pub fn bucket_row(
    row: &Row,
    anchors: &RowAnchors,
    ctx: &mut ExtractionContext,
    keywords: &KeywordMatcher,
) -> RowBuckets {
    let mut buckets = RowBuckets::default();
    let code_idx = anchors.institute.as_ref().map(|c| c.token_index);

    if let Some(fee) = &anchors.fee {
        if let Some(x) = row.tokens.get(fee.token_index).and_then(|t| t.position.x()) {
            ctx.observe_fee(x);
        }
    }

    for (i, token) in row.tokens.iter().enumerate() {
        if Some(i) == code_idx {
            if let Some(code) = &anchors.institute {
                buckets.push(Bucket::Priority, &code.leading);
                buckets.push(Bucket::Institute, &code.trailing);
            }
            continue;
        }
        if code_idx.is_some_and(|c| i < c) {
            buckets.push(Bucket::Priority, &token.text);
            continue;
        }

        let bucket = match &anchors.fee {
            Some(fee) if i < fee.token_index => Bucket::Course,
            Some(fee) if i == fee.token_index => Bucket::Fee,
            Some(_) => Bucket::Institute,
            None => match token.position.x().map(|x| ctx.boundary.zone(x)) {
                Some(Zone::Course) | None => Bucket::Course,
                Some(Zone::Institute) => Bucket::Institute,
                Some(Zone::Ambiguous) => {
                    ctx.ambiguous_tokens += 1;
                    if keywords.is_match(&token.text) {
                        Bucket::Institute
                    } else {
                        Bucket::Course
                    }
                }
            },
        };
        trace!(token = %token.text, ?bucket, "bucketed");
        buckets.push(bucket, &token.text);
    }

    buckets
}
