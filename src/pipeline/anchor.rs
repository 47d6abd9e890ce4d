//! Anchor detection: find the low-ambiguity landmarks in a row.
//!
//! Three kinds of anchor are recognised:
//!
//! * an **institute code** (configurable pattern, first match per row wins),
//! * a **fee amount** (grouped-digit number, first match per row wins),
//! * **category labels** (membership in a closed set, every match kept).
//!
//! A token claimed as an institute code is never also checked as a category
//! label, so the two classifications are mutually exclusive within a row.
//!
//! The detector also owns the row-level noise filters (page footers and
//! repeated column-title rows), since both are pattern checks over the same
//! row text.

use super::rows::Row;
use crate::config::Vocabulary;
use crate::error::ExtractError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What kind of landmark a token matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKind {
    InstituteCode,
    FeeAmount,
    CategoryLabel,
}

/// One anchor found in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorMatch {
    pub kind: AnchorKind,
    /// Index of the matching token within its row.
    pub token_index: usize,
    /// The matched text (code, fee amount, or upper-cased category).
    pub value: String,
}

/// An institute-code match with its parts split out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatch {
    pub token_index: usize,
    pub institute_code: String,
    /// Trailing letters glued to the code (`E001CS` → `CS`).
    pub branch_code: Option<String>,
    /// Text of the code token before the code (a glued priority number).
    pub leading: String,
    /// Text of the code token after the code (a glued institute name).
    pub trailing: String,
}

/// All anchors of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowAnchors {
    pub institute: Option<CodeMatch>,
    pub fee: Option<AnchorMatch>,
    pub categories: Vec<AnchorMatch>,
}

/// Code parts found in a piece of text, with the byte span of the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeParts {
    pub institute_code: String,
    pub branch_code: Option<String>,
    pub start: usize,
    pub end: usize,
}

/// Compiled anchor patterns and row filters.
#[derive(Debug, Clone)]
pub struct AnchorDetector {
    institute: Regex,
    fee: Regex,
    categories: HashSet<String>,
    header_markers: Vec<Regex>,
    skip_rows: Vec<Regex>,
}

impl AnchorDetector {
    /// Compile the detector from the vocabulary.
    ///
    /// Fails with [`ExtractError::InvalidPattern`] when a pattern does not
    /// compile or the institute pattern lacks a `code` group.
    pub fn new(vocabulary: &Vocabulary) -> Result<Self, ExtractError> {
        let institute = compile("institute_code_pattern", &vocabulary.institute_code_pattern)?;
        if !institute.capture_names().any(|n| n == Some("code")) {
            return Err(ExtractError::InvalidPattern {
                name: "institute_code_pattern".into(),
                detail: "pattern must define a named group `code`".into(),
            });
        }
        let fee = compile("fee_pattern", &vocabulary.fee_pattern)?;

        let header_markers = vocabulary
            .header_markers
            .iter()
            .map(|m| compile("header_markers", &format!(r"(?i)\b{}\b", regex::escape(m))))
            .collect::<Result<Vec<_>, _>>()?;
        let skip_rows = vocabulary
            .skip_row_patterns
            .iter()
            .map(|p| compile("skip_row_patterns", p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            institute,
            fee,
            categories: vocabulary
                .category_codes
                .iter()
                .map(|c| c.trim().to_uppercase())
                .collect(),
            header_markers,
            skip_rows,
        })
    }

    /// Find the institute code in `text`, if any.
    pub fn match_code(&self, text: &str) -> Option<CodeParts> {
        let caps = self.institute.captures(text)?;
        let code = caps.name("code")?;
        let whole = caps.get(0)?;
        Some(CodeParts {
            institute_code: code.as_str().to_string(),
            branch_code: caps
                .name("branch")
                .map(|b| b.as_str().to_string())
                .filter(|b| !b.is_empty()),
            start: whole.start(),
            end: whole.end(),
        })
    }

    /// Find the fee amount in `text`, if any.
    pub fn match_fee<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.fee.find(text).map(|m| m.as_str())
    }

    /// Whether `text` is exactly one of the known category codes.
    pub fn is_category(&self, text: &str) -> bool {
        self.categories.contains(&text.trim().to_uppercase())
    }

    /// Scan a row for anchors.
    pub fn detect(&self, row: &Row) -> RowAnchors {
        let mut anchors = RowAnchors::default();

        for (i, token) in row.tokens.iter().enumerate() {
            if anchors.institute.is_none() {
                if let Some(parts) = self.match_code(&token.text) {
                    anchors.institute = Some(CodeMatch {
                        token_index: i,
                        institute_code: parts.institute_code,
                        branch_code: parts.branch_code,
                        leading: squash(&token.text[..parts.start]),
                        trailing: squash(&token.text[parts.end..]),
                    });
                    continue;
                }
            }
            if anchors.fee.is_none() {
                if let Some(value) = self.match_fee(&token.text) {
                    anchors.fee = Some(AnchorMatch {
                        kind: AnchorKind::FeeAmount,
                        token_index: i,
                        value: value.to_string(),
                    });
                    continue;
                }
            }
            if self.is_category(&token.text) {
                anchors.categories.push(AnchorMatch {
                    kind: AnchorKind::CategoryLabel,
                    token_index: i,
                    value: token.text.trim().to_uppercase(),
                });
            }
        }

        anchors
    }

    /// Rows to drop before assembly: page footers, print stamps, and
    /// repeated column-title rows that carry no institute code.
    pub fn is_noise_row(&self, row: &Row, anchors: &RowAnchors) -> bool {
        let text = row.text();
        if self.skip_rows.iter().any(|re| re.is_match(&text)) {
            return true;
        }
        if anchors.institute.is_some() {
            return false;
        }
        let markers = self
            .header_markers
            .iter()
            .filter(|re| re.is_match(&text))
            .count();
        markers >= 2
    }
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compile(name: &str, pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern {
        name: name.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::token::{Position, Token};

    fn detector() -> AnchorDetector {
        AnchorDetector::new(&Vocabulary::default()).unwrap()
    }

    fn row(texts: &[&str]) -> Row {
        Row::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    Token::new(
                        t,
                        Position::Page {
                            x: 50.0 * i as f32,
                            y: 700.0,
                        },
                    )
                    .unwrap()
                })
                .collect(),
        )
    }

    #[test]
    fn finds_code_fee_and_trailing_name() {
        let a = detector().detect(&row(&["E001 ABC Engineering College", "CS Computer Science", "1,23,000"]));
        let code = a.institute.unwrap();
        assert_eq!(code.institute_code, "E001");
        assert_eq!(code.branch_code, None);
        assert_eq!(code.leading, "");
        assert_eq!(code.trailing, "ABC Engineering College");
        assert_eq!(code.token_index, 0);
        let fee = a.fee.unwrap();
        assert_eq!(fee.value, "1,23,000");
        assert_eq!(fee.token_index, 2);
    }

    #[test]
    fn text_before_code_is_kept_apart() {
        let a = detector().detect(&row(&["7 E001 ABC College", "CS"]));
        let code = a.institute.unwrap();
        assert_eq!(code.leading, "7");
        assert_eq!(code.trailing, "ABC College");
    }

    #[test]
    fn glued_branch_letters_split_out() {
        let a = detector().detect(&row(&["12", "E045CS"]));
        let code = a.institute.unwrap();
        assert_eq!(code.institute_code, "E045");
        assert_eq!(code.branch_code.as_deref(), Some("CS"));
        assert_eq!(code.trailing, "");
    }

    #[test]
    fn only_first_code_and_fee_are_used() {
        let a = detector().detect(&row(&["E001", "E002", "1,000", "2,000"]));
        assert_eq!(a.institute.unwrap().institute_code, "E001");
        assert_eq!(a.fee.unwrap().value, "1,000");
    }

    #[test]
    fn plain_numbers_are_not_fees() {
        let a = detector().detect(&row(&["123000", "1.5"]));
        assert!(a.fee.is_none());
        assert_eq!(a, RowAnchors::default());
    }

    #[test]
    fn every_category_is_recorded() {
        let a = detector().detect(&row(&["Course", "GM", "1g", "SCG", "XYZ"]));
        let values: Vec<_> = a.categories.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["GM", "1G", "SCG"]);
    }

    #[test]
    fn code_and_category_are_exclusive() {
        // A category set that (oddly) contains something code-shaped.
        let vocab = Vocabulary {
            category_codes: vec!["E001".into(), "GM".into()],
            ..Vocabulary::default()
        };
        let d = AnchorDetector::new(&vocab).unwrap();
        let a = d.detect(&row(&["E001", "GM", "E001"]));
        assert_eq!(a.institute.as_ref().unwrap().token_index, 0);
        let idx: Vec<_> = a.categories.iter().map(|c| c.token_index).collect();
        assert_eq!(idx, vec![1, 2]);
    }


    #[test]
    fn header_rows_and_footers_are_noise() {
        let d = detector();
        let header = row(&["Sl No", "Course Name", "Fee", "College Name"]);
        assert!(d.is_noise_row(&header, &d.detect(&header)));

        let footer = row(&["Page 3 of 12"]);
        assert!(d.is_noise_row(&footer, &d.detect(&footer)));

        let continuation = row(&["Engineering College Road"]);
        assert!(!d.is_noise_row(&continuation, &d.detect(&continuation)));
    }

    #[test]
    fn pattern_without_code_group_rejected() {
        let vocab = Vocabulary {
            institute_code_pattern: r"E\d{3}".into(),
            ..Vocabulary::default()
        };
        assert!(matches!(
            AnchorDetector::new(&vocab),
            Err(ExtractError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn broken_regex_rejected() {
        let vocab = Vocabulary {
            fee_pattern: r"(\d".into(),
            ..Vocabulary::default()
        };
        assert!(AnchorDetector::new(&vocab).is_err());
    }
}
