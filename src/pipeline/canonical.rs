//! Canonicalisation: deterministic cleanup of assembled free text.
//!
//! Free-text fields arrive as the space-joined parts of several rows. They
//! carry leakage from neighbouring columns (fee amounts spelled out in
//! words, currency names) and sometimes nothing usable at all. This module
//! applies a fixed sequence of rules and, where the result is empty or too
//! short, substitutes a clearly synthetic placeholder so downstream
//! consumers always have something to show and tests can assert on it.
//!
//! ## Rule Order
//!
//! 1. Strip noise words (spelled-out amounts, currency words)
//! 2. Collapse whitespace runs to one space
//! 3. Trim whitespace and dangling separators at both ends
//!
//! Fallbacks are applied after cleaning, never before, so a field made only
//! of noise words falls back like an empty one.

use super::anchor::AnchorDetector;
use crate::config::{Thresholds, Vocabulary};
use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^0-9])(20\d{2})(?:[^0-9]|$)").unwrap());

/// A `20xx` year embedded in a sheet or file name (`KCET_2024_R1` → 2024).
pub fn infer_year(name: &str) -> Option<u16> {
    RE_YEAR.captures(name)?.get(1)?.as_str().parse().ok()
}

/// Compiled cleanup rules and fallback tables.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    noise: Option<Regex>,
    cities: Vec<(Regex, String)>,
    branch_names: BTreeMap<String, String>,
    state_name: String,
    min_branch_name_len: usize,
}

impl Canonicalizer {
    pub fn new(vocabulary: &Vocabulary, thresholds: &Thresholds) -> Result<Self, ExtractError> {
        let words: Vec<String> = vocabulary
            .noise_words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();
        let noise = if words.is_empty() {
            None
        } else {
            // Optional trailing dot catches "Rs." as well as "Rs".
            let pattern = format!(r"(?i)\b(?:{})\b\.?", words.join("|"));
            Some(Regex::new(&pattern).map_err(|e| ExtractError::InvalidPattern {
                name: "noise_words".into(),
                detail: e.to_string(),
            })?)
        };

        let cities = vocabulary
            .cities
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(c.trim()))).map_err(
                    |e| ExtractError::InvalidPattern {
                        name: "cities".into(),
                        detail: e.to_string(),
                    },
                )?;
                Ok((re, c.trim().to_string()))
            })
            .collect::<Result<Vec<_>, ExtractError>>()?;

        Ok(Self {
            noise,
            cities,
            branch_names: vocabulary
                .branch_names
                .iter()
                .map(|(k, v)| (k.trim().to_uppercase(), v.clone()))
                .collect(),
            state_name: vocabulary.state_name.clone(),
            min_branch_name_len: thresholds.min_branch_name_len,
        })
    }

    /// Apply the cleanup rules to one free-text field.
    pub fn clean_text(&self, input: &str) -> String {
        let s = match &self.noise {
            Some(re) => re.replace_all(input, " ").into_owned(),
            None => input.to_string(),
        };
        let s = RE_WHITESPACE.replace_all(&s, " ");
        s.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '/'))
            .to_string()
    }

    /// Whether `code` is a key of the branch table.
    pub fn is_known_branch(&self, code: &str) -> bool {
        self.branch_names.contains_key(&code.trim().to_uppercase())
    }

    /// Branch name from the course text, falling back to the branch table,
    /// then to a generic `<code> Engineering` label, then to
    /// `Unknown Engineering` when there is no code at all.
    pub fn branch_name(&self, course_text: &str, branch_code: Option<&str>) -> String {
        let cleaned = self.clean_text(course_text);
        if cleaned.chars().count() >= self.min_branch_name_len {
            return cleaned;
        }
        match branch_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self
                .branch_names
                .get(&code.to_uppercase())
                .cloned()
                .unwrap_or_else(|| format!("{code} Engineering")),
            None => "Unknown Engineering".to_string(),
        }
    }

    /// Institute name from free text, or a `College <code>` placeholder.
    pub fn institute_name(&self, text: &str, institute_code: &str) -> String {
        let cleaned = self.clean_text(text);
        if cleaned.is_empty() {
            format!("College {institute_code}")
        } else {
            cleaned
        }
    }

    /// First known city mentioned in the institute text, else the state.
    pub fn city(&self, institute_text: &str) -> String {
        self.cities
            .iter()
            .find(|(re, _)| re.is_match(institute_text))
            .map(|(_, city)| city.clone())
            .unwrap_or_else(|| self.state_name.clone())
    }

    /// The monetary amount inside the joined fee parts.
    pub fn clean_fee(&self, detector: &AnchorDetector, fee_text: &str) -> Option<String> {
        detector.match_fee(fee_text).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Canonicalizer {
        Canonicalizer::new(&Vocabulary::default(), &Thresholds::default()).unwrap()
    }

    #[test]
    fn strips_spelled_out_amounts() {
        let c = canon();
        assert_eq!(
            c.clean_text("Computer Science One Lakh Twenty Three Thousand Rupees Only"),
            "Computer Science"
        );
        assert_eq!(c.clean_text("Rs. Mechanical   Engineering"), "Mechanical Engineering");
    }

    #[test]
    fn noise_match_is_whole_word() {
        // "Ten" must not be cut out of "Tennis" or "Often".
        assert_eq!(canon().clean_text("Tennis Often"), "Tennis Often");
    }

    #[test]
    fn collapses_and_trims() {
        assert_eq!(canon().clean_text("  , Civil \t  Engineering -  "), "Civil Engineering");
    }

    #[test]
    fn short_course_falls_back_to_table() {
        let c = canon();
        assert_eq!(c.branch_name("", Some("CS")), "Computer Science and Engineering");
        assert_eq!(c.branch_name("Lakh", Some("ME")), "Mechanical Engineering");
        assert_eq!(c.branch_name("x", Some("ZZ")), "ZZ Engineering");
        assert_eq!(c.branch_name("", None), "Unknown Engineering");
        assert_eq!(c.branch_name("X.", None), "Unknown Engineering");
    }

    #[test]
    fn long_enough_course_is_kept() {
        assert_eq!(
            canon().branch_name("CS Computer Science", Some("CS")),
            "CS Computer Science"
        );
    }

    #[test]
    fn empty_institute_gets_placeholder() {
        let c = canon();
        assert_eq!(c.institute_name("  Thousand ", "E001"), "College E001");
        assert_eq!(c.institute_name("ABC College", "E001"), "ABC College");
    }

    #[test]
    fn city_from_known_list_or_state() {
        let c = canon();
        assert_eq!(c.city("XYZ Institute, Hosur Road, Bengaluru"), "Bengaluru");
        assert_eq!(c.city("Rural Engineering College, Somewhere"), "Karnataka");
    }

    #[test]
    fn year_from_sheet_name() {
        assert_eq!(infer_year("KCET_2024_R1"), Some(2024));
        assert_eq!(infer_year("Cutoff 2023 Round 2"), Some(2023));
        assert_eq!(infer_year("Sheet1"), None);
        assert_eq!(infer_year("120245"), None);
    }

    #[test]
    fn fee_is_extracted_from_parts() {
        let c = canon();
        let d = AnchorDetector::new(&Vocabulary::default()).unwrap();
        assert_eq!(c.clean_fee(&d, "Rs. 1,23,000 /-").as_deref(), Some("1,23,000"));
        assert_eq!(c.clean_fee(&d, "One Lakh"), None);
    }
}
