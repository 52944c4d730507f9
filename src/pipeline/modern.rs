//! Modern layout: each county split across two pages.
//!
//! ```text
//! page A:  County    Early Childhood  Kindergarten  First ... Fifth
//!          Barbour        45              160        171  ...  150
//! page B:  County    Sixth  Seventh ... Twelfth   Total
//!          Barbour    139     151   ...   141     2,148
//! ```
//!
//! Fragments are merged by county. A county with only one fragment keeps
//! its row with the other side absent, so partial data is surfaced rather
//! than dropped.

use super::tokens::{leading_name, line_values};
use crate::count::sum_present;
use crate::county::CountyRegistry;
use crate::output::{GradeCounts, RawGradeRow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// PK, K and grades 1–5.
pub const EARLY_VALUES: usize = 7;
/// Grades 6–12 and the row total.
pub const LATE_VALUES: usize = 8;

static RE_EARLY_CHILDHOOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)early\s+childhood|pre-?\s*k").unwrap());
static RE_PRIMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)kindergarten|\bfirst\b|\bsecond\b|grade\s*[12]\b").unwrap()
});
static RE_SIXTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsixth\b").unwrap());
static RE_SEVENTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bseventh\b").unwrap());

/// What a page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRole {
    EarlyGrades,
    LateGrades,
    /// Cover, notes or anything else.
    NonData,
}

/// Which half of a split row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Early,
    Late,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Early => "early-grades",
            Side::Late => "late-grades",
        }
    }
}

/// Rows parsed from a split-page document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModernParse {
    pub rows: Vec<RawGradeRow>,
    /// Counties that had only one fragment, with the side that was missing.
    pub partial: Vec<(String, Side)>,
}

/// Classify a page by its column headings.
pub fn classify_page(text: &str) -> PageRole {
    if RE_EARLY_CHILDHOOD.is_match(text) && RE_PRIMARY.is_match(text) {
        PageRole::EarlyGrades
    } else if RE_SIXTH.is_match(text) && RE_SEVENTH.is_match(text) {
        PageRole::LateGrades
    } else {
        PageRole::NonData
    }
}

/// County fragments on one page that carry at least `min_values` values,
/// truncated to `min_values`.
fn page_fragments(
    text: &str,
    counties: &CountyRegistry,
    min_values: usize,
) -> Vec<(String, Vec<Option<f64>>)> {
    text.lines()
        .filter_map(|line| {
            let (name, rest) = leading_name(line)?;
            let county = counties.canonical(name)?;
            let mut values = line_values(rest);
            if values.len() < min_values {
                debug!(
                    "Rejected {county} fragment: {} values, need {min_values}",
                    values.len()
                );
                return None;
            }
            values.truncate(min_values);
            Some((county.to_string(), values))
        })
        .collect()
}

/// Parse a split-page document and merge fragments per county.
pub fn parse_modern<S: AsRef<str>>(pages: &[S], counties: &CountyRegistry) -> ModernParse {
    let mut early: HashMap<String, Vec<Option<f64>>> = HashMap::new();
    let mut late: HashMap<String, Vec<Option<f64>>> = HashMap::new();

    for (page_idx, page) in pages.iter().enumerate() {
        let text = page.as_ref();
        let (target, min_values) = match classify_page(text) {
            PageRole::EarlyGrades => (&mut early, EARLY_VALUES),
            PageRole::LateGrades => (&mut late, LATE_VALUES),
            PageRole::NonData => {
                debug!("Page {}: no grade headings, skipped", page_idx + 1);
                continue;
            }
        };
        for (county, values) in page_fragments(text, counties, min_values) {
            target.entry(county).or_insert(values);
        }
    }

    let mut parsed = ModernParse::default();

    // Reference order keeps output deterministic.
    for county in counties.names() {
        let (e, l) = (early.get(county), late.get(county));
        if e.is_none() && l.is_none() {
            continue;
        }
        match (e, l) {
            (None, Some(_)) => parsed.partial.push((county.to_string(), Side::Early)),
            (Some(_), None) => parsed.partial.push((county.to_string(), Side::Late)),
            _ => {}
        }

        let mut ordered: Vec<Option<f64>> = Vec::with_capacity(EARLY_VALUES + LATE_VALUES);
        ordered.extend(e.cloned().unwrap_or_else(|| vec![None; EARLY_VALUES]));
        ordered.extend(l.cloned().unwrap_or_else(|| vec![None; LATE_VALUES]));

        let grades = GradeCounts::from_ordered(&ordered[..EARLY_VALUES + LATE_VALUES - 1]);
        let explicit = ordered[EARLY_VALUES + LATE_VALUES - 1].filter(|&t| t != 0.0);
        let calculated = sum_present(grades.as_slice().iter().copied());

        parsed.rows.push(RawGradeRow {
            county: county.to_string(),
            grades,
            total: explicit.or(calculated),
            total_stated: explicit.is_some(),
        });
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Grade;
    use crate::reference::ReferenceData;

    fn counties() -> CountyRegistry {
        CountyRegistry::new(&ReferenceData::builtin().unwrap())
    }

    const EARLY_HEADER: &str = "County  Early Childhood  Kindergarten  First  Second  Third  Fourth  Fifth";
    const LATE_HEADER: &str = "County  Sixth  Seventh  Eighth  Ninth  Tenth  Eleventh  Twelfth  Total";

    #[test]
    fn classify_pages_by_headings() {
        assert_eq!(classify_page(EARLY_HEADER), PageRole::EarlyGrades);
        assert_eq!(classify_page(LATE_HEADER), PageRole::LateGrades);
        assert_eq!(classify_page("Notes and definitions"), PageRole::NonData);
        // Early-childhood marker alone is not enough.
        assert_eq!(classify_page("Early Childhood programs"), PageRole::NonData);
    }

    #[test]
    fn merged_row_is_concatenation_of_fragments() {
        let pages = [
            format!("{EARLY_HEADER}\nBarbour  1  2  3  4  5  6  7"),
            format!("{LATE_HEADER}\nBarbour  8  9  10  11  12  13  14  105"),
        ];
        let parsed = parse_modern(&pages, &counties());
        assert!(parsed.partial.is_empty());
        assert_eq!(parsed.rows.len(), 1);

        let row = &parsed.rows[0];
        let expected: Vec<Option<f64>> = (1..=14).map(|v| Some(v as f64)).collect();
        assert_eq!(row.grades.as_slice(), expected.as_slice());
        assert_eq!(row.total, Some(105.0));
        assert!(row.total_stated);
    }

    #[test]
    fn zero_or_absent_explicit_total_uses_calculated() {
        let pages = [
            format!("{EARLY_HEADER}\nWood  1  1  1  1  1  1  1\nWirt  1  1  1  1  1  1  1"),
            format!("{LATE_HEADER}\nWood  1  1  1  1  1  1  1  0\nWirt  1  1  1  1  1  1  1  *"),
        ];
        let parsed = parse_modern(&pages, &counties());
        for row in &parsed.rows {
            assert_eq!(row.total, Some(14.0), "{}", row.county);
            assert!(!row.total_stated);
        }
    }

    #[test]
    fn missing_fragment_keeps_county_with_absent_side() {
        let pages = [
            format!("{EARLY_HEADER}\nBarbour  1  2  3  4  5  6  7\nKanawha  1  1  1  1  1  1  1"),
            format!("{LATE_HEADER}\nBarbour  8  9  10  11  12  13  14  105"),
        ];
        let parsed = parse_modern(&pages, &counties());
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.partial, vec![("Kanawha".to_string(), Side::Late)]);

        let kanawha = parsed.rows.iter().find(|r| r.county == "Kanawha").unwrap();
        assert_eq!(kanawha.grades.get(Grade::G05), Some(1.0));
        assert_eq!(kanawha.grades.get(Grade::G06), None);
        assert_eq!(kanawha.total, Some(7.0));
    }

    #[test]
    fn leading_alphabetic_marker_is_one_absent_value() {
        let pages = [
            format!(
                "{EARLY_HEADER}\nBarbour  PS  10  5  5  5  5  5\n\
                 Kanawha  N/A  100  100  100  100  100  100\nWood  NA  1  1  1  1  1  1"
            ),
            format!(
                "{LATE_HEADER}\nBarbour  5  5  5  5  5  5  5  65\n\
                 Kanawha  1  1  1  1  1  1  1  607\nWood  1  1  1  1  1  1  1  13"
            ),
        ];
        let parsed = parse_modern(&pages, &counties());
        assert!(parsed.partial.is_empty(), "got: {:?}", parsed.partial);
        assert_eq!(parsed.rows.len(), 3);

        for row in &parsed.rows {
            assert_eq!(row.grades.get(Grade::Pk), None, "{}", row.county);
            assert!(row.grades.get(Grade::K).is_some(), "{}", row.county);
        }
        let barbour = parsed.rows.iter().find(|r| r.county == "Barbour").unwrap();
        assert_eq!(barbour.grades.get(Grade::K), Some(10.0));
        assert_eq!(barbour.grades.get(Grade::G05), Some(5.0));
        assert_eq!(barbour.total, Some(65.0));
    }

    #[test]
    fn short_fragments_are_rejected() {
        let pages = [
            format!("{EARLY_HEADER}\nBarbour  1  2  3  4  5  6"),
            format!("{LATE_HEADER}\nBarbour  8  9  10  11  12  13  14"),
        ];
        assert!(parse_modern(&pages, &counties()).rows.is_empty());
    }

    #[test]
    fn extra_values_are_truncated() {
        let pages = [format!("{EARLY_HEADER}\nBarbour  1  2  3  4  5  6  7  99  99")];
        let parsed = parse_modern(&pages, &counties());
        assert_eq!(parsed.rows[0].grades.get(Grade::G05), Some(7.0));
        assert_eq!(parsed.rows[0].grades.get(Grade::G06), None);
    }

    #[test]
    fn rows_follow_reference_order() {
        let pages = [format!(
            "{EARLY_HEADER}\nWyoming  1  1  1  1  1  1  1\nBarbour  1  1  1  1  1  1  1"
        )];
        let parsed = parse_modern(&pages, &counties());
        let names: Vec<&str> = parsed.rows.iter().map(|r| r.county.as_str()).collect();
        assert_eq!(names, vec!["Barbour", "Wyoming"]);
    }
}
