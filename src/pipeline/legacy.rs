//! Legacy layout: one self-contained row per county.
//!
//! ```text
//! COUNTY      PK    K    1    2  ...   12   TOTAL
//! BARBOUR     45  160  171  158  ...  141   2,148
//! ```
//!
//! Most lines on a page are not data rows. A line that is not a county row
//! is dropped silently; it is not an error.

use super::tokens::{column_values, leading_name, line_values, split_columns};
use crate::count::sum_present;
use crate::county::CountyRegistry;
use crate::output::{GradeCounts, RawGradeRow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Fewest values a row may carry; some years omit trailing columns.
pub const MIN_VALUES: usize = 10;

/// 14 grades plus the row total.
const FULL_ROW: usize = 15;

/// Titles, headers, footnotes, page numbers, year banners and total rows.
static NON_DATA: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\s*$",
        r"(?i)^\s*page\s+\d+(\s+of\s+\d+)?\s*$",
        r"^\s*\d{1,3}\s*$",
        r"(?i)^\s*(school\s+year\s*)?\d{4}\s*[-–/]\s*\d{2,4}(\s+school\s+year)?\s*$",
        r"(?i)west\s+virginia\s+department",
        r"(?i)enrollment\s+(by|report|summary)",
        r"(?i)^\s*(county|district)(\s+name)?\s+(pk|pre|k\b|grade|total)",
        r"(?i)^\s*(\*|note\b|notes\b|source\b|footnote|prepared\b|data\s+as\s+of)",
        r"(?i)^\s*(state\s+)?totals?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub(crate) fn is_non_data(line: &str) -> bool {
    NON_DATA.iter().any(|re| re.is_match(line))
}

fn is_alphabetic_name(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
        && token
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '.' || c == '\'')
}

/// Parse one line into a county row, or `None` if it is not one.
pub fn parse_line(line: &str, counties: &CountyRegistry) -> Option<RawGradeRow> {
    if is_non_data(line) {
        return None;
    }

    let columns = split_columns(line);
    let first = *columns.first()?;

    let (county, values) = match counties.canonical(first) {
        Some(county) if is_alphabetic_name(first) => {
            (county, column_values(columns[1..].iter().copied()))
        }
        // The name was not cleanly separated by a wide gap: take the leading
        // run of letters and read values from the rest of the line.
        _ => {
            let (name, rest) = leading_name(line)?;
            (counties.canonical(name)?, line_values(rest))
        }
    };

    if values.len() < MIN_VALUES || values.iter().all(Option::is_none) {
        debug!(
            "Rejected {county} line: {} values recovered ({} present)",
            values.len(),
            values.iter().flatten().count()
        );
        return None;
    }
    if values.len() > FULL_ROW {
        debug!("{county}: ignoring {} trailing values", values.len() - FULL_ROW);
    }

    let grades = GradeCounts::from_ordered(&values[..values.len().min(FULL_ROW - 1)]);
    let stated = values.get(FULL_ROW - 1).copied().flatten();
    let total = stated.or_else(|| sum_present(grades.as_slice().iter().copied()));

    Some(RawGradeRow {
        county: county.to_string(),
        grades,
        total,
        total_stated: stated.is_some(),
    })
}

/// Parse every page; the first row seen for a county wins.
pub fn parse_legacy<S: AsRef<str>>(pages: &[S], counties: &CountyRegistry) -> Vec<RawGradeRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        for line in page.as_ref().lines() {
            let Some(row) = parse_line(line, counties) else {
                continue;
            };
            if seen.insert(row.county.clone()) {
                debug!("Page {}: accepted legacy row for {}", page_idx + 1, row.county);
                rows.push(row);
            } else {
                debug!("Page {}: duplicate row for {} ignored", page_idx + 1, row.county);
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Grade;
    use crate::reference::ReferenceData;

    fn counties() -> CountyRegistry {
        CountyRegistry::new(&ReferenceData::builtin().unwrap())
    }

    #[test]
    fn full_row_keeps_stated_total() {
        let line = "BARBOUR   1   2   3   4   5   6   7   8   9   10   11   12   13   14   999";
        let row = parse_line(line, &counties()).expect("data row");
        assert_eq!(row.county, "Barbour");
        assert_eq!(row.grades.get(Grade::Pk), Some(1.0));
        assert_eq!(row.grades.get(Grade::G12), Some(14.0));
        assert_eq!(row.total, Some(999.0));
        assert!(row.total_stated);
    }

    #[test]
    fn well_formed_row_total_equals_grade_sum() {
        let line = "BARBOUR  5  10  10  10  10  5  5  5  5  5  10  5  5  5  95";
        let row = parse_line(line, &counties()).unwrap();
        assert_eq!(row.total, Some(95.0));
        assert_eq!(sum_present(row.grades.as_slice().iter().copied()), Some(95.0));
    }

    #[test]
    fn absent_total_is_computed_from_grades() {
        let line = "KANAWHA  1  1  1  1  1  1  1  1  1  1  1  1  1  1  *";
        let row = parse_line(line, &counties()).unwrap();
        assert_eq!(row.total, Some(14.0));
        assert!(!row.total_stated);
    }

    #[test]
    fn short_row_of_ten_values_is_accepted() {
        let line = "WOOD  1  2  3  4  5  6  7  8  9  10";
        let row = parse_line(line, &counties()).unwrap();
        assert_eq!(row.grades.get(Grade::G08), Some(10.0));
        assert_eq!(row.grades.get(Grade::G09), None);
        assert_eq!(row.total, Some(55.0));
    }

    #[test]
    fn fewer_than_ten_values_is_rejected() {
        assert!(parse_line("WOOD  1  2  3  4  5  6  7  8  9", &counties()).is_none());
    }

    #[test]
    fn all_absent_is_rejected() {
        let line = "WOOD  *  *  *  *  *  *  *  *  *  *  *  *  *  *  *";
        assert!(parse_line(line, &counties()).is_none());
    }

    #[test]
    fn single_spaced_line_uses_leading_name() {
        let line = "MC DOWELL 1 2 3 4 5 6 7 8 9 10 11 12 13 14 105";
        let row = parse_line(line, &counties()).unwrap();
        assert_eq!(row.county, "McDowell");
        assert_eq!(row.total, Some(105.0));
    }

    #[test]
    fn single_spaced_line_with_leading_marker_keeps_its_row() {
        let c = counties();
        let row = parse_line("MC DOWELL PS 1 2 3 4 5 6 7 8 9 10 11 12 13 100", &c).unwrap();
        assert_eq!(row.county, "McDowell");
        assert_eq!(row.grades.get(Grade::Pk), None);
        assert_eq!(row.grades.get(Grade::K), Some(1.0));
        assert_eq!(row.grades.get(Grade::G12), Some(13.0));
        assert_eq!(row.total, Some(100.0));

        let row = parse_line("WOOD NA 1 1 1 1 1 1 1 1 1 1 1 1 1 *", &c).unwrap();
        assert_eq!(row.county, "Wood");
        assert_eq!(row.grades.get(Grade::Pk), None);
        assert_eq!(row.total, Some(13.0));
    }

    #[test]
    fn suppressed_grades_stay_absent() {
        let line = "KANAWHA  *  *  *  *  *  *  *  *  *  *  *  *  *  *  1,234";
        let row = parse_line(line, &counties()).unwrap();
        assert!(row.grades.all_absent());
        assert_eq!(row.total, Some(1234.0));
    }

    #[test]
    fn non_data_lines_are_rejected() {
        let c = counties();
        for line in [
            "",
            "West Virginia Department of Education",
            "Enrollment by Grade",
            "COUNTY  PK  K  1  2  3",
            "2019-2020",
            "School Year 2019-20",
            "Page 3 of 4",
            "12",
            "* Suppressed for privacy",
            "STATE TOTAL  1  2  3  4  5  6  7  8  9  10  11  12  13  14  105",
            "ALLEGHENY  1  2  3  4  5  6  7  8  9  10  11  12  13  14  105",
        ] {
            assert!(parse_line(line, &c).is_none(), "line {line:?}");
        }
    }

    #[test]
    fn first_row_per_county_wins() {
        let pages = [
            "BARBOUR  1  1  1  1  1  1  1  1  1  1  1  1  1  1  14\nBARBOUR  2  2  2  2  2  2  2  2  2  2  2  2  2  2  28",
        ];
        let rows = parse_legacy(&pages, &counties());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total, Some(14.0));
    }
}
