//! Token extraction: turn report text into county names and counts.
//!
//! The most consequential rule here is that a suppression or placeholder
//! marker becomes an **absent** value, never zero. A stray non-numeric token
//! (page footer, footnote letter) is likewise absent rather than an error,
//! because a single odd token must not abort a whole document.

use once_cell::sync::Lazy;
use regex::Regex;

/// Markers the agency prints in place of a count.
const SUPPRESSION_MARKERS: &[&str] = &[
    "*", "**", "***", ".", "-", "--", "---", "N/A", "NA", "PS", "DS", "RV", "N<10", "TFS",
];

/// Numeric placeholder codes used in some years for "not reported".
const PLACEHOLDER_CODES: &[&str] = &["-1", "-2", "-3", "-9", "999999"];

/// Column boundaries: two or more spaces, or a tab / pipe delimiter.
static RE_COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t|\|").unwrap());

/// Convert one token to a count.
///
/// Strips whitespace and thousands separators; markers, placeholder codes,
/// negative numbers and unparseable text all map to `None`.
pub fn safe_numeric(token: &str) -> Option<f64> {
    let cleaned: String = token.trim().chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() || is_marker(&cleaned) {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Whether a (comma-free, trimmed) token is a suppression marker or
/// placeholder code.
fn is_marker(cleaned: &str) -> bool {
    cleaned.starts_with('<')
        || cleaned.starts_with('≤')
        || PLACEHOLDER_CODES.contains(&cleaned)
        || SUPPRESSION_MARKERS
            .iter()
            .any(|m| m.eq_ignore_ascii_case(cleaned))
}

/// Whether a token occupies a value column: a number or a recognised marker.
///
/// Words are not value tokens; they are skipped rather than counted so a
/// trailing footnote cannot shift later columns.
pub fn is_value_token(token: &str) -> bool {
    let cleaned: String = token.trim().chars().filter(|&c| c != ',').collect();
    !cleaned.is_empty() && (is_marker(&cleaned) || cleaned.parse::<f64>().is_ok())
}

/// Split a line on column gaps, dropping empty pieces.
pub fn split_columns(line: &str) -> Vec<&str> {
    RE_COLUMN_GAP
        .split(line.trim())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Values from column tokens in order.
///
/// A column that still contains single spaces (several numbers the layout
/// squeezed together) is split further.
pub fn column_values<'a, I>(columns: I) -> Vec<Option<f64>>
where
    I: IntoIterator<Item = &'a str>,
{
    columns
        .into_iter()
        .flat_map(str::split_whitespace)
        .filter(|t| is_value_token(t))
        .map(safe_numeric)
        .collect()
}

/// Every value token on a line, in order.
pub fn line_values(text: &str) -> Vec<Option<f64>> {
    column_values(std::iter::once(text))
}

/// A word that can be part of a county name.
fn is_name_word(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_alphabetic())
        && word
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '.' || c == '\'')
        && !is_value_token(word)
}

/// Split a line into its leading name and the remaining text.
///
/// The name is the run of single-space separated words before the first
/// column gap. It ends early at a value token, so `Barbour PS 10` yields
/// `Barbour` with `PS 10` left as values. Returns `None` if the line does
/// not start with a name word.
pub fn leading_name(line: &str) -> Option<(&str, &str)> {
    let start = line.len() - line.trim_start().len();
    let body = &line[start..];
    let field = RE_COLUMN_GAP
        .find(body)
        .map_or(body, |gap| &body[..gap.start()]);

    let mut end = 0;
    let mut offset = 0;
    for word in field.split(' ') {
        if !is_name_word(word) {
            break;
        }
        end = offset + word.len();
        offset = end + 1;
    }

    if end == 0 {
        return None;
    }
    Some((&body[..end], &body[end..]))
}
