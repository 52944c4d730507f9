//! Headcount report parser.
//!
//! The headcount report prints one line per county with one or more count
//! columns (some years add FTE or prior-year columns before the headcount).
//! The headcount is the last present value on the line.

use super::legacy::is_non_data;
use super::tokens::{leading_name, line_values};
use crate::county::CountyRegistry;
use crate::output::HeadcountRow;
use std::collections::HashSet;
use tracing::debug;

/// Parse one line into a headcount row.
pub fn parse_headcount_line(line: &str, counties: &CountyRegistry) -> Option<HeadcountRow> {
    if is_non_data(line) {
        return None;
    }
    let (name, rest) = leading_name(line)?;
    let county = counties.canonical(name)?;
    let headcount = line_values(rest).into_iter().rev().flatten().next()?;
    Some(HeadcountRow {
        county: county.to_string(),
        headcount,
    })
}

/// Parse every page; the first row seen for a county wins.
pub fn parse_headcount<S: AsRef<str>>(pages: &[S], counties: &CountyRegistry) -> Vec<HeadcountRow> {
    let mut seen = HashSet::new();
    pages
        .iter()
        .flat_map(|p| p.as_ref().lines())
        .filter_map(|line| parse_headcount_line(line, counties))
        .filter(|row| {
            let first = seen.insert(row.county.clone());
            if !first {
                debug!("Duplicate headcount row for {} ignored", row.county);
            }
            first
        })
        .collect()
}
