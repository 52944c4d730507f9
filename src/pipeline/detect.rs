//! Layout detection by content sniffing.
//!
//! The agency switched from one-row-per-county tables to a layout that splits
//! each county across two pages (early grades, then later grades). A few
//! years straddle the switch and old years are sometimes republished in the
//! new layout, so the layout is read from the page text, never from the year.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Introductory age-group label that only the split-page layout prints.
static RE_MODERN_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)early\s+childhood|pre-?\s*k(indergarten)?\s*\(\s*ages?\s*\d").unwrap()
});

/// Which parser governs a grade-detail document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One self-contained row per county per line.
    Legacy,
    /// Each county split across an early-grades page and a late-grades page.
    ModernSplit,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Legacy => f.write_str("legacy"),
            Layout::ModernSplit => f.write_str("modern_split"),
        }
    }
}

/// Classify a document from its page text.
pub fn detect_layout<S: AsRef<str>>(pages: &[S]) -> Layout {
    if pages.iter().any(|p| RE_MODERN_MARKER.is_match(p.as_ref())) {
        Layout::ModernSplit
    } else {
        Layout::Legacy
    }
}
