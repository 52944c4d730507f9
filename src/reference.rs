//! Reference data: county codes, published years and document URLs.
//!
//! The tables live in `data/reference.json`, embedded at compile time and
//! parsed once. An updated copy can be loaded from disk at startup with
//! [`ReferenceData::from_path`] when the agency moves documents or publishes
//! a new year, without touching any parsing code.

use crate::error::EnrollmentError;
use crate::output::DatasetKind;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_JSON: &str = include_str!("../data/reference.json");

/// Number of county school districts in the state.
pub const COUNTY_COUNT: usize = 55;

static BUILTIN: Lazy<Result<Arc<ReferenceData>, String>> = Lazy::new(|| {
    ReferenceData::from_json(BUILTIN_JSON)
        .map(Arc::new)
        .map_err(|e| e.to_string())
});

/// One county and its subdivision code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountyEntry {
    /// Canonical display name, e.g. `"McDowell"`.
    pub name: String,
    /// Three-digit subdivision code, e.g. `"047"`.
    pub code: String,
}

/// When a report for school year `Y-1`/`Y` is typically uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationSlot {
    /// Upload year relative to the school-year end year.
    pub year_offset: i32,
    /// Upload month, 1–12.
    pub month: u8,
}

/// Per-kind URL tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTables {
    /// Free-text maintenance note carried in the JSON file.
    #[serde(default, rename = "_comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub grade_detail: BTreeMap<u16, Vec<String>>,
    #[serde(default)]
    pub headcount: BTreeMap<u16, Vec<String>>,
}

/// Per-kind URL templates.
///
/// Placeholders: `{pub_year}`, `{month}` (two digits), `{school_year}`
/// (`2023-24`), `{start_year}`, `{end_year}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTemplates {
    pub grade_detail: Vec<String>,
    pub headcount: Vec<String>,
}

/// Immutable lookup tables shared by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Two-digit state code prefixed to every district identifier.
    pub state_code: String,
    /// School-year end years the agency has published.
    pub supported_years: Vec<u16>,
    pub counties: Vec<CountyEntry>,
    /// Previously confirmed document URLs, tried before any pattern guess.
    #[serde(default)]
    pub verified_urls: UrlTables,
    pub url_templates: UrlTemplates,
    pub publication_slots: Vec<PublicationSlot>,
}

impl ReferenceData {
    /// The copy shipped with the crate.
    pub fn builtin() -> Result<Arc<ReferenceData>, EnrollmentError> {
        BUILTIN
            .as_ref()
            .map(Arc::clone)
            .map_err(|detail| EnrollmentError::ReferenceData {
                path: None,
                detail: detail.clone(),
            })
    }

    /// Parse and validate reference data from JSON text.
    pub fn from_json(json: &str) -> Result<ReferenceData, EnrollmentError> {
        let data: ReferenceData =
            serde_json::from_str(json).map_err(|e| EnrollmentError::ReferenceData {
                path: None,
                detail: e.to_string(),
            })?;
        data.validate()?;
        Ok(data)
    }

    /// Load and validate reference data from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<ReferenceData, EnrollmentError> {
        let path = path.as_ref();
        let attach_path = |e: EnrollmentError| match e {
            EnrollmentError::ReferenceData { detail, .. } => EnrollmentError::ReferenceData {
                path: Some(path.to_path_buf()),
                detail,
            },
            other => other,
        };
        let text = std::fs::read_to_string(path).map_err(|e| EnrollmentError::ReferenceData {
            path: Some(path.to_path_buf()),
            detail: e.to_string(),
        })?;
        Self::from_json(&text).map_err(attach_path)
    }

    fn validate(&self) -> Result<(), EnrollmentError> {
        let fail = |detail: String| Err(EnrollmentError::ReferenceData { path: None, detail });

        if self.state_code.len() != 2 || !self.state_code.chars().all(|c| c.is_ascii_digit()) {
            return fail(format!("state_code must be two digits, got '{}'", self.state_code));
        }
        if self.counties.len() != COUNTY_COUNT {
            return fail(format!(
                "expected {COUNTY_COUNT} counties, got {}",
                self.counties.len()
            ));
        }
        let mut names = HashSet::new();
        let mut codes = HashSet::new();
        for c in &self.counties {
            if c.code.len() != 3 || !c.code.chars().all(|ch| ch.is_ascii_digit()) {
                return fail(format!("county '{}' has malformed code '{}'", c.name, c.code));
            }
            if !names.insert(c.name.to_ascii_uppercase()) {
                return fail(format!("duplicate county name '{}'", c.name));
            }
            if !codes.insert(c.code.as_str()) {
                return fail(format!("duplicate county code '{}'", c.code));
            }
        }
        if self.supported_years.is_empty() {
            return fail("supported_years is empty".into());
        }
        if self.url_templates.grade_detail.is_empty() || self.url_templates.headcount.is_empty() {
            return fail("url_templates needs at least one template per dataset kind".into());
        }
        if self.publication_slots.is_empty() {
            return fail("publication_slots is empty".into());
        }
        if let Some(slot) = self
            .publication_slots
            .iter()
            .find(|s| !(1..=12).contains(&s.month))
        {
            return fail(format!("publication month {} is out of range", slot.month));
        }
        Ok(())
    }

    /// Published years, ascending and deduplicated.
    pub fn available_years(&self) -> Vec<u16> {
        let mut years = self.supported_years.clone();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn is_supported(&self, year: u16) -> bool {
        self.supported_years.contains(&year)
    }

    /// Fail fast, before any I/O, on a year the agency never published.
    pub fn check_year(&self, year: u16) -> Result<(), EnrollmentError> {
        if self.is_supported(year) {
            Ok(())
        } else {
            Err(EnrollmentError::UnsupportedYear {
                year,
                available: describe_years(&self.available_years()),
            })
        }
    }

    pub fn verified_urls(&self, year: u16, kind: DatasetKind) -> &[String] {
        let table = match kind {
            DatasetKind::GradeDetail => &self.verified_urls.grade_detail,
            DatasetKind::Headcount => &self.verified_urls.headcount,
        };
        table.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn templates(&self, kind: DatasetKind) -> &[String] {
        match kind {
            DatasetKind::GradeDetail => &self.url_templates.grade_detail,
            DatasetKind::Headcount => &self.url_templates.headcount,
        }
    }
}

/// Render a year list compactly, collapsing consecutive runs: `2014-2019, 2021`.
pub fn describe_years(years: &[u16]) -> String {
    let mut parts = Vec::new();
    let mut iter = years.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end = iter.next().unwrap_or(end);
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(", ")
}

/// Published years from the built-in reference data.
pub fn get_available_years() -> Result<Vec<u16>, EnrollmentError> {
    Ok(ReferenceData::builtin()?.available_years())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_reference_data_is_valid() {
        let data = ReferenceData::builtin().expect("embedded JSON must validate");
        assert_eq!(data.counties.len(), COUNTY_COUNT);
        assert_eq!(data.state_code, "54");
        assert!(!data.available_years().is_empty());
    }

    #[test]
    fn available_years_are_sorted_and_unique() {
        let mut data = (*ReferenceData::builtin().unwrap()).clone();
        data.supported_years = vec![2020, 2018, 2020, 2019];
        assert_eq!(data.available_years(), vec![2018, 2019, 2020]);
    }

    #[test]
    fn check_year_rejects_unpublished_year() {
        let data = ReferenceData::builtin().unwrap();
        let err = data.check_year(1990).unwrap_err();
        assert!(matches!(err, EnrollmentError::UnsupportedYear { year: 1990, .. }));
    }

    #[test]
    fn describe_years_collapses_runs() {
        assert_eq!(describe_years(&[2014, 2015, 2016, 2018, 2020, 2021]), "2014-2016, 2018, 2020-2021");
        assert_eq!(describe_years(&[]), "");
    }

    #[test]
    fn validation_rejects_short_county_table() {
        let mut data = (*ReferenceData::builtin().unwrap()).clone();
        data.counties.pop();
        let json = serde_json::to_string(&data).unwrap();
        let err = ReferenceData::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("expected 55 counties"), "got: {err}");
    }

    #[test]
    fn validation_rejects_duplicate_codes() {
        let mut data = (*ReferenceData::builtin().unwrap()).clone();
        data.counties[1].code = data.counties[0].code.clone();
        let json = serde_json::to_string(&data).unwrap();
        assert!(ReferenceData::from_json(&json).is_err());
    }

    #[test]
    fn from_path_attaches_path_to_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ReferenceData::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("ref.json"), "got: {err}");
    }

    #[test]
    fn verified_urls_default_to_empty() {
        let data = ReferenceData::builtin().unwrap();
        assert!(data.verified_urls(1900, DatasetKind::GradeDetail).is_empty());
    }

    #[test]
    fn builtin_verified_table_documents_how_to_fill_it() {
        let data = ReferenceData::builtin().unwrap();
        let note = data.verified_urls.comment.as_deref().expect("maintenance note");
        assert!(note.contains("--reference"), "got: {note}");
    }

    #[test]
    fn edited_reference_file_supplies_verified_urls() {
        let mut data = (*ReferenceData::builtin().unwrap()).clone();
        data.verified_urls
            .grade_detail
            .insert(2020, vec!["https://example.org/enr-2020.pdf".into()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        std::fs::write(&path, serde_json::to_string_pretty(&data).unwrap()).unwrap();

        let loaded = ReferenceData::from_path(&path).unwrap();
        assert_eq!(
            loaded.verified_urls(2020, DatasetKind::GradeDetail),
            ["https://example.org/enr-2020.pdf".to_string()]
        );
        assert_eq!(loaded.verified_urls.comment, data.verified_urls.comment);
    }

    #[test]
    fn templates_cover_both_hosting_conventions() {
        let data = ReferenceData::builtin().unwrap();
        for kind in [DatasetKind::GradeDetail, DatasetKind::Headcount] {
            let templates = data.templates(kind);
            assert!(templates.iter().any(|t| t.contains("wvde.us/wp-content/uploads/")));
            assert!(templates.iter().any(|t| t.contains("wvde.state.wv.us/data/")));
        }
    }
}
