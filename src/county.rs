//! County validation and district identity.
//!
//! Every candidate row must name one of the 55 counties; report text varies
//! in case and spacing (`"MC DOWELL"`, `"Mcdowell County"`) so matching is
//! done on a normalised key.

use crate::reference::ReferenceData;
use std::collections::HashMap;

/// Lookup of canonical county names and district identifiers.
#[derive(Debug, Clone)]
pub struct CountyRegistry {
    state_code: String,
    /// Normalised key → index into `entries`.
    index: HashMap<String, usize>,
    /// `(canonical name, subdivision code)` in reference order.
    entries: Vec<(String, String)>,
}

impl CountyRegistry {
    pub fn new(reference: &ReferenceData) -> Self {
        let entries: Vec<(String, String)> = reference
            .counties
            .iter()
            .map(|c| (c.name.clone(), c.code.clone()))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (normalise(name), i))
            .collect();
        Self {
            state_code: reference.state_code.clone(),
            index,
            entries,
        }
    }

    /// Canonical name for a candidate county string, if it is one.
    pub fn canonical(&self, candidate: &str) -> Option<&str> {
        self.index
            .get(&normalise(candidate))
            .map(|&i| self.entries[i].0.as_str())
    }

    pub fn is_county(&self, candidate: &str) -> bool {
        self.canonical(candidate).is_some()
    }

    /// Canonical names in reference order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `state code + subdivision code`, e.g. `"54039"`; `None` for anything
    /// that is not a known county.
    pub fn district_id(&self, county: &str) -> Option<String> {
        let &i = self.index.get(&normalise(county))?;
        Some(format!("{}{}", self.state_code, self.entries[i].1))
    }

    /// `"{COUNTY} COUNTY SCHOOLS"`; `None` for unknown counties.
    pub fn district_name(&self, county: &str) -> Option<String> {
        let name = self.canonical(county)?;
        Some(format!("{} COUNTY SCHOOLS", name.to_uppercase()))
    }
}

/// Matching key: uppercase letters only, trailing `COUNTY` dropped.
fn normalise(candidate: &str) -> String {
    let key: String = candidate
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect();
    match key.strip_suffix("COUNTY") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CountyRegistry {
        CountyRegistry::new(&ReferenceData::builtin().unwrap())
    }

    #[test]
    fn canonical_ignores_case_spacing_and_suffix() {
        let r = registry();
        assert_eq!(r.canonical("KANAWHA"), Some("Kanawha"));
        assert_eq!(r.canonical("  kanawha "), Some("Kanawha"));
        assert_eq!(r.canonical("MC DOWELL"), Some("McDowell"));
        assert_eq!(r.canonical("Mcdowell County"), Some("McDowell"));
        assert_eq!(r.canonical("Total"), None);
        assert_eq!(r.canonical(""), None);
    }

    #[test]
    fn every_county_gets_a_well_formed_stable_id() {
        let r = registry();
        let names: Vec<String> = r.names().map(str::to_string).collect();
        assert_eq!(names.len(), 55);
        let mut seen = std::collections::HashSet::new();
        for name in &names {
            let id = r.district_id(name).expect("known county has an id");
            assert_eq!(id.len(), 5, "{name} → {id}");
            assert!(id.starts_with("54"));
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert_eq!(r.district_id(&name.to_uppercase()), Some(id.clone()));
            assert!(seen.insert(id), "duplicate id for {name}");
        }
    }

    #[test]
    fn unknown_county_has_no_id() {
        let r = registry();
        assert_eq!(r.district_id("Allegheny"), None);
        assert_eq!(r.district_id("STATE TOTAL"), None);
        assert_eq!(r.district_name("Allegheny"), None);
    }

    #[test]
    fn known_ids_and_names() {
        let r = registry();
        assert_eq!(r.district_id("Barbour").as_deref(), Some("54001"));
        assert_eq!(r.district_id("Kanawha").as_deref(), Some("54039"));
        assert_eq!(r.district_id("Wyoming").as_deref(), Some("54109"));
        assert_eq!(
            r.district_name("mcdowell").as_deref(),
            Some("MCDOWELL COUNTY SCHOOLS")
        );
    }

    #[test]
    fn bare_county_word_is_not_a_county() {
        assert_eq!(normalise("County"), "COUNTY");
        assert!(!registry().is_county("County"));
    }
}
