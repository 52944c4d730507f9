//! Candidate document URLs for a (year, kind) pair.
//!
//! Verified URLs come first, then every template expanded for every
//! publication slot. No network I/O happens here.

use crate::error::EnrollmentError;
use crate::output::DatasetKind;
use crate::reference::{PublicationSlot, ReferenceData};
use std::collections::HashSet;
use tracing::debug;

/// `"2023-24"` for end year 2024.
pub fn school_year_label(end_year: u16) -> String {
    format!("{}-{:02}", end_year.saturating_sub(1), end_year % 100)
}

fn expand(template: &str, end_year: u16, slot: PublicationSlot) -> String {
    let pub_year = i32::from(end_year) + slot.year_offset;
    template
        .replace("{pub_year}", &pub_year.to_string())
        .replace("{month}", &format!("{:02}", slot.month))
        .replace("{school_year}", &school_year_label(end_year))
        .replace("{start_year}", &end_year.saturating_sub(1).to_string())
        .replace("{end_year}", &end_year.to_string())
}

/// Ordered, de-duplicated candidate URLs, most likely first.
///
/// Fails with [`EnrollmentError::UnsupportedYear`] for a year outside the
/// published list; never returns an empty list otherwise.
pub fn candidate_urls(
    reference: &ReferenceData,
    end_year: u16,
    kind: DatasetKind,
) -> Result<Vec<String>, EnrollmentError> {
    reference.check_year(end_year)?;

    let verified = reference.verified_urls(end_year, kind).iter().cloned();
    let guessed = reference.templates(kind).iter().flat_map(|template| {
        reference
            .publication_slots
            .iter()
            .map(move |&slot| expand(template, end_year, slot))
    });

    let mut seen = HashSet::new();
    let urls: Vec<String> = verified
        .chain(guessed)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect();

    if urls.is_empty() {
        return Err(EnrollmentError::Internal(format!(
            "no candidate URLs for {kind} {end_year}"
        )));
    }
    debug!("{kind} {end_year}: {} candidate URLs", urls.len());
    Ok(urls)
}
