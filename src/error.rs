//! Error types for the wvenroll library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EnrollmentError`]: **Fatal**: the year cannot be produced at all
//!   (unsupported year, no grade-detail document could be retrieved, bad
//!   configuration). Returned as `Err(EnrollmentError)` from the top-level
//!   `fetch_enr*` functions.
//!
//! * [`YearWarning`]: **Non-fatal**: something about one document, page or
//!   county was off (headcount report missing, a county absent from the
//!   report, a stated total disagreeing with its grades) but the year still
//!   yields output. Stored inside [`crate::output::EnrollmentOutput`] so
//!   callers can inspect partial success.

use crate::output::DatasetKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the wvenroll library.
///
/// Parse-level problems use [`YearWarning`] and are stored in
/// [`crate::output::EnrollmentOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The requested school year is not in the published year list.
    #[error("School year {year} is not available.\nAvailable years: {available}")]
    UnsupportedYear { year: u16, available: String },

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// Every candidate URL for a document was tried and none yielded a PDF.
    #[error(
        "No {kind} document could be retrieved for {year} after {attempts} candidate URLs.\nLast error: {last_error}"
    )]
    DocumentUnavailable {
        year: u16,
        kind: DatasetKind,
        attempts: usize,
        last_error: String,
    },

    /// HTTP request failed or returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured per-attempt timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The response body does not start with the PDF signature.
    #[error("Response from '{url}' is not a PDF. First bytes: {magic:?}")]
    NotAPdf { url: String, magic: Vec<u8> },

    /// The response is a PDF but too small to be a real report.
    #[error("Response from '{url}' is only {bytes} bytes (minimum {minimum}); treating as an error page")]
    DocumentTooSmall {
        url: String,
        bytes: usize,
        minimum: usize,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document or read its text layer.
    #[error("Could not extract text from PDF: {detail}")]
    PdfExtractionFailed { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Configuration errors ──────────────────────────────────────────────
    /// Reference data file could not be read or failed validation.
    #[error("Invalid reference data{}: {detail}", .path.as_ref().map(|p| format!(" in '{}'", p.display())).unwrap_or_default())]
    ReferenceData {
        path: Option<PathBuf>,
        detail: String,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a cache entry failed.
    #[error("Cache error at '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every year in a multi-year request failed.
    #[error("All {total} requested years failed.\nFirst error: {first_error}")]
    AllYearsFailed { total: usize, first_error: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem found while producing one year.
///
/// Every warning is also logged through `tracing::warn!` at the point it is
/// raised.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum YearWarning {
    /// The headcount report could not be retrieved; totals come from grades.
    #[error("{year}: headcount document unavailable ({detail}); totals use grade sums")]
    HeadcountUnavailable { year: u16, detail: String },

    /// A document was retrieved but yielded no data rows.
    #[error("{year}: {kind} document yielded no data rows")]
    UnparseableDocument { year: u16, kind: DatasetKind },

    /// Known counties with no row in the grade-detail document.
    #[error("{year}: {} counties missing from the report: {}", .counties.len(), .counties.join(", "))]
    MissingCounties { year: u16, counties: Vec<String> },

    /// A county appeared on only one half of a split-page report.
    #[error("{year}: {county} has no {missing_side} fragment; those grades are absent")]
    PartialCountyData {
        year: u16,
        county: String,
        missing_side: String,
    },

    /// A stated row total disagrees with the sum of its grade counts.
    #[error("{year}: {county} stated total {stated} differs from grade sum {computed}")]
    TotalMismatch {
        year: u16,
        county: String,
        stated: f64,
        computed: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_year_display_lists_available() {
        let e = EnrollmentError::UnsupportedYear {
            year: 1999,
            available: "2014-2025".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("1999"), "got: {msg}");
        assert!(msg.contains("2014-2025"), "got: {msg}");
    }

    #[test]
    fn document_unavailable_display() {
        let e = EnrollmentError::DocumentUnavailable {
            year: 2020,
            kind: DatasetKind::GradeDetail,
            attempts: 6,
            last_error: "HTTP 404".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("grade_detail"), "got: {msg}");
        assert!(msg.contains("6 candidate"), "got: {msg}");
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn reference_data_display_with_and_without_path() {
        let with = EnrollmentError::ReferenceData {
            path: Some(PathBuf::from("/tmp/ref.json")),
            detail: "54 counties".into(),
        };
        assert!(with.to_string().contains("/tmp/ref.json"));

        let without = EnrollmentError::ReferenceData {
            path: None,
            detail: "54 counties".into(),
        };
        assert_eq!(without.to_string(), "Invalid reference data: 54 counties");
    }

    #[test]
    fn missing_counties_display() {
        let w = YearWarning::MissingCounties {
            year: 2021,
            counties: vec!["Wirt".into(), "Wood".into()],
        };
        let msg = w.to_string();
        assert!(msg.contains("2 counties"), "got: {msg}");
        assert!(msg.contains("Wirt, Wood"));
    }

    #[test]
    fn warning_serialises_with_variant_tag() {
        let w = YearWarning::UnparseableDocument {
            year: 2018,
            kind: DatasetKind::Headcount,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains(r#""warning":"unparseable_document""#), "got: {json}");
    }
}
