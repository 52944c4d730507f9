//! Eager entry points: produce one year, or a batch of years.
//!
//! [`EnrollmentClient`] owns the three collaborators (fetcher, text
//! extractor, cache) and runs the pipeline for a year:
//!
//! ```text
//! check year ─▶ cache? ─▶ resolve ─▶ fetch ─▶ extract ─▶ detect ─▶ parse
//!                                                                   │
//!        cache ◀─ shape ◀─ state row ◀─ reconcile ◀─ headcount ◀────┘
//! ```
//!
//! The free functions ([`fetch_enr`], [`fetch_enr_multi`], …) build a client
//! with the default collaborators from a [`PipelineConfig`].

use crate::cache::{cache_for, get_json, put_json, Cache, CacheKey};
use crate::config::PipelineConfig;
use crate::county::CountyRegistry;
use crate::error::{EnrollmentError, YearWarning};
use crate::output::{
    BatchOutput, DatasetKind, DistrictEnrollmentRecord, EnrollmentData, EnrollmentOutput,
    FailedYear, Grade, HeadcountRow, OutputFormat, OutputShape, RawGradeRow, YearStats,
};
use crate::pipeline::detect::{detect_layout, Layout};
use crate::pipeline::extract::{extract_pages, PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{fetch_first, Fetcher, HttpFetcher};
use crate::pipeline::{aggregate, headcount, legacy, modern, reconcile, resolve, tidy};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the pipeline with a fixed set of collaborators.
#[derive(Clone)]
pub struct EnrollmentClient {
    config: PipelineConfig,
    counties: CountyRegistry,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
    cache: Arc<dyn Cache>,
}

impl EnrollmentClient {
    /// HTTP fetcher, pdfium extractor and the cache `config` asks for.
    pub fn new(config: PipelineConfig) -> Result<Self, EnrollmentError> {
        let fetcher = HttpFetcher::new(config.download_timeout_secs, &config.user_agent)?;
        let cache = cache_for(&config);
        Ok(Self::with_parts(
            config,
            Arc::new(fetcher),
            Arc::new(PdfiumExtractor::new()),
            cache,
        ))
    }

    /// Explicit collaborators, e.g. offline fakes in tests.
    pub fn with_parts(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        let counties = CountyRegistry::new(&config.reference);
        Self {
            config,
            counties,
            fetcher,
            extractor,
            cache,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    /// Produce one year.
    ///
    /// # Errors
    /// - [`EnrollmentError::UnsupportedYear`] before any I/O
    /// - [`EnrollmentError::DocumentUnavailable`] when no grade-detail
    ///   document could be retrieved
    /// - [`EnrollmentError::PdfiumBindingFailed`] when no PDF library loads
    ///
    /// Everything else (missing headcount, unreadable or unparseable
    /// documents, absent counties) is reported through `warnings`.
    pub async fn fetch_year(&self, year: u16) -> Result<EnrollmentOutput, EnrollmentError> {
        let start = Instant::now();
        self.config.reference.check_year(year)?;

        let shape = self.config.output_shape;
        let key = CacheKey::new(year, DatasetKind::GradeDetail, shape);
        if let Some(mut cached) = get_json::<EnrollmentOutput>(self.cache.as_ref(), &key) {
            info!("{year}: loaded {} {} rows from cache", cached.data.len(), shape.as_str());
            cached.stats.from_cache = true;
            cached.stats.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        info!("{year}: fetching enrollment");
        let mut warnings = Vec::new();
        let mut stats = YearStats::default();

        // ── Grade detail (mandatory) ─────────────────────────────────────
        let pages = match self.retrieve_pages(year, DatasetKind::GradeDetail).await? {
            Retrieved::Pages { url, pages } => {
                stats.grade_detail_url = Some(url);
                pages
            }
            Retrieved::Unreadable { url } => {
                stats.grade_detail_url = Some(url);
                Vec::new()
            }
        };
        stats.pages = pages.len();

        let layout = detect_layout(&pages);
        stats.layout = Some(layout.to_string());
        let grade_rows = self.parse_grade_detail(year, layout, &pages, &mut warnings);
        info!("{year}: {} layout, {} county rows", layout, grade_rows.len());

        if grade_rows.is_empty() {
            let warning = YearWarning::UnparseableDocument {
                year,
                kind: DatasetKind::GradeDetail,
            };
            warn!("{warning}");
            warnings.push(warning);
            stats.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(EnrollmentOutput {
                end_year: year,
                data: shape_records(shape, &[]),
                warnings,
                stats,
            });
        }

        // ── Headcount (corroborating) ────────────────────────────────────
        let headcounts = match self.fetch_headcount(year).await {
            Ok((url, rows)) => {
                stats.headcount_url = Some(url);
                if rows.is_empty() {
                    let warning = YearWarning::UnparseableDocument {
                        year,
                        kind: DatasetKind::Headcount,
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                }
                rows
            }
            Err(e) => {
                let warning = YearWarning::HeadcountUnavailable {
                    year,
                    detail: e.to_string(),
                };
                warn!("{warning}");
                warnings.push(warning);
                Vec::new()
            }
        };
        stats.headcount_rows = headcounts.len();

        // ── Reconcile, aggregate, shape ──────────────────────────────────
        let reconciled = reconcile::reconcile(year, &grade_rows, &headcounts, &self.counties);
        warnings.extend(reconciled.warnings);
        stats.headcount_overrides = reconciled.headcount_overrides;
        stats.district_rows = reconciled.records.len();

        let records = aggregate::with_state_row(reconciled.records);
        let data = shape_records(shape, &records);
        stats.duration_ms = start.elapsed().as_millis() as u64;

        let output = EnrollmentOutput {
            end_year: year,
            data,
            warnings,
            stats,
        };

        if let Err(e) = put_json(self.cache.as_ref(), &key, &output) {
            warn!("{year}: could not write cache entry: {e}");
        }

        info!(
            "{year}: {} {} rows, {} warnings, {}ms",
            output.data.len(),
            shape.as_str(),
            output.warnings.len(),
            output.stats.duration_ms
        );
        Ok(output)
    }

    /// Produce several years, one after another.
    ///
    /// Every year is validated before any I/O. A year that fails is recorded
    /// in `failed_years`; the batch fails only when every year does.
    pub async fn fetch_years(&self, years: &[u16]) -> Result<BatchOutput, EnrollmentError> {
        validate_years(&self.config, years)?;

        let total = years.len();
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_batch_start(total);
        }

        let mut outputs = Vec::with_capacity(total);
        let mut failed_years = Vec::new();

        for (i, &year) in years.iter().enumerate() {
            if let Some(cb) = cb {
                cb.on_year_start(year, i + 1, total);
            }
            match self.fetch_year(year).await {
                Ok(output) => {
                    if let Some(cb) = cb {
                        cb.on_year_complete(year, i + 1, total, output.data.len());
                    }
                    outputs.push(output);
                }
                Err(e) => {
                    warn!("{year}: {e}");
                    if let Some(cb) = cb {
                        cb.on_year_error(year, i + 1, total, &e.to_string());
                    }
                    failed_years.push(FailedYear {
                        end_year: year,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Some(cb) = cb {
            cb.on_batch_complete(total, outputs.len());
        }

        if outputs.is_empty() {
            let first_error = failed_years
                .first()
                .map(|f| f.error.clone())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(EnrollmentError::AllYearsFailed { total, first_error });
        }

        info!(
            "Batch complete: {}/{} years succeeded",
            outputs.len(),
            total
        );
        Ok(BatchOutput {
            years: outputs,
            failed_years,
        })
    }

    fn parse_grade_detail(
        &self,
        year: u16,
        layout: Layout,
        pages: &[String],
        warnings: &mut Vec<YearWarning>,
    ) -> Vec<RawGradeRow> {
        match layout {
            Layout::Legacy => legacy::parse_legacy(pages, &self.counties),
            Layout::ModernSplit => {
                let parsed = modern::parse_modern(pages, &self.counties);
                for (county, side) in parsed.partial {
                    let warning = YearWarning::PartialCountyData {
                        year,
                        county,
                        missing_side: side.as_str().to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                }
                parsed.rows
            }
        }
    }

    async fn fetch_headcount(
        &self,
        year: u16,
    ) -> Result<(String, Vec<HeadcountRow>), EnrollmentError> {
        let (url, pages) = match self.retrieve_pages(year, DatasetKind::Headcount).await? {
            Retrieved::Pages { url, pages } => (url, pages),
            Retrieved::Unreadable { url } => (url, Vec::new()),
        };
        let rows = headcount::parse_headcount(&pages, &self.counties);
        debug!("{year}: {} headcount rows", rows.len());
        Ok((url, rows))
    }

    /// Fetch candidates in order and extract the first one that reads.
    ///
    /// A document whose text layer cannot be read moves the search on to
    /// the next candidate. When no later candidate is plausible the last
    /// unreadable document is returned so the caller can degrade to an
    /// empty result instead of failing the year.
    async fn retrieve_pages(
        &self,
        year: u16,
        kind: DatasetKind,
    ) -> Result<Retrieved, EnrollmentError> {
        let urls = resolve::candidate_urls(&self.config.reference, year, kind)?;
        let mut remaining = urls.as_slice();
        let mut unreadable: Option<String> = None;

        while !remaining.is_empty() {
            let doc = match fetch_first(
                self.fetcher.as_ref(),
                remaining,
                self.config.min_document_bytes,
                year,
                kind,
            )
            .await
            {
                Ok(doc) => doc,
                Err(e) => {
                    return match unreadable {
                        Some(url) => Ok(Retrieved::Unreadable { url }),
                        None => Err(e),
                    }
                }
            };

            let next = remaining
                .iter()
                .position(|u| *u == doc.url)
                .map_or(remaining.len(), |i| i + 1);
            remaining = &remaining[next..];

            match extract_pages(Arc::clone(&self.extractor), doc.bytes).await {
                Ok(pages) => return Ok(Retrieved::Pages { url: doc.url, pages }),
                Err(EnrollmentError::PdfExtractionFailed { detail }) => {
                    warn!("{kind} {year}: could not read {}: {detail}", doc.url);
                    unreadable = Some(doc.url);
                }
                Err(e) => return Err(e),
            }
        }

        unreadable.map(|url| Retrieved::Unreadable { url }).ok_or_else(|| {
            EnrollmentError::Internal(format!("no candidate URLs for {kind} {year}"))
        })
    }
}

/// Outcome of `EnrollmentClient::retrieve_pages`.
enum Retrieved {
    Pages { url: String, pages: Vec<String> },
    /// Every plausible candidate failed text extraction.
    Unreadable { url: String },
}

/// Reject an empty request or any unpublished year before doing any I/O.
pub(crate) fn validate_years(
    config: &PipelineConfig,
    years: &[u16],
) -> Result<(), EnrollmentError> {
    if years.is_empty() {
        return Err(EnrollmentError::InvalidConfig("No years requested".into()));
    }
    years
        .iter()
        .try_for_each(|&year| config.reference.check_year(year))
}

fn shape_records(shape: OutputShape, records: &[DistrictEnrollmentRecord]) -> EnrollmentData {
    match shape {
        OutputShape::Wide => EnrollmentData::Wide(records.to_vec()),
        OutputShape::Tidy => EnrollmentData::Tidy(tidy::tidy_enr(records)),
    }
}

// ── Free functions ───────────────────────────────────────────────────────

/// Fetch one school year (identified by its end year, e.g. 2024 for 2023-24).
///
/// # Example
/// ```rust,no_run
/// use wvenroll::{fetch_enr, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::new()?;
/// let output = fetch_enr(2024, &config).await?;
/// println!("{} rows, {} warnings", output.data.len(), output.warnings.len());
/// # Ok(())
/// # }
/// ```
pub async fn fetch_enr(
    year: u16,
    config: &PipelineConfig,
) -> Result<EnrollmentOutput, EnrollmentError> {
    config.reference.check_year(year)?;
    EnrollmentClient::new(config.clone())?.fetch_year(year).await
}

/// Synchronous wrapper around [`fetch_enr`].
///
/// Creates a temporary tokio runtime internally.
pub fn fetch_enr_sync(
    year: u16,
    config: &PipelineConfig,
) -> Result<EnrollmentOutput, EnrollmentError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EnrollmentError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(fetch_enr(year, config))
}

/// Fetch several years sequentially; see [`EnrollmentClient::fetch_years`].
pub async fn fetch_enr_multi(
    years: &[u16],
    config: &PipelineConfig,
) -> Result<BatchOutput, EnrollmentError> {
    validate_years(config, years)?;
    EnrollmentClient::new(config.clone())?.fetch_years(years).await
}

/// Fetch one year and write it to `path` in `format`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn fetch_enr_to_file(
    year: u16,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &PipelineConfig,
) -> Result<EnrollmentOutput, EnrollmentError> {
    let output = fetch_enr(year, config).await?;
    let bytes = encode_outputs(std::slice::from_ref(&output), format)?;
    write_atomic(output_path.as_ref(), &bytes).await?;
    Ok(output)
}

// ── Output files ─────────────────────────────────────────────────────────

const WIDE_ID_COLUMNS: [&str; 6] = [
    "end_year",
    "scope",
    "district_id",
    "district_name",
    "county",
    "row_total",
];

/// Serialise one or more years.
///
/// JSON is an array of per-year outputs (data, warnings and stats). CSV is
/// the rows of every year under one header; all years must share a shape.
pub fn encode_outputs(
    outputs: &[EnrollmentOutput],
    format: OutputFormat,
) -> Result<Vec<u8>, EnrollmentError> {
    match format {
        OutputFormat::Json => serde_json::to_vec_pretty(outputs)
            .map_err(|e| EnrollmentError::Internal(format!("JSON encode: {e}"))),
        OutputFormat::Csv => encode_csv(outputs),
    }
}

fn encode_csv(outputs: &[EnrollmentOutput]) -> Result<Vec<u8>, EnrollmentError> {
    let csv_err = |e: csv::Error| EnrollmentError::Internal(format!("CSV encode: {e}"));
    let shape = outputs
        .first()
        .map(|o| o.data.shape())
        .unwrap_or_default();
    if outputs.iter().any(|o| o.data.shape() != shape) {
        return Err(EnrollmentError::Internal(
            "cannot write wide and tidy years to one CSV".into(),
        ));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    match shape {
        OutputShape::Tidy => {
            for output in outputs {
                if let EnrollmentData::Tidy(rows) = &output.data {
                    for row in rows {
                        writer.serialize(row).map_err(csv_err)?;
                    }
                }
            }
        }
        OutputShape::Wide => {
            let header = WIDE_ID_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .chain(Grade::ALL.iter().map(|g| format!("grade_{}", g.label().to_lowercase())));
            writer.write_record(header).map_err(csv_err)?;
            for output in outputs {
                if let EnrollmentData::Wide(records) = &output.data {
                    for r in records {
                        writer.write_record(wide_fields(r)).map_err(csv_err)?;
                    }
                }
            }
        }
    }
    writer
        .into_inner()
        .map_err(|e| EnrollmentError::Internal(format!("CSV flush: {e}")))
}

fn wide_fields(r: &DistrictEnrollmentRecord) -> Vec<String> {
    let count = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
    let mut fields = vec![
        r.end_year.to_string(),
        r.scope.as_str().to_string(),
        r.district_id.clone().unwrap_or_default(),
        r.district_name.clone().unwrap_or_default(),
        r.county.clone().unwrap_or_default(),
        count(r.row_total),
    ];
    fields.extend(r.grades.iter().map(|(_, v)| count(v)));
    fields
}

/// Write via a sibling temp file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EnrollmentError> {
    let fail = |e: std::io::Error| EnrollmentError::OutputWriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{GradeCounts, Scope};

    fn output(shape: OutputShape) -> EnrollmentOutput {
        let record = DistrictEnrollmentRecord {
            end_year: 2020,
            scope: Scope::District,
            district_id: Some("54001".into()),
            district_name: Some("BARBOUR COUNTY SCHOOLS".into()),
            county: Some("Barbour".into()),
            row_total: Some(100.0),
            grades: GradeCounts::from_ordered(&[Some(100.0)]),
        };
        EnrollmentOutput {
            end_year: 2020,
            data: shape_records(shape, &[record]),
            warnings: vec![],
            stats: YearStats::default(),
        }
    }

    #[test]
    fn tidy_csv_has_header_and_rows() {
        let bytes = encode_outputs(&[output(OutputShape::Tidy)], OutputFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("end_year,aggregation_flag,district_id"));
        assert!(header.contains("grade_level"));
        let first = lines.next().unwrap();
        assert!(first.contains("district,54001"), "got: {first}");
        assert!(first.contains("TOTAL,total_enrollment,100.0,1.0"), "got: {first}");
    }

    #[test]
    fn wide_csv_leaves_absent_grades_empty() {
        let bytes = encode_outputs(&[output(OutputShape::Wide)], OutputFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("grade_pk,grade_k,grade_01,grade_02,grade_03,grade_04,grade_05,grade_06,grade_07,grade_08,grade_09,grade_10,grade_11,grade_12"));
        let expected = format!(
            "2020,district,54001,BARBOUR COUNTY SCHOOLS,Barbour,100,100{}",
            ",".repeat(13)
        );
        assert_eq!(lines[1], expected);
    }

    #[test]
    fn mixed_shapes_cannot_share_a_csv() {
        let outputs = [output(OutputShape::Wide), output(OutputShape::Tidy)];
        assert!(encode_outputs(&outputs, OutputFormat::Csv).is_err());
        assert!(encode_outputs(&outputs, OutputFormat::Json).is_ok());
    }

    #[test]
    fn empty_request_is_rejected() {
        let config = PipelineConfig::new().unwrap();
        assert!(matches!(
            validate_years(&config, &[]),
            Err(EnrollmentError::InvalidConfig(_))
        ));
        assert!(matches!(
            validate_years(&config, &[2020, 1990]),
            Err(EnrollmentError::UnsupportedYear { year: 1990, .. })
        ));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("enr.csv");
        write_atomic(&path, b"a,b\n").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n");
        assert!(!dir.path().join("out").join("enr.csv.tmp").exists());
    }
}
