//! # wvenroll
//!
//! West Virginia public school enrollment, by county district and grade,
//! extracted from the state education agency's published PDF reports.
//!
//! The agency publishes two reports per school year: enrollment by grade
//! and a headcount total. Their layouts changed across years without notice,
//! so this crate detects the layout from the page text, parses county rows,
//! reconciles the two reports, adds a state row and reshapes everything into
//! a stable long-format schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! year
//!  │
//!  ├─ 1. Resolve    candidate URLs (verified table, then patterns)
//!  ├─ 2. Fetch      first plausible PDF (signature + size check)
//!  ├─ 3. Extract    text layer via pdfium (spawn_blocking)
//!  ├─ 4. Parse      legacy rows or split-page fragments
//!  ├─ 5. Reconcile  headcount overrides the row total
//!  ├─ 6. Aggregate  synthetic state row
//!  └─ 7. Reshape    wide records or tidy rows with K8/HS/K12 bands
//! ```
//!
//! Suppressed counts (`*`, `N/A`, `<10`, …) are absent, never zero.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wvenroll::{fetch_enr, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::new()?;
//!     let output = fetch_enr(2023, &config).await?;
//!     println!("{} tidy rows", output.data.len());
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `wvenroll` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! wvenroll = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Text extraction binds to the pdfium shared library at runtime. Set
//! `PDFIUM_LIB_PATH` to a specific library file, or install pdfium where the
//! system loader finds it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod count;
pub mod county;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reference;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{
    cache_status, clear_cache, Cache, CacheEntry, CacheKey, DiskCache, MemoryCache, NoCache,
};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use county::CountyRegistry;
pub use error::{EnrollmentError, YearWarning};
pub use fetch::{
    encode_outputs, fetch_enr, fetch_enr_multi, fetch_enr_sync, fetch_enr_to_file, EnrollmentClient,
};
pub use output::{
    BatchOutput, DatasetKind, DistrictEnrollmentRecord, EnrollmentData, EnrollmentOutput,
    FailedYear, Grade, GradeCounts, GradeLevel, OutputFormat, OutputShape, Scope, Subgroup,
    TidyEnrollmentRow, YearStats,
};
pub use pipeline::aggregate::aggregate_state;
pub use pipeline::detect::{detect_layout, Layout};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::input::{FetchedDocument, Fetcher, HttpFetcher};
pub use pipeline::tag::id_enr_aggs;
pub use pipeline::tidy::tidy_enr;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reference::{get_available_years, ReferenceData};
pub use stream::{fetch_enr_stream, YearResult, YearStream};
