//! Progress-callback trait for per-year batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a multi-year request works through its years.
//!
//! # Example
//!
//! ```rust
//! use wvenroll::{BatchProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_year_complete(&self, year: u16, index: usize, total: usize, rows: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{year} ({index}/{total}): {rows} rows");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch entry points as each year is processed.
///
/// All methods default to no-ops. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first year.
    fn on_batch_start(&self, total_years: usize) {
        let _ = total_years;
    }

    fn on_year_start(&self, year: u16, index: usize, total: usize) {
        let _ = (year, index, total);
    }

    /// `rows` is the number of wide records or tidy rows produced.
    fn on_year_complete(&self, year: u16, index: usize, total: usize, rows: usize) {
        let _ = (year, index, total, rows);
    }

    fn on_year_error(&self, year: u16, index: usize, total: usize, error: &str) {
        let _ = (year, index, total, error);
    }

    /// Called once after every year has been attempted.
    fn on_batch_complete(&self, total_years: usize, success_count: usize) {
        let _ = (total_years, success_count);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
