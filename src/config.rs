//! Configuration for enrollment retrieval.
//!
//! Everything is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`].

use crate::error::EnrollmentError;
use crate::output::OutputShape;
use crate::progress::ProgressCallback;
use crate::reference::ReferenceData;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default `User-Agent` for document requests.
pub const DEFAULT_USER_AGENT: &str = concat!("wvenroll/", env!("CARGO_PKG_VERSION"));

/// Configuration for fetching enrollment data.
///
/// Built via [`PipelineConfig::builder()`]; [`PipelineConfig::new()`] gives
/// the defaults with the built-in reference data.
///
/// # Example
/// ```rust
/// use wvenroll::{OutputShape, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .download_timeout_secs(60)
///     .output_shape(OutputShape::Wide)
///     .use_cache(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Per-attempt download timeout in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Smallest body accepted as a report; smaller PDFs are treated as
    /// error pages. Default: 5000.
    pub min_document_bytes: usize,

    /// Read parsed years from the cache and write them back. Default: true.
    pub use_cache: bool,

    /// Cache directory. `None` uses the platform cache directory.
    pub cache_dir: Option<PathBuf>,

    /// Counties, published years and document URLs.
    pub reference: Arc<ReferenceData>,

    /// Wide records or tidy rows. Default: tidy.
    pub output_shape: OutputShape,

    pub user_agent: String,

    /// Per-year progress events for batch requests.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("min_document_bytes", &self.min_document_bytes)
            .field("use_cache", &self.use_cache)
            .field("cache_dir", &self.cache_dir)
            .field("supported_years", &self.reference.supported_years)
            .field("output_shape", &self.output_shape)
            .field("user_agent", &self.user_agent)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Defaults with the built-in reference data.
    pub fn new() -> Result<Self, EnrollmentError> {
        Self::builder().build()
    }

    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            download_timeout_secs: 30,
            min_document_bytes: 5000,
            use_cache: true,
            cache_dir: None,
            reference: None,
            output_shape: OutputShape::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            progress_callback: None,
        }
    }

    /// Where the disk cache lives for this configuration.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// `<platform cache dir>/wvenroll`, or a temp-dir fallback.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("wvenroll")
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    download_timeout_secs: u64,
    min_document_bytes: usize,
    use_cache: bool,
    cache_dir: Option<PathBuf>,
    reference: Option<Arc<ReferenceData>>,
    output_shape: OutputShape,
    user_agent: String,
    progress_callback: Option<ProgressCallback>,
}

impl PipelineConfigBuilder {
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn min_document_bytes(mut self, bytes: usize) -> Self {
        self.min_document_bytes = bytes;
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.use_cache = v;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn reference(mut self, reference: Arc<ReferenceData>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn output_shape(mut self, shape: OutputShape) -> Self {
        self.output_shape = shape;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, EnrollmentError> {
        if self.download_timeout_secs == 0 {
            return Err(EnrollmentError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if self.min_document_bytes == 0 {
            return Err(EnrollmentError::InvalidConfig(
                "Minimum document size must be ≥ 1 byte".into(),
            ));
        }
        let reference = match self.reference {
            Some(r) => r,
            None => ReferenceData::builtin()?,
        };
        Ok(PipelineConfig {
            download_timeout_secs: self.download_timeout_secs,
            min_document_bytes: self.min_document_bytes,
            use_cache: self.use_cache,
            cache_dir: self.cache_dir,
            reference,
            output_shape: self.output_shape,
            user_agent: self.user_agent,
            progress_callback: self.progress_callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::new().unwrap();
        assert_eq!(c.download_timeout_secs, 30);
        assert_eq!(c.min_document_bytes, 5000);
        assert!(c.use_cache);
        assert!(c.cache_dir.is_none());
        assert_eq!(c.output_shape, OutputShape::Tidy);
        assert!(c.user_agent.starts_with("wvenroll/"));
        assert_eq!(c.reference.counties.len(), 55);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = PipelineConfig::builder().download_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidConfig(_)));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(PipelineConfig::builder().min_document_bytes(0).build().is_err());
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let c = PipelineConfig::builder().cache_dir("/tmp/wv").build().unwrap();
        assert_eq!(c.resolved_cache_dir(), PathBuf::from("/tmp/wv"));
        let d = PipelineConfig::new().unwrap();
        assert!(d.resolved_cache_dir().ends_with("wvenroll"));
    }

    #[test]
    fn debug_hides_callback() {
        let c = PipelineConfig::builder()
            .progress_callback(Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        assert!(format!("{c:?}").contains("<dyn BatchProgressCallback>"));
    }
}
