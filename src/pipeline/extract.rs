//! PDF text layer extraction.
//!
//! Reports are born-digital, so the embedded text layer is read directly;
//! scanned documents without one yield empty pages and parse to nothing.

use crate::error::EnrollmentError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Turns PDF bytes into one string per page.
///
/// Implementations are blocking; the pipeline calls them from
/// `spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, EnrollmentError>;
}

/// [`TextExtractor`] backed by pdfium.
///
/// Binds to `PDFIUM_LIB_PATH` when set, otherwise to the system library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    /// Use a specific pdfium library file.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, EnrollmentError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path).map_err(|e| {
                EnrollmentError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
            })?,
            None => Pdfium::bind_to_system_library()
                .map_err(|e| EnrollmentError::PdfiumBindingFailed(format!("{e:?}")))?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, EnrollmentError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| EnrollmentError::PdfExtractionFailed {
                detail: format!("{e:?}"),
            })?;

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| EnrollmentError::PdfExtractionFailed {
                    detail: format!("page {}: {e:?}", idx + 1),
                })?
                .all();
            debug!("Page {}: {} chars of text", idx + 1, text.len());
            pages.push(text);
        }
        Ok(pages)
    }
}

/// Run an extractor off the async runtime.
pub async fn extract_pages(
    extractor: Arc<dyn TextExtractor>,
    bytes: Vec<u8>,
) -> Result<Vec<String>, EnrollmentError> {
    tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
        .await
        .map_err(|e| EnrollmentError::Internal(format!("Extraction task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pages(Vec<&'static str>);

    impl TextExtractor for Pages {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>, EnrollmentError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[tokio::test]
    async fn extraction_runs_on_blocking_pool() {
        let extractor: Arc<dyn TextExtractor> = Arc::new(Pages(vec!["one", "two"]));
        let pages = extract_pages(extractor, b"%PDF".to_vec()).await.unwrap();
        assert_eq!(pages, vec!["one", "two"]);
    }

    #[test]
    fn explicit_library_path_is_kept() {
        let x = PdfiumExtractor::with_library("/opt/pdfium/libpdfium.so");
        assert_eq!(x.library_path, Some(PathBuf::from("/opt/pdfium/libpdfium.so")));
    }
}
