//! Document retrieval: download candidate URLs until one is a real report.
//!
//! The agency's web server answers missing documents with an HTML page and a
//! 200 status, so a successful response is not enough. A body is accepted
//! only if it starts with the PDF signature (`%PDF`) and is at least
//! `min_document_bytes` long; anything smaller is an error page.

use crate::error::EnrollmentError;
use crate::output::DatasetKind;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A document that passed the plausibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// Retrieves raw bytes for a URL.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, EnrollmentError>>;
}

/// [`Fetcher`] over HTTP(S) with a fixed per-attempt timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, EnrollmentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| EnrollmentError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, EnrollmentError> {
        debug!("GET {url}");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                EnrollmentError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                EnrollmentError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(EnrollmentError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                EnrollmentError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                EnrollmentError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, EnrollmentError>> {
        Box::pin(self.download(url))
    }
}

/// Reject bodies that are not a PDF or are too small to be a report.
pub fn check_plausible(url: &str, bytes: &[u8], min_bytes: usize) -> Result<(), EnrollmentError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(EnrollmentError::NotAPdf {
            url: url.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    if bytes.len() < min_bytes {
        return Err(EnrollmentError::DocumentTooSmall {
            url: url.to_string(),
            bytes: bytes.len(),
            minimum: min_bytes,
        });
    }
    Ok(())
}

/// Try each candidate in order; the first plausible document wins.
///
/// Attempts are sequential. When every candidate fails the result is
/// [`EnrollmentError::DocumentUnavailable`] carrying the last failure.
pub async fn fetch_first(
    fetcher: &dyn Fetcher,
    urls: &[String],
    min_bytes: usize,
    year: u16,
    kind: DatasetKind,
) -> Result<FetchedDocument, EnrollmentError> {
    let mut last_error = String::from("no candidate URLs");

    for (attempt, url) in urls.iter().enumerate() {
        let outcome = match fetcher.fetch(url).await {
            Ok(bytes) => check_plausible(url, &bytes, min_bytes).map(|()| bytes),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(bytes) => {
                info!(
                    "{kind} {year}: retrieved {} bytes from {url} (attempt {})",
                    bytes.len(),
                    attempt + 1
                );
                return Ok(FetchedDocument {
                    url: url.clone(),
                    bytes,
                });
            }
            Err(e) => {
                debug!("{kind} {year}: candidate {} rejected: {e}", attempt + 1);
                last_error = e.to_string();
            }
        }
    }

    warn!("{kind} {year}: all {} candidate URLs failed", urls.len());
    Err(EnrollmentError::DocumentUnavailable {
        year,
        kind,
        attempts: urls.len(),
        last_error,
    })
}
