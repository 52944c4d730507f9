//! Streaming multi-year API: emit each year as it completes.
//!
//! Unlike the eager [`crate::fetch::fetch_enr_multi`], which returns only
//! after every year finishes, [`fetch_enr_stream`] yields a [`YearResult`]
//! per year. Years are processed one at a time, in request order.

use crate::config::PipelineConfig;
use crate::error::EnrollmentError;
use crate::fetch::{validate_years, EnrollmentClient};
use crate::output::EnrollmentOutput;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// One streamed year: the requested year and its outcome.
pub type YearResult = (u16, Result<EnrollmentOutput, EnrollmentError>);

/// A boxed stream of per-year results.
pub type YearStream = Pin<Box<dyn Stream<Item = YearResult> + Send>>;

/// Fetch several years, streaming each as it is ready.
///
/// # Returns
/// - `Ok(YearStream)`: one item per requested year, in request order
/// - `Err(EnrollmentError)`: no years requested or an unsupported year
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use wvenroll::{fetch_enr_stream, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::new()?;
/// let mut years = fetch_enr_stream(vec![2022, 2023], &config)?;
/// while let Some((year, result)) = years.next().await {
///     match result {
///         Ok(out) => println!("{year}: {} rows", out.data.len()),
///         Err(e) => eprintln!("{year}: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn fetch_enr_stream(
    years: Vec<u16>,
    config: &PipelineConfig,
) -> Result<YearStream, EnrollmentError> {
    validate_years(config, &years)?;
    let client = EnrollmentClient::new(config.clone())?;
    Ok(stream_years(Arc::new(client), years))
}

/// Stream years through an existing client.
pub fn stream_years(client: Arc<EnrollmentClient>, years: Vec<u16>) -> YearStream {
    let total = years.len();
    info!("Streaming {total} years");

    let s = stream::iter(years.into_iter().enumerate()).then(move |(i, year)| {
        let client = Arc::clone(&client);
        async move {
            let cb = client.config().progress_callback.clone();
            if let Some(cb) = &cb {
                cb.on_year_start(year, i + 1, total);
            }
            let result = client.fetch_year(year).await;
            if let Some(cb) = &cb {
                match &result {
                    Ok(out) => cb.on_year_complete(year, i + 1, total, out.data.len()),
                    Err(e) => cb.on_year_error(year, i + 1, total, &e.to_string()),
                }
            }
            (year, result)
        }
    });

    Box::pin(s)
}
