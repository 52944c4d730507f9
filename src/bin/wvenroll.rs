//! CLI binary for wvenroll.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and writes the results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use wvenroll::reference::describe_years;
use wvenroll::{
    cache_status, clear_cache, encode_outputs, BatchProgressCallback, EnrollmentClient,
    OutputFormat, OutputShape, PipelineConfig, ProgressCallback, ReferenceData,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the requested years and a log
/// line per finished year.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<u16, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:30.green/238}] {pos:>2}/{len} years  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, year: u16) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&year)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_years: usize) {
        self.bar.set_length(total_years as u64);
        self.bar.reset_eta();
    }

    fn on_year_start(&self, year: u16, _index: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(year, Instant::now());
        self.bar.set_message(format!("school year ending {year}"));
    }

    fn on_year_complete(&self, year: u16, _index: usize, _total: usize, rows: usize) {
        let secs = self.elapsed_secs(year);
        self.bar.println(format!(
            "  {} {}  {:<10}  {}",
            green("✓"),
            year,
            dim(&format!("{rows:>5} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_year_error(&self, year: u16, _index: usize, _total: usize, error: &str) {
        let secs = self.elapsed_secs(year);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            year,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_years: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} years fetched successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} years fetched  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_years,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One school year (2023-24) as tidy CSV on stdout
  wvenroll fetch 2024

  # A range of years to a file
  wvenroll fetch 2019-2023 -o wv_enrollment.csv

  # Wide records, JSON with warnings and stats
  wvenroll fetch 2022 2023 --wide --format json -o enr.json

  # Published years
  wvenroll years

  # Inspect or clear the parsed-result cache
  wvenroll cache status
  wvenroll cache clear --year 2023

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH          Path to libpdfium (otherwise the system library is used)
  WVENROLL_CACHE_DIR       Override the cache directory
  WVENROLL_REFERENCE       Reference-data JSON to use instead of the built-in copy
  RUST_LOG                 Tracing filter, overrides --verbose/--quiet
"#;

/// West Virginia county school enrollment from the state's PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "wvenroll",
    version,
    about = "West Virginia county school enrollment from the state's PDF reports",
    long_about = "Download the West Virginia Department of Education enrollment reports for one \
or more school years, extract county enrollment by grade, reconcile it with the headcount \
report and write a tidy (or wide) dataset with a state total row.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "WVENROLL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "WVENROLL_QUIET")]
    quiet: bool,

    /// Cache directory for parsed years.
    #[arg(long, global = true, env = "WVENROLL_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Reference-data JSON (county codes, years, URLs).
    #[arg(long, global = true, env = "WVENROLL_REFERENCE")]
    reference: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one or more school years (by end year, e.g. 2024 for 2023-24).
    Fetch(FetchArgs),

    /// List the school years the agency has published.
    Years,

    /// Inspect or clear the cache of parsed years.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Years or ranges: 2024, 2019-2023.
    #[arg(required = true, num_args = 1..)]
    years: Vec<String>,

    /// Write to this file instead of stdout.
    #[arg(short, long, env = "WVENROLL_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format. Defaults to the output file's extension, else csv.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// One record per district with grade columns instead of tidy rows.
    #[arg(long)]
    wide: bool,

    /// Neither read nor write the cache.
    #[arg(long, env = "WVENROLL_NO_CACHE")]
    no_cache: bool,

    /// Disable progress bar.
    #[arg(long, env = "WVENROLL_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds, per attempt.
    #[arg(long, env = "WVENROLL_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List cached years.
    Status,
    /// Remove cached years.
    Clear {
        /// Only remove entries for this year.
        #[arg(long)]
        year: Option<u16>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for a fetch.
    let show_progress = match &cli.command {
        Command::Fetch(args) => !cli.quiet && !args.no_progress,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Fetch(args) => run_fetch(&cli, args, show_progress).await,
        Command::Years => {
            let config = build_config(&cli, None, None)?;
            let years = config.reference.available_years();
            if cli.quiet {
                for year in years {
                    println!("{year}");
                }
            } else {
                println!("{}", describe_years(&years));
            }
            Ok(())
        }
        Command::Cache { action } => {
            let config = build_config(&cli, None, None)?;
            run_cache(&config, action, cli.quiet)
        }
    }
}

async fn run_fetch(cli: &Cli, args: &FetchArgs, show_progress: bool) -> Result<()> {
    let years = parse_years(&args.years)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, Some(args), progress_cb)?;

    let format = args
        .format
        .map(OutputFormat::from)
        .or_else(|| args.output.as_deref().map(OutputFormat::from_path))
        .unwrap_or_default();

    let client = EnrollmentClient::new(config).context("Failed to set up HTTP client")?;
    let batch = client.fetch_years(&years).await.context("Fetch failed")?;

    if !cli.quiet {
        for output in &batch.years {
            for warning in &output.warnings {
                eprintln!("{} {}", cyan("⚠"), warning);
            }
        }
        if !show_progress {
            for failed in &batch.failed_years {
                eprintln!("{} {}: {}", red("✗"), failed.end_year, failed.error);
            }
        }
    }

    let bytes = encode_outputs(&batch.years, format).context("Failed to encode output")?;

    if let Some(ref path) = args.output {
        wvenroll::fetch::write_atomic(path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            let rows: usize = batch.years.iter().map(|o| o.data.len()).sum();
            eprintln!(
                "{}  {} years  {} rows  →  {}",
                if batch.failed_years.is_empty() { green("✔") } else { cyan("⚠") },
                batch.years.len(),
                rows,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&bytes)
            .context("Failed to write to stdout")?;
        if !bytes.ends_with(b"\n") {
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

fn run_cache(config: &PipelineConfig, action: &CacheAction, quiet: bool) -> Result<()> {
    let dir = config.resolved_cache_dir();
    match action {
        CacheAction::Status => {
            let entries = cache_status(config).context("Failed to read cache")?;
            if !quiet {
                eprintln!("{} {}", dim("cache:"), dir.display());
            }
            if entries.is_empty() {
                println!("(empty)");
            }
            for entry in entries {
                println!(
                    "{}  {:<12}  {:<5}  {:>9} bytes",
                    entry.key.year,
                    entry.key.kind.as_str(),
                    entry.key.shape.as_str(),
                    entry.bytes
                );
            }
        }
        CacheAction::Clear { year } => {
            let removed = clear_cache(config, *year).context("Failed to clear cache")?;
            if !quiet {
                eprintln!("{} removed {removed} entries from {}", green("✔"), dir.display());
            }
        }
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    cli: &Cli,
    fetch: Option<&FetchArgs>,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder();

    if let Some(ref path) = cli.reference {
        let reference = ReferenceData::from_path(path)
            .with_context(|| format!("Failed to load reference data from {}", path.display()))?;
        builder = builder.reference(Arc::new(reference));
    }
    if let Some(ref dir) = cli.cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(args) = fetch {
        builder = builder
            .use_cache(!args.no_cache)
            .download_timeout_secs(args.download_timeout)
            .output_shape(if args.wide {
                OutputShape::Wide
            } else {
                OutputShape::Tidy
            });
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `2024`, `2019-2023` and lists of both into ascending unique years.
fn parse_years(args: &[String]) -> Result<Vec<u16>> {
    let mut years = Vec::new();

    for arg in args.iter().flat_map(|a| a.split(',')) {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }

        if let Some((start, end)) = arg.split_once('-') {
            let start: u16 = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid start year in range '{arg}'"))?;
            let end: u16 = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid end year in range '{arg}'"))?;
            if start > end {
                anyhow::bail!("Invalid year range '{arg}': start must be <= end");
            }
            years.extend(start..=end);
        } else {
            let year: u16 = arg
                .parse()
                .with_context(|| format!("Invalid year: '{arg}'"))?;
            years.push(year);
        }
    }

    if years.is_empty() {
        anyhow::bail!("No years given");
    }
    years.sort_unstable();
    years.dedup();
    Ok(years)
}
