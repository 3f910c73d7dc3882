//! CLI binary for drive-convert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the converted file.

use anyhow::{Context, Result};
use clap::Parser;
use drive_convert::{
    convert_to_file, output_path_for, ByteRange, ConversionConfig, ConversionStats,
    ProgressCallback, TargetFormat, TransferMode, TransferProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Terminal progress callback: a byte-based bar during upload, a spinner
/// while the service renders and the result downloads.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Authenticating…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Stop the spinner; safe to call after the bar already finished.
    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn activate_bar(&self, total: u64) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Uploading");
        self.bar.reset_eta();
    }
}

impl TransferProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, artifact: &str, total_bytes: u64, mode: TransferMode) {
        self.activate_bar(total_bytes);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Uploading {total_bytes} bytes as {artifact} ({mode})"))
        ));
    }

    fn on_chunk_sent(&self, index: usize, total_chunks: usize, range: &ByteRange) {
        self.bar.set_message(format!("chunk {index}/{total_chunks}"));
        self.bar.set_position(range.end + 1);
    }

    fn on_upload_complete(&self, total_bytes: u64) {
        self.bar.set_position(total_bytes);
        self.bar.println(format!("  {} upload accepted", green("✓")));
        self.bar.set_prefix("Converting");
        self.bar.set_message("waiting for rendition…");
    }

    fn on_download_complete(&self, format: &str, bytes: u64) {
        self.bar.println(format!(
            "  {} {} rendition received  {}",
            green("✓"),
            format,
            dim(&format!("{bytes} bytes"))
        ));
        self.bar.set_prefix("Cleaning up");
        self.bar.set_message("deleting remote file…");
    }

    fn on_remote_deleted(&self, _artifact: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a Word document to PDF next to the source
  drive-convert report.docx

  # Choose the output path
  drive-convert report.docx -o out/report.pdf

  # Other renditions
  drive-convert --format html notes.docx
  drive-convert --format jpg slides.pptx

  # Force an upload session even for a small file
  drive-convert --size-hint 5000000 small.docx

ENVIRONMENT VARIABLES:
  DRIVE_CONVERT_CLIENT_ID      Application (client) id
  DRIVE_CONVERT_CLIENT_SECRET  Client secret
  DRIVE_CONVERT_TENANT         Directory tenant id or domain
  DRIVE_CONVERT_AUTH_URL       Full token endpoint (overrides the tenant)
  DRIVE_CONVERT_DRIVE_URL      Drive root, default https://graph.microsoft.com/v1.0/drive/root:
  DRIVE_CONVERT_LOG_DIR        Directory of the daily log file (default: logs)
  RUST_LOG                     Log filter (overrides --verbose / --quiet)
"#;

/// Convert documents to PDF (or HTML/JPG/GLB) through a cloud drive.
#[derive(Parser, Debug)]
#[command(
    name = "drive-convert",
    version,
    about = "Convert documents through a cloud drive's rendition API",
    long_about = "Upload a document to a temporary location in a cloud drive, download the \
drive's converted rendition (PDF by default), and delete the temporary file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document to convert.
    input: PathBuf,

    /// Write the result here instead of next to the input.
    #[arg(short, long, env = "DRIVE_CONVERT_OUTPUT")]
    output: Option<PathBuf>,

    /// Rendition format: pdf, html, jpg, glb.
    #[arg(short, long, env = "DRIVE_CONVERT_FORMAT", default_value = "pdf")]
    format: TargetFormat,

    /// Application (client) id.
    #[arg(long, env = "DRIVE_CONVERT_CLIENT_ID", hide_env_values = true)]
    client_id: String,

    /// Client secret.
    #[arg(long, env = "DRIVE_CONVERT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Directory tenant id or domain.
    #[arg(long, env = "DRIVE_CONVERT_TENANT", required_unless_present = "auth_url")]
    tenant: Option<String>,

    /// Token endpoint; overrides --tenant.
    #[arg(long, env = "DRIVE_CONVERT_AUTH_URL")]
    auth_url: Option<String>,

    /// Drive root URL that temporary files are created under.
    #[arg(long, env = "DRIVE_CONVERT_DRIVE_URL")]
    drive_url: Option<String>,

    /// Declared size in bytes; above 4 MiB forces a chunked upload.
    #[arg(long, default_value_t = 0)]
    size_hint: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DRIVE_CONVERT_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "DRIVE_CONVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DRIVE_CONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DRIVE_CONVERT_QUIET")]
    quiet: bool,

    /// Directory for the log file, rolled over daily.
    #[arg(long, env = "DRIVE_CONVERT_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Do not write a log file.
    #[arg(long, env = "DRIVE_CONVERT_NO_LOG_FILE")]
    no_log_file: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        );

    // The file keeps the full lifecycle even when the terminal shows only errors.
    let file = if cli.no_log_file {
        None
    } else {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("drive-convert")
            .filename_suffix("log")
            .build(&cli.log_dir)
            .with_context(|| format!("Failed to open log directory {}", cli.log_dir.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender)
                .with_filter(EnvFilter::new(if cli.verbose { "debug" } else { "info" })),
        )
    };

    tracing_subscriber::registry().with(console).with(file).init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = progress
        .clone()
        .map(|p| p as Arc<dyn TransferProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(&cli.input, cli.format));

    let result = run(&cli, &config, &output_path).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let (written, stats) = result?;

    if !cli.quiet {
        eprintln!(
            "{}  {} → {}  {}ms  →  {}",
            if stats.remote_deleted {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.uploaded_bytes,
            stats.downloaded_bytes,
            stats.total_duration_ms,
            bold(&written.display().to_string()),
        );
        eprintln!(
            "   {} upload, {} request(s)",
            dim(&stats.mode.to_string()),
            dim(&stats.upload_requests.to_string()),
        );
        if !stats.remote_deleted {
            eprintln!(
                "   {} temporary file {} could not be deleted",
                cyan("⚠"),
                stats.artifact
            );
        }
    }

    Ok(())
}

async fn run(
    cli: &Cli,
    config: &ConversionConfig,
    output_path: &Path,
) -> Result<(PathBuf, ConversionStats)> {
    if cli.size_hint > 0 {
        let input = drive_convert::open_source(&cli.input)
            .await
            .context("Failed to open input")?
            .with_size_hint(cli.size_hint);
        let output = drive_convert::convert(input, config)
            .await
            .context("Conversion failed")?;
        let written =
            drive_convert::write_output(output_path, &output.bytes).context("Failed to write output")?;
        Ok((written, output.stats))
    } else {
        convert_to_file(&cli.input, Some(output_path), config)
            .await
            .context("Conversion failed")
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .client_id(&cli.client_id)
        .client_secret(&cli.client_secret)
        .target_format(cli.format)
        .request_timeout_secs(cli.timeout);

    builder = match (&cli.auth_url, &cli.tenant) {
        (Some(url), _) => builder.auth_url(url),
        (None, Some(tenant)) => builder.tenant(tenant),
        (None, None) => builder,
    };
    if let Some(ref url) = cli.drive_url {
        builder = builder.drive_base_url(url);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
