//! CLI binary for admission-tables.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs a batch and writes the merged JSON.

use anyhow::{Context, Result};
use admission_tables::{
    extract_batch, write_json, BatchOutput, DocumentKind, ExtractionConfig,
    ExtractionProgressCallback, ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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

/// Terminal progress callback: one bar for the batch plus a log line per
/// document. Documents finish out of order, so start times are keyed by
/// batch position.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} documents  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, source: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, source: &str, records: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index,
            total,
            source,
            dim(&format!("{records:>6} records")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, source: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, records: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} documents, {} records",
                green("✔"),
                bold(&total_documents.to_string()),
                bold(&records.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents extracted, {} records  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                total_documents - failed,
                total_documents,
                bold(&records.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Option-entry PDF to stdout
  admit-extract options.pdf

  # Several cutoff workbooks for one round, merged into one file
  admit-extract --year 2024 --round "Round 1" r1_*.xlsx -o cutoffs_2024_r1.json

  # Force the layout when the extension is misleading
  admit-extract --kind cutoffs export.bin

  # Custom vocabulary (institute-code pattern, categories, cities)
  admit-extract --config kcet.toml cutoffs.xlsx -o out.json

  # Counters only
  admit-extract --summary-only *.pdf

ENVIRONMENT VARIABLES:
  ADMIT_*            Every flag has an ADMIT_<FLAG> fallback (e.g. ADMIT_YEAR)
  PDFIUM_LIB_PATH    Path to an existing libpdfium
  RUST_LOG           Overrides the log filter (e.g. admission_tables=debug)
"#;

/// Extract admission preference lists and cutoff-rank tables to JSON.
#[derive(Parser, Debug)]
#[command(
    name = "admit-extract",
    version,
    about = "Extract admission preference lists (PDF) and cutoff-rank tables (spreadsheets) to JSON",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or spreadsheet files (.pdf, .xlsx, .xlsm, .xlsb, .xls, .ods).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Table layout: auto (by extension), preferences, cutoffs.
    #[arg(long, env = "ADMIT_KIND", value_enum, default_value = "auto")]
    kind: KindArg,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "ADMIT_OUTPUT")]
    output: Option<PathBuf>,

    /// TOML file with [vocabulary], [thresholds] and [session] tables.
    #[arg(long, env = "ADMIT_CONFIG")]
    config: Option<PathBuf>,

    /// Admission year stamped onto cutoff entries.
    #[arg(long, env = "ADMIT_YEAR")]
    year: Option<u16>,

    /// Counselling round stamped onto cutoff entries.
    #[arg(long, env = "ADMIT_ROUND")]
    round: Option<String>,

    /// Number of documents extracted at once.
    #[arg(short, long, env = "ADMIT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ADMIT_PASSWORD")]
    password: Option<String>,

    /// Emit only the run summary and per-document report, no records.
    #[arg(long, env = "ADMIT_SUMMARY_ONLY")]
    summary_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "ADMIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ADMIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ADMIT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Auto,
    Preferences,
    Cutoffs,
}

impl KindArg {
    fn document_kind(self) -> Option<DocumentKind> {
        match self {
            KindArg::Auto => None,
            KindArg::Preferences => Some(DocumentKind::Preferences),
            KindArg::Cutoffs => Some(DocumentKind::Cutoffs),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryOnly<'a> {
    summary: &'a admission_tables::RunSummary,
    documents: &'a [admission_tables::DocumentReport],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run batch ────────────────────────────────────────────────────────
    let output = extract_batch(&cli.inputs, cli.kind.document_kind(), &config)
        .await
        .context("Extraction failed")?;

    // ── Write result ─────────────────────────────────────────────────────
    if let Some(ref path) = cli.output {
        let written = if cli.summary_only {
            write_json(&summary_view(&output), path).await
        } else {
            write_json(&output, path).await
        };
        written.context("Failed to write output")?;
    } else {
        let json = if cli.summary_only {
            serde_json::to_string_pretty(&summary_view(&output))
        } else {
            serde_json::to_string_pretty(&output)
        }
        .context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let s = &output.summary;
        eprintln!(
            "{}  {} records  {} institutes  {}{}",
            if s.errors.is_empty() { green("✔") } else { cyan("⚠") },
            output.record_count(),
            s.institutes_found,
            dim(&format!(
                "filtered {}  ambiguous {}  errors {}",
                s.filtered,
                s.ambiguous_tokens,
                s.errors.len()
            )),
            cli.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
        if !show_progress {
            for e in &s.errors {
                eprintln!("   {} {}", red("•"), e);
            }
        }
    }

    Ok(())
}

fn summary_view(output: &BatchOutput) -> SummaryOnly<'_> {
    SummaryOnly {
        summary: &output.summary,
        documents: &output.documents,
    }
}

/// Map CLI args to `ExtractionConfig`. Flags override the config file.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let base = match cli.config {
        Some(ref path) => ExtractionConfig::load_toml(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ExtractionConfig::default(),
    };

    let mut builder = base.into_builder();
    if let Some(year) = cli.year {
        builder = builder.year(year);
    }
    if let Some(ref round) = cli.round {
        builder = builder.round(round.clone());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
