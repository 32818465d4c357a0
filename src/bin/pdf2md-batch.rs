//! CLI binary for edgequake-pdf-batch.
//!
//! A thin presentation layer over [`ConversionSession`]: loads the inputs,
//! maps CLI flags to `BatchConfig`, runs one conversion and prints or
//! writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf_batch::pipeline::input::{is_url, load_files};
use edgequake_pdf_batch::{
    write_results, BatchConfig, ConversionMode, ConversionProgressCallback, ConversionResult,
    ConversionSession, DocumentSeparator, ProgressCallback, RunReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a progress bar over the pending files plus one log line per
/// extracted, skipped or converted file.
struct CliProgressCallback {
    bar: ProgressBar,
    individual: AtomicBool,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Loading files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            individual: AtomicBool::new(false),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize, mode: ConversionMode) {
        self.individual
            .store(mode == ConversionMode::Individual, Ordering::SeqCst);
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting {mode} conversion of {total_files} files…"))
        ));
    }

    fn on_status(&self, status: String) {
        self.bar.set_message(status);
    }

    fn on_file_extracted(&self, name: String, index: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{chars} chars")),
        ));
        // In individual mode the file is done only once it is converted.
        if !self.individual.load(Ordering::SeqCst) {
            self.bar.inc(1);
        }
    }

    fn on_file_skipped(&self, name: String, reason: String) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            name,
            red(&truncate(&reason, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_result(&self, result: ConversionResult) {
        if self.individual.load(Ordering::SeqCst) {
            self.bar.println(format!(
                "  {} {}  {}",
                green("→"),
                result.label,
                dim(&format!("{} chars of Markdown", result.markdown.len())),
            ));
            self.bar.inc(1);
        }
    }

    fn on_run_complete(&self, converted: usize, total_files: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);

        if converted == total_files {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} skipped)",
                if converted == 0 { red("✘") } else { cyan("⚠") },
                bold(&converted.to_string()),
                total_files,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge several PDFs into one Markdown document (stdout)
  pdf2md-batch a.pdf b.pdf c.pdf

  # One Markdown file per input, written to ./out
  pdf2md-batch --mode individual -o out/ *.pdf

  # Mix local files, text notes and URLs
  pdf2md-batch notes.txt https://arxiv.org/pdf/1706.03762 report.pdf

  # Name each document in the combined text
  pdf2md-batch --separator comment a.pdf b.pdf -o out/

  # JSON report (results, per-file outcomes, stats)
  pdf2md-batch --json --mode individual a.pdf b.pdf > report.json

MODES:
  combined     Extract every file, join the texts with <hr />, convert once.
               Files without text are skipped; the conversion itself is
               all-or-nothing. Output: combined.md
  individual   Extract and convert each file in order. A file that fails
               at either step is skipped and the run continues.
               Output: <file stem>.md per converted file

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  PDFium (~30 MB) is downloaded automatically the first time a PDF is
  converted and cached for later runs.
"#;

/// Convert a batch of PDF and text files to Markdown using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-batch",
    version,
    about = "Convert a batch of PDF and text files to Markdown using LLMs",
    long_about = "Extract text from several documents (local files or URLs) and convert it to \
clean Markdown with a Large Language Model, either as one combined document or one result per \
file. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible \
endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs. Duplicate names are ignored.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Conversion mode.
    #[arg(short, long, env = "PDF2MD_BATCH_MODE", value_enum, default_value = "combined")]
    mode: ModeArg,

    /// Write one Markdown file per result into this directory instead of stdout.
    #[arg(short, long, env = "PDF2MD_BATCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Number of files extracted concurrently in combined mode.
    #[arg(short, long, env = "PDF2MD_BATCH_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Document separator in combined mode: hr, comment, or a custom string.
    #[arg(long, env = "PDF2MD_BATCH_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Label of the combined result.
    #[arg(long, env = "PDF2MD_BATCH_LABEL", default_value = "Combined Output")]
    label: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_BATCH_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2MD_BATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per conversion.
    #[arg(long, env = "PDF2MD_BATCH_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2MD_BATCH_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per conversion on LLM failure.
    #[arg(long, env = "PDF2MD_BATCH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2MD_BATCH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2MD_BATCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the JSON run report instead of Markdown.
    #[arg(long, env = "PDF2MD_BATCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_BATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_BATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_BATCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Combined,
    Individual,
}

impl From<ModeArg> for ConversionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Combined => ConversionMode::Combined,
            ModeArg::Individual => ConversionMode::Individual,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Ensure PDFium engine is available ───────────────────────────────────
    // Only when a PDF may be involved; URLs are assumed to be PDFs.
    let may_need_pdfium = cli
        .inputs
        .iter()
        .any(|i| is_url(i) || i.to_lowercase().ends_with(".pdf"));
    if may_need_pdfium && !pdfium_auto::is_pdfium_cached() {
        ensure_pdfium(cli.quiet)?;
    }

    // ── Build config and session ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let mut session =
        ConversionSession::from_config(config.clone()).context("Failed to set up the LLM provider")?;

    let loaded = load_files(&cli.inputs, config.download_timeout_secs).await;
    if !cli.quiet {
        for failure in &loaded.failures {
            eprintln!(
                "{} {}: {}",
                red("✗"),
                failure.input,
                failure.error.user_message()
            );
        }
    }
    let files = loaded.into_files().context("Failed to load inputs")?;
    let loaded_count = files.len();
    let added = session.add_files(files);
    if added < loaded_count && !cli.quiet {
        eprintln!(
            "{} {} duplicate file names ignored",
            cyan("⚠"),
            loaded_count - added
        );
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let mode: ConversionMode = cli.mode.into();
    let report = session.run(mode).await.context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if let Some(ref dir) = cli.output_dir {
        let written = write_results(&report, dir)
            .await
            .context("Failed to write results")?;
        if !cli.quiet {
            for path in &written {
                eprintln!("  {}  {}", green("→"), bold(&path.display().to_string()));
            }
        }
    } else {
        print_results(&report).context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        print_summary(&report, show_progress);
    }

    Ok(())
}

/// Download pdfium on first use, with a byte-level progress bar.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Print results to stdout. Multiple results are preceded by their label.
fn print_results(report: &RunReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let many = report.results.len() > 1;

    for (i, result) in report.results.iter().enumerate() {
        if i > 0 {
            handle.write_all(b"\n")?;
        }
        if many {
            writeln!(handle, "<!-- {} -->", result.label)?;
        }
        handle.write_all(result.markdown.as_bytes())?;
        if !result.markdown.ends_with('\n') {
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport, show_progress: bool) {
    let stats = &report.stats;
    if !show_progress {
        // The progress callback already printed skips and the tick line.
        eprintln!(
            "Converted {}/{} files in {}ms",
            stats.converted_files, stats.total_files, stats.total_duration_ms
        );
        for err in report.file_errors() {
            eprintln!("  skipped: {err}");
        }
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {}ms total",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
    );
}

/// Map CLI args to `BatchConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .concurrency(cli.concurrency)
        .separator(parse_separator(&cli.separator))
        .combined_label(cli.label.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `DocumentSeparator`.
fn parse_separator(s: &str) -> DocumentSeparator {
    match s.to_lowercase().as_str() {
        "hr" | "---" => DocumentSeparator::HorizontalRule,
        "comment" => DocumentSeparator::Comment,
        _ => DocumentSeparator::Custom(s.to_string()),
    }
}
