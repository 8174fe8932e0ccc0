//! CLI binary for certquote.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `QuoteRequest` and `QuoteConfig` and prints the quote.

use anyhow::{Context, Result};
use clap::Parser;
use certquote::display::{render_analysis_table, render_quote};
use certquote::intake::{dedupe_files, generate_quote_id};
use certquote::pipeline::input::resolve_input;
use certquote::quote::write_quote_json;
use certquote::storage::unique_object_paths;
use certquote::{
    payment, prepare_quote, Customer, InMemoryJobStore, JobStore, OcrBackend, ProgressCallback,
    QuoteConfig, QuoteProgressCallback, QuoteRequest, RateTable, StorageClient, StorageConfig,
    UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per file. Files finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading files…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl QuoteProgressCallback for CliProgressCallback {
    fn on_quote_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Quoting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Counting words in {total_files} files…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, name: &str, pages: u32) {
        let secs = self.elapsed(index);
        self.bar.println(format!(
            "  {} File {:>2}/{:<2}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{pages:>3} pages")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed(index);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} File {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_quote_complete(&self, total_files: usize, priced_files: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(priced_files);
        if failed == 0 {
            eprintln!(
                "{} {} files priced",
                green("✔"),
                bold(&priced_files.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files priced  ({} not included)",
                cyan("⚠"),
                bold(&priced_files.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Quote two scans for a USCIS submission
  certquote --name "Ana Pérez" --email ana@example.com \
    --source es --target en --intended-use USCIS acta.pdf pasaporte.jpg

  # Quote a file already in storage (signed URL)
  certquote --name Ana --email ana@example.com --source ja --target en \
    --intended-use Court "https://abcd.supabase.co/storage/v1/object/sign/orders/CS00001/koseki.pdf?token=…"

  # Word counts only, no LLM call (every page priced at Medium)
  certquote --skip-analysis ... scan.png

  # JSON output, custom rate table, checkout link
  certquote --json --rates rates.json --checkout-url https://pay.example.com/checkout ...

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY                   Google Vision OCR and Gemini analysis
  GEMINI_API_KEY                   Gemini analysis and large-file uploads (over GOOGLE_API_KEY)
  GEMINI_MODEL                     Override the analysis model
  GOOGLE_CLOUD_PROJECT_ID          Document AI project
  GOOGLE_DOCUMENT_AI_PROCESSOR_ID  Document AI processor
  GOOGLE_DOCUMENT_AI_LOCATION      Document AI location (default: us)
  GOOGLE_ACCESS_TOKEN              Bearer token for Document AI
  SUPABASE_URL                     Storage project URL (for --upload)
  SUPABASE_SERVICE_ROLE_KEY        Storage service key (for --upload)
  ORDERS_BUCKET                    Storage bucket (default: orders)
"#;

/// Prepare a certified-translation quote from documents.
#[derive(Parser, Debug)]
#[command(
    name = "certquote",
    version,
    about = "Prepare certified-translation quotes from scanned documents",
    long_about = "Count the words on every page of the uploaded documents (Google Vision or \
Document AI), rate each page's complexity with a multimodal LLM, and price the translation \
from a tiered rate table plus a certification fee.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local files or HTTP/HTTPS URLs (PDF, DOC/DOCX, XLSX, PNG, JPEG).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Customer full name.
    #[arg(long, env = "CERTQUOTE_NAME")]
    name: String,

    /// Customer email.
    #[arg(long, env = "CERTQUOTE_EMAIL")]
    email: String,

    /// Customer phone.
    #[arg(long, env = "CERTQUOTE_PHONE")]
    phone: Option<String>,

    /// Source language (name or ISO-639-1 code).
    #[arg(long, env = "CERTQUOTE_SOURCE")]
    source: String,

    /// Target language (name or ISO-639-1 code).
    #[arg(long, env = "CERTQUOTE_TARGET")]
    target: String,

    /// Intended use, e.g. USCIS or Court. Picks the certification type.
    #[arg(long, env = "CERTQUOTE_INTENDED_USE")]
    intended_use: String,

    /// Reuse an existing quote id instead of generating one.
    #[arg(long, env = "CERTQUOTE_QUOTE_ID")]
    quote_id: Option<String>,

    /// OCR backend.
    #[arg(long, env = "CERTQUOTE_OCR", value_enum, default_value = "vision")]
    ocr: OcrArg,

    /// LLM provider for complexity analysis.
    #[arg(long, env = "CERTQUOTE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "CERTQUOTE_MODEL")]
    model: Option<String>,

    /// Files processed at once.
    #[arg(short, long, env = "CERTQUOTE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Rate table JSON file (base rate, words per page, tiers, certifications).
    #[arg(long, env = "CERTQUOTE_RATES")]
    rates: Option<PathBuf>,

    /// Skip LLM analysis; every page is priced at Medium complexity.
    #[arg(long, env = "CERTQUOTE_SKIP_ANALYSIS")]
    skip_analysis: bool,

    /// Retries per file on LLM failure.
    #[arg(long, env = "CERTQUOTE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Also print the per-page analysis table.
    #[arg(long)]
    show_analysis: bool,

    /// Upload the files to the orders bucket under `<quoteId>/` first.
    #[arg(long, env = "CERTQUOTE_UPLOAD")]
    upload: bool,

    /// Checkout base URL; prints a payment link carrying the quote id.
    #[arg(long, env = "CERTQUOTE_CHECKOUT_URL")]
    checkout_url: Option<String>,

    /// Output the full quote as JSON instead of tables.
    #[arg(long, env = "CERTQUOTE_JSON")]
    json: bool,

    /// Also write the quote JSON to this file.
    #[arg(short, long, env = "CERTQUOTE_OUTPUT")]
    output: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "CERTQUOTE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CERTQUOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the quote.
    #[arg(short, long, env = "CERTQUOTE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CERTQUOTE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call OCR / LLM timeout in seconds.
    #[arg(long, env = "CERTQUOTE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    Vision,
    DocumentAi,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Vision => OcrBackend::GoogleVision,
            OcrArg::DocumentAi => OcrBackend::DocumentAi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn QuoteProgressCallback>)
    } else {
        None
    };
    let store = Arc::new(InMemoryJobStore::new());
    let config = build_config(&cli, progress_cb, store.clone())?;

    // ── Read inputs ──────────────────────────────────────────────────────
    let mut files = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let file = resolve_input(input, &config)
            .await
            .with_context(|| format!("Failed to read {input}"))?;
        files.push(file);
    }
    let files = dedupe_files(files);

    let quote_id = cli
        .quote_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_quote_id);

    if cli.upload {
        upload_files(&quote_id, &files, cli.api_timeout, cli.quiet).await?;
    }

    let request = QuoteRequest {
        quote_id: Some(quote_id),
        customer: Customer {
            name: cli.name.clone(),
            email: cli.email.clone(),
            phone: cli.phone.clone(),
        },
        source_language: cli.source.clone(),
        target_language: cli.target.clone(),
        intended_use: cli.intended_use.clone(),
        files,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let output = prepare_quote(request, &config)
        .await
        .context("Quote preparation failed")?;

    if let Some(ref path) = cli.output {
        write_quote_json(&output, path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise quote")?;
        println!("{json}");
    } else {
        print!("{}", render_quote(&output));
        if cli.show_analysis {
            println!();
            print!("{}", render_analysis_table(&output));
        }
    }

    if let Some(ref base) = cli.checkout_url {
        let link = payment::checkout_url(base, &output.quote_id)
            .context("Invalid checkout URL")?;
        if cli.json {
            eprintln!("Checkout: {link}");
        } else {
            println!();
            println!("Pay online: {}", bold(&link));
        }
    }

    if !cli.quiet && !cli.json {
        if let Some(ref job_id) = output.job_id {
            let events = store
                .snapshot(job_id)
                .await
                .map(|s| s.events.len())
                .unwrap_or(0);
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {} job events  —  {}ms total",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
                events,
                output.stats.duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `QuoteConfig`, starting from the environment.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    store: Arc<InMemoryJobStore>,
) -> Result<QuoteConfig> {
    let mut builder = QuoteConfig::from_env()
        .concurrency(cli.concurrency)
        .ocr_backend(cli.ocr.clone().into())
        .skip_analysis(cli.skip_analysis)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .job_store(store as Arc<dyn JobStore>);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref path) = cli.rates {
        let rates = RateTable::from_json_file(path)
            .with_context(|| format!("Failed to load rate table from {}", path.display()))?;
        builder = builder.rates(rates);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Put every file in the orders bucket under `<quoteId>/`, using the same
/// object keys the quote will report.
async fn upload_files(
    quote_id: &str,
    files: &[UploadedFile],
    timeout_secs: u64,
    quiet: bool,
) -> Result<()> {
    let storage = StorageConfig::from_env().context("Storage is not configured")?;
    let client = StorageClient::new(storage, Duration::from_secs(timeout_secs))?;
    let paths = unique_object_paths(quote_id, files.iter().map(|f| f.name.as_str()));
    for (file, path) in files.iter().zip(paths) {
        let signed = client
            .sign_upload(&path)
            .await
            .with_context(|| format!("Failed to sign upload for {path}"))?;
        client
            .upload(&signed, file.bytes.clone(), &file.mime_type)
            .await
            .with_context(|| format!("Failed to upload {}", file.name))?;
        if !quiet {
            eprintln!("{} {}", green("↑"), dim(&signed.source_uri));
        }
    }
    Ok(())
}
