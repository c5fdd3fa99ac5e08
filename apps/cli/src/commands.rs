//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use cmsextract_core::{
    BatchItem, BatchReport, PageReport, Pipeline, ProgressReporter, bundle_page, run_batch,
    verify_page,
};
use cmsextract_fetcher::SourceInput;
use cmsextract_shared::{AppConfig, CmsExtractError, PipelineConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// cmsextract: turn web pages into CMS-ready JSON models.
#[derive(Parser)]
#[command(
    name = "cmsextract",
    version,
    about = "Extract page metadata and content blocks into CMS page and model JSON.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract one or more pages into page and model JSON files.
    Extract {
        /// URLs or local HTML files.
        sources: Vec<String>,

        /// Text file with one source per line (`#` starts a comment).
        #[arg(long)]
        list: Option<PathBuf>,

        /// ZIP archive whose .html/.htm entries are each extracted.
        #[arg(long)]
        zip: Option<PathBuf>,

        /// Output root (defaults to `defaults.output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Classify with the fallback rule only.
        #[arg(long)]
        no_oracle: bool,

        /// Rendering engines to try, in order (repeatable).
        #[arg(long = "engine")]
        engines: Vec<String>,

        /// Pages processed at once.
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Also package each written page into `bundles/<slug>.zip`.
        #[arg(long)]
        bundle: bool,

        /// Write a JSON run report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print a page's metadata and candidate snippets without writing output.
    Inspect {
        /// URL or local HTML file.
        source: String,
    },

    /// Package an already extracted page into a ZIP archive.
    Bundle {
        /// Page slug (the `<slug>` of `pages/<slug>.json`).
        slug: String,

        /// Output root the page was written to.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Archive path (defaults to `<out>/bundles/<slug>.zip`).
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Check that a page's model references resolve and match their schemas.
    Verify {
        /// Page slug.
        slug: String,

        /// Output root the page was written to.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "cmsextract=info",
        1 => "cmsextract=debug",
        _ => "cmsextract=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract {
            sources,
            list,
            zip,
            out,
            no_oracle,
            engines,
            concurrency,
            bundle,
            report,
        } => {
            let config = load_config()?;
            let mut pipeline_config = PipelineConfig::from(&config);
            if let Some(out) = out {
                pipeline_config.output_root = out;
            }
            if no_oracle {
                pipeline_config.oracle.enabled = false;
            }
            if !engines.is_empty() {
                pipeline_config.engines = engines;
            }
            if let Some(n) = concurrency {
                pipeline_config.concurrency = n;
            }

            let items = gather_sources(sources, list.as_deref(), zip.as_deref())?;
            cmd_extract(pipeline_config, items, bundle, report.as_deref()).await
        }
        Command::Inspect { source } => cmd_inspect(&source).await,
        Command::Bundle { slug, out, dest } => {
            let root = output_root(out)?;
            cmd_bundle(&root, &slug, dest)
        }
        Command::Verify { slug, out } => {
            let root = output_root(out)?;
            cmd_verify(&root, &slug)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn output_root(out: Option<PathBuf>) -> Result<PathBuf> {
    match out {
        Some(p) => Ok(p),
        None => Ok(PathBuf::from(load_config()?.defaults.output_dir)),
    }
}

// ---------------------------------------------------------------------------
// Source gathering
// ---------------------------------------------------------------------------

/// Largest single document accepted from a ZIP upload.
const MAX_UPLOAD_ENTRY_BYTES: u64 = 16 * 1024 * 1024;

/// Collect every source of an `extract` run. Sources that cannot be used are
/// kept as rejected items so they are reported alongside the others.
fn gather_sources(
    positional: Vec<String>,
    list: Option<&Path>,
    zip: Option<&Path>,
) -> Result<Vec<BatchItem>> {
    let mut raw: Vec<String> = positional;

    if let Some(list) = list {
        let content = std::fs::read_to_string(list)
            .wrap_err_with(|| format!("cannot read source list {}", list.display()))?;
        raw.extend(read_source_list(&content));
    }

    let mut items: Vec<BatchItem> = raw
        .into_iter()
        .map(|s| match SourceInput::parse(&s) {
            Ok(input) => BatchItem::Source(input),
            Err(e) => BatchItem::rejected(s, e),
        })
        .collect();

    if let Some(zip) = zip {
        items.extend(read_zip_sources(zip, MAX_UPLOAD_ENTRY_BYTES)?);
    }

    if items.is_empty() {
        return Err(eyre!("no sources given: pass URLs/files, --list, or --zip"));
    }
    Ok(items)
}

/// Non-empty, non-comment lines of a source list.
fn read_source_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Every `.html`/`.htm` file entry of a ZIP archive as an inline source.
///
/// Entries that cannot be read or hold more than `max_entry_bytes` are
/// rejected individually.
fn read_zip_sources(path: &Path, max_entry_bytes: u64) -> Result<Vec<BatchItem>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("cannot open archive {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .wrap_err_with(|| format!("not a ZIP archive: {}", path.display()))?;

    let mut items = Vec::new();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                let label = format!("{}#{i}", path.display());
                items.push(BatchItem::rejected(
                    label.clone(),
                    CmsExtractError::fetch(label, format!("unreadable archive entry: {e}")),
                ));
                continue;
            }
        };
        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();
        let is_html = lower.ends_with(".html") || lower.ends_with(".htm");
        if entry.is_dir() || !is_html || lower.starts_with("__macosx/") {
            continue;
        }

        match read_entry(&mut entry, max_entry_bytes) {
            Ok(bytes) => items.push(SourceInput::html(name, bytes).into()),
            Err(reason) => {
                warn!(archive = %path.display(), entry = %name, %reason, "rejecting archive entry");
                items.push(BatchItem::rejected(
                    name.clone(),
                    CmsExtractError::fetch(name, reason),
                ));
            }
        }
    }

    info!(archive = %path.display(), documents = items.len(), "read ZIP sources");
    Ok(items)
}

/// Read one archive entry without trusting its declared size.
fn read_entry(entry: impl Read, limit: u64) -> std::result::Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| format!("cannot read archive entry: {e}"))?;
    if bytes.len() as u64 > limit {
        return Err(format!("archive entry exceeds {limit} bytes"));
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_extract(
    config: PipelineConfig,
    sources: Vec<BatchItem>,
    bundle: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let root = config.output_root.clone();
    let pipeline = Arc::new(Pipeline::new(config)?);

    info!(
        pages = sources.len(),
        output = %root.display(),
        oracle = pipeline.config().oracle.enabled,
        "extracting"
    );

    let progress = Arc::new(CliProgress::new());
    let report = run_batch(pipeline, sources, progress).await;

    println!();
    for page in &report.pages {
        match &page.result {
            Ok(outcome) => {
                println!(
                    "  ok      {} -> {} ({} models)",
                    page.source,
                    outcome.page_path.display(),
                    outcome.page.models.len()
                );
                if bundle {
                    let dest = root.join("bundles").join(format!("{}.zip", page.slug));
                    match bundle_page(&root, &page.slug, &dest) {
                        Ok(summary) => println!("          bundled {}", summary.path.display()),
                        Err(e) => {
                            warn!(slug = %page.slug, error = %e, "bundle failed");
                            println!("          bundle failed: {e}");
                        }
                    }
                }
            }
            Err(e) => println!("  FAILED  {}: {e}", page.source),
        }
    }

    let failed = report.failed();
    let total = report.pages.len();
    println!();
    println!(
        "  {} of {total} pages extracted in {:.1}s",
        total - failed,
        report.elapsed.as_secs_f64()
    );
    println!();

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report.summary())?;
        std::fs::write(path, json)
            .wrap_err_with(|| format!("cannot write report {}", path.display()))?;
    }

    if failed > 0 {
        return Err(eyre!("{failed} of {total} pages failed"));
    }
    Ok(())
}

async fn cmd_inspect(source: &str) -> Result<()> {
    let config = load_config()?;
    let mut pipeline_config = PipelineConfig::from(&config);
    pipeline_config.oracle.enabled = false;

    let pipeline = Pipeline::new(pipeline_config)?;
    let input = SourceInput::parse(source)?;
    let extraction = pipeline.inspect(&input).await?;

    println!("{}", serde_json::to_string_pretty(&extraction)?);
    Ok(())
}

fn cmd_bundle(root: &Path, slug: &str, dest: Option<PathBuf>) -> Result<()> {
    let dest = dest.unwrap_or_else(|| root.join("bundles").join(format!("{slug}.zip")));
    let summary = bundle_page(root, slug, &dest)?;

    println!();
    println!("  Bundle:  {}", summary.path.display());
    println!("  Entries: {}", summary.entries.join(", "));
    println!("  Size:    {} bytes", summary.bytes);
    println!("  SHA-256: {}", summary.sha256);
    println!();
    Ok(())
}

fn cmd_verify(root: &Path, slug: &str) -> Result<()> {
    let page = verify_page(root, slug)?;
    println!("{slug}: ok ({} models)", page.models.len());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.spinner.set_message(format!("Extracting {total} page(s)"));
    }

    fn page_done(&self, report: &PageReport, current: usize, total: usize) {
        let status = if report.is_ok() { "done" } else { "failed" };
        self.spinner
            .set_message(format!("[{current}/{total}] {status}: {}", report.source));
    }

    fn done(&self, _report: &BatchReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn source_list_skips_blanks_and_comments() {
        let list = "https://example.com/a\n\n  # comment\n  page.html  \n";
        assert_eq!(read_source_list(list), ["https://example.com/a", "page.html"]);
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cms-cli-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn slug_or_rejected(item: &BatchItem) -> String {
        match item {
            BatchItem::Source(input) => input.slug(),
            BatchItem::Rejected { source, .. } => format!("rejected:{source}"),
        }
    }

    #[test]
    fn zip_sources_keep_only_html() {
        let dir = temp_dir();
        let path = dir.join("pages.zip");
        write_zip(
            &path,
            &[
                ("site/index.html", "<h1>Home</h1>"),
                ("site/About.HTM", "<h1>About</h1>"),
                ("site/style.css", "h1 {}"),
                ("__MACOSX/site/._index.html", "junk"),
            ],
        );

        let items = read_zip_sources(&path, MAX_UPLOAD_ENTRY_BYTES).unwrap();
        let slugs: Vec<_> = items.iter().map(slug_or_rejected).collect();
        assert_eq!(slugs, ["index-html", "about-htm"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_zip_entry_is_rejected_alone() {
        let dir = temp_dir();
        let path = dir.join("pages.zip");
        let big = "<p>".repeat(40);
        write_zip(&path, &[("big.html", big.as_str()), ("small.html", "<h1>Hi</h1>")]);

        let items = read_zip_sources(&path, 64).unwrap();
        let slugs: Vec<_> = items.iter().map(slug_or_rejected).collect();
        assert_eq!(slugs, ["rejected:big.html", "small-html"]);
        assert!(matches!(
            &items[0],
            BatchItem::Rejected { error, .. } if error.to_string().contains("exceeds 64 bytes")
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_entry_enforces_limit() {
        assert_eq!(read_entry(&b"12345678"[..], 8).unwrap(), b"12345678");
        assert!(read_entry(&b"123456789"[..], 8).is_err());
    }

    #[test]
    fn invalid_sources_are_kept_for_reporting() {
        let items = gather_sources(
            vec!["ftp://example.com/x".into(), "https://example.com/".into()],
            None,
            None,
        )
        .unwrap();
        assert!(matches!(
            &items[0],
            BatchItem::Rejected { source, error }
                if source == "ftp://example.com/x" && error.to_string().contains("ftp")
        ));
        assert!(matches!(&items[1], BatchItem::Source(_)));
    }

    #[test]
    fn cli_parses_extract_flags() {
        let cli = Cli::try_parse_from([
            "cmsextract",
            "-v",
            "extract",
            "https://example.com/",
            "--no-oracle",
            "--engine",
            "http",
            "--concurrency",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Extract {
                sources,
                no_oracle,
                engines,
                concurrency,
                ..
            } => {
                assert_eq!(sources, ["https://example.com/"]);
                assert!(no_oracle);
                assert_eq!(engines, ["http"]);
                assert_eq!(concurrency, Some(2));
            }
            _ => panic!("expected extract"),
        }
    }
}
