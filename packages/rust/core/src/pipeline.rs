//! End-to-end page pipeline: fetch → extract → classify → assemble → write.
//!
//! A [`Pipeline`] holds no mutable state; the same instance may run many
//! pages concurrently, each writing under its own slug.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

use cmsextract_classifier::{Classifier, DecidedBy};
use cmsextract_extractor::{Extraction, decode_document, extract};
use cmsextract_fetcher::{Fetcher, SourceInput};
use cmsextract_shared::slug::slugify;
use cmsextract_shared::{CmsExtractError, PageDocument, PipelineConfig, Result};

use crate::assembler::{ClassifiedSnippet, assemble};
use crate::writer::write_page;

/// Result of one successful page run.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub slug: String,
    pub page: PageDocument,
    pub page_path: PathBuf,
    pub model_paths: Vec<PathBuf>,
    /// How many snippets the oracle (rather than the fallback rule) typed.
    pub oracle_decisions: usize,
    /// Rendering engine that produced the HTML; `None` for local input.
    pub engine: Option<String>,
    pub elapsed: Duration,
}

/// Progress callback for batch runs.
pub trait ProgressReporter: Send + Sync {
    /// Called once before any page starts.
    fn started(&self, total: usize);
    /// Called as each page finishes, in completion order.
    fn page_done(&self, report: &PageReport, current: usize, total: usize);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn page_done(&self, _report: &PageReport, _current: usize, _total: usize) {}
    fn done(&self, _report: &BatchReport) {}
}

pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Fetcher,
    classifier: Classifier,
}

impl Pipeline {
    /// Build the fetcher and classifier named in `config`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config)?;
        let classifier = Classifier::from_config(&config.oracle)?;
        Ok(Self::with_parts(config, fetcher, classifier))
    }

    pub fn with_parts(config: PipelineConfig, fetcher: Fetcher, classifier: Classifier) -> Self {
        Self {
            config,
            fetcher,
            classifier,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one page end to end.
    #[instrument(skip_all, fields(source = %input.label()))]
    pub async fn run_page(&self, input: &SourceInput) -> Result<PageOutcome> {
        let start = Instant::now();
        let doc = self.fetcher.fetch(input).await?;
        let html = decode_document(&doc.body, doc.content_type.as_deref())?;

        let mut outcome = self
            .process_text(&input.slug(), &input.page_url(), doc.page_url.as_ref(), &html)
            .await?;
        outcome.engine = doc.engine;
        outcome.elapsed = start.elapsed();
        Ok(outcome)
    }

    /// Fetch and extract without classifying or writing anything.
    pub async fn inspect(&self, input: &SourceInput) -> Result<Extraction> {
        let doc = self.fetcher.fetch(input).await?;
        let html = decode_document(&doc.body, doc.content_type.as_deref())?;
        Ok(extract(&html, doc.page_url.as_ref(), &self.config.extract))
    }

    /// Everything after the fetch: decode, extract, classify, assemble, write.
    ///
    /// `body` has no transport headers, so its charset comes from a BOM or
    /// the markup.
    pub async fn process_html(
        &self,
        slug: &str,
        page_url: &str,
        base: Option<&Url>,
        body: &[u8],
    ) -> Result<PageOutcome> {
        let html = decode_document(body, None)?;
        self.process_text(slug, page_url, base, &html).await
    }

    #[instrument(skip_all, fields(%slug))]
    async fn process_text(
        &self,
        slug: &str,
        page_url: &str,
        base: Option<&Url>,
        html: &str,
    ) -> Result<PageOutcome> {
        let start = Instant::now();
        let extraction = extract(html, base, &self.config.extract);
        info!(
            snippets = extraction.snippets.len(),
            "extracted candidates"
        );

        let decisions = self.classifier.classify_all(&extraction.snippets).await;
        let oracle_decisions = decisions
            .iter()
            .filter(|c| c.decided_by == DecidedBy::Oracle)
            .count();
        let classified: Vec<ClassifiedSnippet> = extraction
            .snippets
            .into_iter()
            .zip(decisions)
            .map(|(snippet, c)| ClassifiedSnippet {
                snippet,
                model_type: c.model_type,
            })
            .collect();

        let assembly = assemble(slug, page_url, extraction.metadata, &classified);
        let written = write_page(&self.config.output_root, &assembly)?;

        Ok(PageOutcome {
            slug: slug.to_string(),
            page: assembly.page,
            page_path: written.page_path,
            model_paths: written.model_paths,
            oracle_decisions,
            engine: None,
            elapsed: start.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One entry of a batch: a source to run, or one rejected before fetching
/// (unsupported scheme, unreadable upload entry) that is reported as failed.
#[derive(Debug)]
pub enum BatchItem {
    Source(SourceInput),
    Rejected {
        source: String,
        error: CmsExtractError,
    },
}

impl BatchItem {
    pub fn rejected(source: impl Into<String>, error: CmsExtractError) -> Self {
        Self::Rejected {
            source: source.into(),
            error,
        }
    }
}

impl From<SourceInput> for BatchItem {
    fn from(input: SourceInput) -> Self {
        Self::Source(input)
    }
}

/// Outcome of one source in a batch.
#[derive(Debug)]
pub struct PageReport {
    pub source: String,
    pub slug: String,
    pub result: Result<PageOutcome>,
}

impl PageReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// All page outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub pages: Vec<PageReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.pages.iter().filter(|p| p.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.pages.len() - self.succeeded()
    }

    /// Serializable view for `--report` files.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            started_at: self.started_at,
            elapsed_ms: self.elapsed.as_millis() as u64,
            succeeded: self.succeeded(),
            failed: self.failed(),
            pages: self
                .pages
                .iter()
                .map(|p| match &p.result {
                    Ok(outcome) => PageSummary {
                        source: p.source.clone(),
                        slug: p.slug.clone(),
                        status: "ok",
                        page_path: Some(outcome.page_path.display().to_string()),
                        models: outcome.page.models.len(),
                        error: None,
                    },
                    Err(e) => PageSummary {
                        source: p.source.clone(),
                        slug: p.slug.clone(),
                        status: "failed",
                        page_path: None,
                        models: 0,
                        error: Some(e.to_string()),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub source: String,
    pub slug: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_path: Option<String>,
    pub models: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run many independent pages, at most `config.concurrency` at a time.
///
/// A failing page never aborts the others. Rejected items are reported as
/// failed in place. A source whose slug was already claimed earlier in the
/// batch fails with a validation error instead of overwriting the earlier
/// page.
pub async fn run_batch<I>(
    pipeline: Arc<Pipeline>,
    inputs: I,
    progress: Arc<dyn ProgressReporter>,
) -> BatchReport
where
    I: IntoIterator,
    I::Item: Into<BatchItem>,
{
    let items: Vec<BatchItem> = inputs.into_iter().map(Into::into).collect();
    run_items(pipeline, items, progress).await
}

#[instrument(skip_all, fields(sources = items.len()))]
async fn run_items(
    pipeline: Arc<Pipeline>,
    items: Vec<BatchItem>,
    progress: Arc<dyn ProgressReporter>,
) -> BatchReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let total = items.len();
    progress.started(total);

    let semaphore = Arc::new(Semaphore::new(pipeline.config.concurrency.max(1) as usize));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut claimed = HashSet::new();
    let mut handles = Vec::with_capacity(total);

    for item in items {
        let input = match item {
            BatchItem::Source(input) => input,
            BatchItem::Rejected { source, error } => {
                warn!(%source, error = %error, "source rejected");
                let report = PageReport {
                    slug: slugify(&source),
                    source,
                    result: Err(error),
                };
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.page_done(&report, current, total);
                handles.push(Handle::Ready(report));
                continue;
            }
        };
        let source = input.label();
        let slug = input.slug();

        if !claimed.insert(slug.clone()) {
            warn!(%source, %slug, "duplicate slug in batch, skipping");
            let report = PageReport {
                source,
                result: Err(CmsExtractError::validation(format!(
                    "slug '{slug}' is already produced by an earlier source in this batch"
                ))),
                slug,
            };
            let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
            progress.page_done(&report, current, total);
            handles.push(Handle::Ready(report));
            continue;
        }

        let pipeline = pipeline.clone();
        let sem = semaphore.clone();
        let progress = progress.clone();
        let completed = completed.clone();

        handles.push(Handle::Spawned {
            source: source.clone(),
            slug: slug.clone(),
            task: tokio::spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => pipeline.run_page(&input).await,
                    Err(e) => Err(CmsExtractError::validation(format!("batch aborted: {e}"))),
                };
                if let Err(e) = &result {
                    warn!(%source, error = %e, "page failed");
                }
                let report = PageReport { source, slug, result };
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.page_done(&report, current, total);
                report
            }),
        });
    }

    let mut pages = Vec::with_capacity(total);
    for handle in handles {
        pages.push(match handle {
            Handle::Ready(report) => report,
            Handle::Spawned { source, slug, task } => match task.await {
                Ok(report) => report,
                Err(e) => PageReport {
                    source,
                    slug,
                    result: Err(CmsExtractError::validation(format!("page task failed: {e}"))),
                },
            },
        });
    }

    let report = BatchReport {
        started_at,
        pages,
        elapsed: start.elapsed(),
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "batch complete"
    );
    progress.done(&report);
    report
}

enum Handle {
    Ready(PageReport),
    Spawned {
        source: String,
        slug: String,
        task: tokio::task::JoinHandle<PageReport>,
    },
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use cmsextract_shared::{Metadata, ModelType};

    use super::*;

    const EXAMPLE: &str = r#"<html><head><title>Example Domain</title></head><body><h1>Hi</h1><img src="a.jpg" alt="Banner"></body></html>"#;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cms-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn offline(root: &Path) -> Pipeline {
        Pipeline::new(PipelineConfig::offline(root)).unwrap()
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[tokio::test]
    async fn example_page_without_oracle() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);

        let input = SourceInput::html("example.html", EXAMPLE);
        let outcome = pipeline.run_page(&input).await.unwrap();

        assert_eq!(outcome.page.metadata.title, "Example Domain");
        let mut types: Vec<_> = outcome.page.models.iter().map(|m| m.model_type).collect();
        types.sort();
        assert_eq!(types, [ModelType::Banner, ModelType::Headline]);
        assert_eq!(outcome.oracle_decisions, 0);
        assert_eq!(outcome.page.page_uid, "page_example-html");

        for model in &outcome.page.models {
            assert!(tmp.join(&model.path).exists(), "{} missing", model.path);
        }
        crate::writer::verify_page(&tmp, "example-html").unwrap();

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn empty_input_gives_empty_page() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);

        let outcome = pipeline
            .run_page(&SourceInput::html("blank.html", ""))
            .await
            .unwrap();
        assert!(outcome.page.models.is_empty());
        assert_eq!(outcome.page.metadata, Metadata::default());

        let json: serde_json::Value = serde_json::from_str(&read(&outcome.page_path)).unwrap();
        assert_eq!(json["models"], serde_json::json!([]));
        assert_eq!(json["metadata"]["og:title"], "");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn binary_input_is_a_parse_error() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);

        let input = SourceInput::html("image.png", b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0d".to_vec());
        let err = pipeline.run_page(&input).await.unwrap_err();
        assert!(matches!(err, CmsExtractError::Parse { .. }));
        assert!(!tmp.join("pages/image-png.json").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn reruns_are_byte_identical() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);
        let input = SourceInput::html("example.html", EXAMPLE);

        let first = pipeline.run_page(&input).await.unwrap();
        let snapshot: Vec<String> = std::iter::once(&first.page_path)
            .chain(&first.model_paths)
            .map(|p| read(p))
            .collect();

        let second = pipeline.run_page(&input).await.unwrap();
        let again: Vec<String> = std::iter::once(&second.page_path)
            .chain(&second.model_paths)
            .map(|p| read(p))
            .collect();
        assert_eq!(snapshot, again);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn two_teasers_get_sequential_ordinals() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);
        let html = r#"<body>
            <p>First paragraph long enough to be a substantial block of page text.</p>
            <p>Second paragraph, also long enough to count as substantial content.</p>
        </body>"#;

        let outcome = pipeline
            .run_page(&SourceInput::html("news.html", html))
            .await
            .unwrap();
        let paths: Vec<_> = outcome.page.models.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            ["models/news-html/teaser_001.json", "models/news-html/teaser_002.json"]
        );

        let first: serde_json::Value = serde_json::from_str(&read(&tmp.join(paths[0]))).unwrap();
        assert!(first["description"].as_str().unwrap().starts_with("First paragraph"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn url_source_is_fetched_over_http() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/landing"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(r#"<title>Landing | ACME</title><h1>Welcome</h1><img src="/hero.jpg">"#),
            )
            .mount(&server)
            .await;

        let tmp = temp_dir();
        let pipeline = offline(&tmp);
        let url = Url::parse(&format!("{}/landing", server.uri())).unwrap();

        let outcome = pipeline.run_page(&SourceInput::Url(url.clone())).await.unwrap();
        assert_eq!(outcome.engine.as_deref(), Some("http"));
        assert_eq!(outcome.page.page_url, url.as_str());

        let banner_ref = outcome
            .page
            .models
            .iter()
            .find(|m| m.model_type == ModelType::Banner)
            .unwrap();
        let banner: serde_json::Value = serde_json::from_str(&read(&tmp.join(&banner_ref.path))).unwrap();
        assert_eq!(banner["url"], format!("{}/hero.jpg", server.uri()));
        assert_eq!(banner["Headline"], "Welcome");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_keeps_order() {
        let tmp = temp_dir();
        let pipeline = Arc::new(offline(&tmp));

        let inputs = vec![
            SourceInput::html("a.html", EXAMPLE),
            SourceInput::File(tmp.join("does-not-exist.html")),
            SourceInput::html("b.html", "<h2>Second</h2>"),
            SourceInput::html("nested/a.html", "<h2>Same slug</h2>"),
        ];

        let report = run_batch(pipeline, inputs, Arc::new(SilentProgress)).await;
        let sources: Vec<_> = report.pages.iter().map(|p| p.source.as_str()).collect();
        assert_eq!(sources, ["a.html", &*tmp.join("does-not-exist.html").display().to_string(), "b.html", "nested/a.html"]);

        assert!(report.pages[0].is_ok());
        assert!(matches!(report.pages[1].result, Err(CmsExtractError::Fetch { .. })));
        assert!(report.pages[2].is_ok());
        assert!(matches!(report.pages[3].result, Err(CmsExtractError::Validation { .. })));
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 2);

        let summary = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(summary["pages"][1]["status"], "failed");
        assert_eq!(summary["pages"][2]["slug"], "b-html");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rejected_sources_are_reported_in_place() {
        let tmp = temp_dir();
        let pipeline = Arc::new(offline(&tmp));

        let items = vec![
            BatchItem::Source(SourceInput::html("a.html", EXAMPLE)),
            BatchItem::rejected(
                "ftp://example.com/x",
                CmsExtractError::fetch("ftp://example.com/x", "unsupported scheme 'ftp'"),
            ),
        ];

        let report = run_batch(pipeline, items, Arc::new(SilentProgress)).await;
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);

        let summary = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["pages"][1]["source"], "ftp://example.com/x");
        assert_eq!(summary["pages"][1]["status"], "failed");
        assert!(summary["pages"][1]["error"].as_str().unwrap().contains("unsupported scheme"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn declared_charset_reaches_the_page_document() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=iso-8859-1")
                    .set_body_bytes(b"<title>Caf\xE9</title><h1>Men\xFC</h1>".to_vec()),
            )
            .mount(&server)
            .await;

        let tmp = temp_dir();
        let pipeline = offline(&tmp);
        let url = Url::parse(&server.uri()).unwrap();

        let outcome = pipeline.run_page(&SourceInput::Url(url)).await.unwrap();
        assert_eq!(outcome.page.metadata.title, "Café");

        let headline_ref = outcome
            .page
            .models
            .iter()
            .find(|m| m.model_type == ModelType::Headline)
            .unwrap();
        let headline: serde_json::Value =
            serde_json::from_str(&read(&tmp.join(&headline_ref.path))).unwrap();
        assert_eq!(headline["headline_text"], "Menü");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn inspect_writes_nothing() {
        let tmp = temp_dir();
        let pipeline = offline(&tmp);

        let extraction = pipeline
            .inspect(&SourceInput::html("example.html", EXAMPLE))
            .await
            .unwrap();
        assert_eq!(extraction.snippets.len(), 2);
        assert!(!tmp.join("pages").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
