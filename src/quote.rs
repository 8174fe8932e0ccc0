//! Quote preparation entry points.
//!
//! [`prepare_quote`] runs the whole flow for one request:
//!
//! ```text
//! validate ──▶ dedupe ──▶ per file (concurrent): OCR ──▶ analysis ──▶ page pricing
//!                                                                       │
//!                                   quote totals (minimum charge) ◀─────┘
//! ```
//!
//! A failed file never aborts the quote. It is recorded on its
//! [`FileOutcome`] and the rest of the batch is priced; only when no file
//! yields a single page does the call fail with
//! [`QuoteError::AllFilesFailed`].

use crate::config::QuoteConfig;
use crate::error::{FileError, QuoteError};
use crate::intake::{dedupe_files, generate_quote_id, validate_file, QuoteRequest, UploadedFile};
use crate::jobs::{JobStatus, JobStore};
use crate::output::{FileOutcome, FileStatus, QuoteOutput, QuoteStats};
use crate::pipeline::analysis::{DocumentAnalyzer, LlmAnalyzer};
use crate::pipeline::ocr::{engine_from_config, OcrEngine};
use crate::pricing::{calculate_quote, FileAnalysis};
use crate::storage::unique_object_paths;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Prepare a quote with the vendors named in `config`.
///
/// # Errors
/// Returns `Err(QuoteError)` only for fatal errors:
/// - the request fails validation
/// - credentials for the selected OCR backend or LLM provider are missing
/// - every file failed, so nothing can be priced
///
/// Per-file failures are reported in `output.files[i].status`.
pub async fn prepare_quote(
    request: QuoteRequest,
    config: &QuoteConfig,
) -> Result<QuoteOutput, QuoteError> {
    request.validate()?;

    let ocr = engine_from_config(config)?;
    let analyzer = if config.skip_analysis {
        None
    } else {
        Some(LlmAnalyzer::from_config(config)?)
    };

    prepare_quote_with(
        request,
        config,
        ocr.as_ref(),
        analyzer.as_ref().map(|a| a as &dyn DocumentAnalyzer),
    )
    .await
}

/// Prepare a quote with explicit OCR and analysis engines.
///
/// With `analyzer = None` every page is priced at Medium complexity.
pub async fn prepare_quote_with(
    request: QuoteRequest,
    config: &QuoteConfig,
    ocr: &dyn OcrEngine,
    analyzer: Option<&dyn DocumentAnalyzer>,
) -> Result<QuoteOutput, QuoteError> {
    request.validate()?;

    let quote_id = request
        .quote_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_quote_id);
    info!("Preparing quote {} ({} files)", quote_id, request.files.len());

    let job = match config.job_store {
        Some(ref store) => Some(JobLog {
            job_id: store.init_job(Some(&quote_id)).await?,
            store: &**store,
        }),
        None => None,
    };

    let result = run(request, &quote_id, config, ocr, analyzer, job.as_ref()).await;

    if let Some(job) = job {
        let ended = match &result {
            Ok(output) => match serde_json::to_value(output) {
                Ok(value) => {
                    job.store
                        .end_job(&job.job_id, JobStatus::Succeeded, None, Some(value))
                        .await
                }
                Err(e) => Err(QuoteError::Internal(format!("serialise quote: {e}"))),
            },
            Err(e) => {
                job.store
                    .end_job(&job.job_id, JobStatus::Failed, Some(e.to_string()), None)
                    .await
            }
        };
        if let Err(e) = ended {
            warn!("Job {}: could not record final status: {}", job.job_id, e);
        }
    }

    result
}

/// Prepare a quote and write it as pretty JSON.
///
/// Uses atomic write (temp file + rename) so a reader never sees half a quote.
pub async fn prepare_quote_to_file(
    request: QuoteRequest,
    output_path: impl AsRef<Path>,
    config: &QuoteConfig,
) -> Result<QuoteOutput, QuoteError> {
    let output = prepare_quote(request, config).await?;
    write_quote_json(&output, output_path.as_ref()).await?;
    Ok(output)
}

/// Write a quote as pretty JSON, atomically.
pub async fn write_quote_json(output: &QuoteOutput, path: &Path) -> Result<(), QuoteError> {
    let write_err = |e: std::io::Error| QuoteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| QuoteError::Internal(format!("serialise quote: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`prepare_quote`].
///
/// Creates a temporary tokio runtime internally.
pub fn prepare_quote_sync(
    request: QuoteRequest,
    config: &QuoteConfig,
) -> Result<QuoteOutput, QuoteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuoteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(prepare_quote(request, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Best-effort event log for one job. A store hiccup never fails a quote.
struct JobLog<'a> {
    store: &'a dyn JobStore,
    job_id: String,
}

impl JobLog<'_> {
    async fn event(&self, step: &str, message: &str, progress: u8) {
        if let Err(e) = self
            .store
            .log_event(&self.job_id, step, message, Some(progress))
            .await
        {
            warn!("Job {}: could not log {} event: {}", self.job_id, step, e);
        }
    }
}

async fn log(job: Option<&JobLog<'_>>, step: &str, message: &str, progress: u8) {
    if let Some(job) = job {
        job.event(step, message, progress).await;
    }
}

/// Progress figure for the file stages: 10 % after upload, 90 % when every
/// file has finished both OCR and analysis.
fn stage_progress(steps_done: usize, total_steps: usize) -> u8 {
    (10 + 80 * steps_done / total_steps.max(1)).min(90) as u8
}

async fn run(
    request: QuoteRequest,
    quote_id: &str,
    config: &QuoteConfig,
    ocr: &dyn OcrEngine,
    analyzer: Option<&dyn DocumentAnalyzer>,
    job: Option<&JobLog<'_>>,
) -> Result<QuoteOutput, QuoteError> {
    let start = Instant::now();
    let terms = request.terms();
    let uploaded = request.files.len();
    let files = dedupe_files(request.files);
    let total = files.len();
    if total < uploaded {
        debug!("Dropped {} duplicate uploads", uploaded - total);
    }

    log(job, "upload", &format!("{total} files received"), 10).await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_quote_start(total);
    }

    // ── Per-file OCR + analysis + page pricing ───────────────────────────
    let steps = AtomicUsize::new(0);
    let ctx = FileContext {
        quote_id,
        config,
        ocr,
        analyzer,
        job,
        total,
        steps: &steps,
    };
    let file_ids = unique_object_paths(quote_id, files.iter().map(|f| f.name.as_str()));
    let mut indexed: Vec<(usize, FileOutcome)> = stream::iter(files.iter().zip(&file_ids).enumerate())
        .map(|(index, (file, file_id))| {
            let ctx = &ctx;
            async move { (index, process_file(ctx, index, file, file_id).await) }
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    indexed.sort_by_key(|(index, _)| *index);
    let mut outcomes: Vec<FileOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

    // ── Quote totals ─────────────────────────────────────────────────────
    let priced_idx: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| o.pricing.is_some())
        .map(|(i, _)| i)
        .collect();

    if priced_idx.is_empty() {
        let first_error = outcomes
            .iter()
            .find_map(|o| o.message.clone())
            .unwrap_or_else(|| "No pages detected in any file".to_string());
        return Err(QuoteError::AllFilesFailed { total, first_error });
    }

    let mut priced: Vec<FileAnalysis> = priced_idx
        .iter()
        .filter_map(|&i| outcomes[i].pricing.take())
        .collect();
    let totals = calculate_quote(&mut priced, &terms, &config.rates)?;
    for (i, analysis) in priced_idx.iter().zip(priced) {
        outcomes[*i].pricing = Some(analysis);
    }

    log(
        job,
        "pricing",
        &format!(
            "{:.1} billable pages at {:.2} + {} certification",
            totals.total_billable_pages, totals.per_page_rate, totals.cert_type
        ),
        100,
    )
    .await;

    let stats = QuoteStats {
        total_files: total,
        priced_files: priced_idx.len(),
        failed_files: count(&outcomes, FileStatus::Failed),
        skipped_files: count(&outcomes, FileStatus::Skipped),
        duplicate_files: uploaded - total,
        total_pages: outcomes.iter().map(|o| u64::from(o.page_count())).sum(),
        total_words: outcomes.iter().map(FileOutcome::word_count).sum(),
        input_tokens: outcomes
            .iter()
            .filter_map(|o| o.analysis.as_ref())
            .map(|a| a.input_tokens as u64)
            .sum(),
        output_tokens: outcomes
            .iter()
            .filter_map(|o| o.analysis.as_ref())
            .map(|a| a.output_tokens as u64)
            .sum(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Quote {}: {}/{} files priced, {:.1} pages, total {:.2}, {}ms",
        quote_id,
        stats.priced_files,
        total,
        totals.total_billable_pages,
        totals.quote_total,
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_quote_complete(total, stats.priced_files);
    }

    Ok(QuoteOutput {
        quote_id: quote_id.to_string(),
        job_id: job.map(|j| j.job_id.clone()),
        customer: request.customer,
        terms,
        files: outcomes,
        totals,
        stats,
    })
}

fn count(outcomes: &[FileOutcome], status: FileStatus) -> usize {
    outcomes.iter().filter(|o| o.status == status).count()
}

struct FileContext<'a> {
    quote_id: &'a str,
    config: &'a QuoteConfig,
    ocr: &'a dyn OcrEngine,
    analyzer: Option<&'a dyn DocumentAnalyzer>,
    job: Option<&'a JobLog<'a>>,
    total: usize,
    steps: &'a AtomicUsize,
}

impl FileContext<'_> {
    fn step_progress(&self) -> u8 {
        let done = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        stage_progress(done, self.total * 2)
    }
}

/// OCR, analyse and price one file. Never fails; problems land on the outcome.
async fn process_file(
    ctx: &FileContext<'_>,
    index: usize,
    file: &UploadedFile,
    file_id: &str,
) -> FileOutcome {
    let config = ctx.config;
    let outcome = FileOutcome::pending(
        file_id.to_string(),
        &file.name,
        &file.mime_type,
        file.size,
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(index, ctx.total, &file.name);
    }

    let outcome = match price_file(ctx, file, outcome).await {
        Ok(outcome) => outcome,
        Err((outcome, e)) => {
            warn!("{}", e);
            // both stages count as done for a failed file
            ctx.steps.fetch_add(1, Ordering::SeqCst);
            let progress = ctx.step_progress();
            let step = match e {
                FileError::Rejected { .. } => "upload",
                _ => "ocr",
            };
            log(ctx.job, step, &e.to_string(), progress).await;
            outcome.fail(e)
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match outcome.status {
            FileStatus::Completed => {
                cb.on_file_complete(index, ctx.total, &file.name, outcome.page_count())
            }
            _ => cb.on_file_error(
                index,
                ctx.total,
                &file.name,
                outcome.message.as_deref().unwrap_or("failed"),
            ),
        }
    }
    outcome
}

async fn price_file(
    ctx: &FileContext<'_>,
    file: &UploadedFile,
    mut outcome: FileOutcome,
) -> Result<FileOutcome, (FileOutcome, FileError)> {
    let config = ctx.config;

    if let Err(e) = validate_file(file, config.max_file_bytes) {
        return Err((outcome, e));
    }

    // ── OCR ──────────────────────────────────────────────────────────────
    let timeout = Duration::from_secs(config.api_timeout_secs);
    let summary = match tokio::time::timeout(timeout, ctx.ocr.extract(file)).await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => return Err((outcome, e)),
        Err(_) => {
            let e = FileError::Timeout {
                file: file.name.clone(),
                service: ctx.ocr.name().to_string(),
                secs: config.api_timeout_secs,
            };
            return Err((outcome, e));
        }
    };
    let progress = ctx.step_progress();
    log(
        ctx.job,
        "ocr",
        &format!(
            "{}: {} words on {} pages",
            file.name, summary.total_word_count, summary.page_count
        ),
        progress,
    )
    .await;

    if summary.page_count == 0 {
        ctx.steps.fetch_add(1, Ordering::SeqCst);
        outcome.status = FileStatus::Skipped;
        outcome.message = Some("No text detected in document".to_string());
        outcome.ocr = Some(summary);
        return Ok(outcome);
    }

    // ── Analysis ─────────────────────────────────────────────────────────
    if let Some(analyzer) = ctx.analyzer {
        let analyzed =
            tokio::time::timeout(timeout, analyzer.analyze(file, Some(summary.page_count))).await;
        match analyzed {
            Ok(Ok(analysis)) => outcome.analysis = Some(analysis),
            Ok(Err(e)) => {
                warn!("{} (pricing at default complexity)", e);
                outcome.analysis_error = Some(e);
            }
            Err(_) => {
                let e = FileError::Timeout {
                    file: file.name.clone(),
                    service: "analysis".to_string(),
                    secs: config.api_timeout_secs,
                };
                warn!("{} (pricing at default complexity)", e);
                outcome.analysis_error = Some(e);
            }
        }
        let progress = ctx.step_progress();
        let message = match (&outcome.analysis, &outcome.analysis_error) {
            (Some(a), _) => format!(
                "{}: {}",
                file.name,
                a.document_type().unwrap_or("analysed")
            ),
            (None, Some(e)) => e.to_string(),
            (None, None) => file.name.clone(),
        };
        log(ctx.job, "analysis", &message, progress).await;
    } else {
        ctx.steps.fetch_add(1, Ordering::SeqCst);
    }

    // ── Page pricing ─────────────────────────────────────────────────────
    let pages: Vec<_> = summary
        .words_per_page
        .iter()
        .enumerate()
        .map(|(i, &words)| {
            let complexity = outcome
                .analysis
                .as_ref()
                .map(|a| a.complexity_for_page(i as u32 + 1))
                .unwrap_or_default();
            (words, complexity)
        })
        .collect();

    outcome.pricing = Some(FileAnalysis::from_pages(
        outcome.file_id.clone(),
        file.name.clone(),
        &pages,
        config.rates.words_per_page,
    ));
    outcome.ocr = Some(summary);
    outcome.status = FileStatus::Completed;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_progress_bounds() {
        assert_eq!(stage_progress(0, 4), 10);
        assert_eq!(stage_progress(2, 4), 50);
        assert_eq!(stage_progress(4, 4), 90);
        assert_eq!(stage_progress(9, 4), 90);
        assert_eq!(stage_progress(0, 0), 10);
    }
}
