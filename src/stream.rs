//! Streaming batch API: emit documents as they complete.
//!
//! Large batches (one PDF per student, one workbook per round) take a while.
//! [`extract_stream`] yields one [`DocumentResult`] per input as soon as that
//! document is done, so callers can drive progress bars or write results
//! incrementally. Documents run concurrently (up to
//! [`ExtractionConfig::concurrency`]) and may arrive out of order; sort by
//! [`DocumentResult::index`] if order matters, as
//! [`crate::extract::extract_batch`] does.
//!
//! A document that fails to decode still yields a result: empty records, one
//! error in its summary, `failed_documents == 1`. The stream itself never
//! fails part-way.

use crate::config::ExtractionConfig;
use crate::error::{DocumentError, ExtractError};
use crate::extract::Extractor;
use crate::output::{DocumentKind, DocumentResult};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Extract many documents, streaming results as they are ready.
///
/// Fires the per-document progress callbacks; batch-level callbacks are left
/// to the caller.
///
/// # Returns
/// - `Ok(DocumentStream)` — one item per input
/// - `Err(ExtractError)` — the configuration does not compile
pub fn extract_stream(
    sources: Vec<PathBuf>,
    kind: Option<DocumentKind>,
    config: &ExtractionConfig,
) -> Result<DocumentStream, ExtractError> {
    let extractor = Extractor::new(config.clone())?;
    let total = sources.len();
    let concurrency = config.concurrency.max(1);
    info!(documents = total, concurrency, "starting batch extraction");

    let s = stream::iter(sources.into_iter().enumerate().map(move |(index, path)| {
        let extractor = extractor.clone();
        async move {
            let source = path.display().to_string();
            let cb = extractor.config().progress_callback.clone();
            if let Some(ref cb) = cb {
                cb.on_document_start(index + 1, total, &source);
            }

            let result = match extractor.extract_file(&path, kind).await {
                Ok(mut result) => {
                    result.index = index;
                    result
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "document skipped");
                    let guessed = kind.or_else(|| DocumentKind::from_path(&path));
                    DocumentResult::failed(index, source.clone(), guessed, &DocumentError::from_fatal(&source, &e))
                }
            };

            if let Some(ref cb) = cb {
                match result.summary.errors.first() {
                    Some(error) if result.is_failed() => {
                        cb.on_document_error(index + 1, total, &source, error)
                    }
                    _ => cb.on_document_complete(index + 1, total, &source, result.record_count()),
                }
            }
            result
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
