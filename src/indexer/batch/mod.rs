#[cfg(test)]
mod tests;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use super::IndexManager;
use crate::sources::SourceReader;
use crate::Result;

/// Totals for one batch ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub sources_seen: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks_added: usize,
}

/// Ingest every source `reader` yields.
///
/// A source that cannot be read, converted or ingested is logged and counted
/// as failed; the batch carries on with the next one.
#[inline]
pub async fn ingest_from(
    reader: &mut dyn SourceReader,
    manager: &mut IndexManager,
) -> Result<BatchStats> {
    manager.ensure_consistent()?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_length(reader.remaining_hint().unwrap_or(0) as u64);

    let mut stats = BatchStats::default();

    while let Some(read) = reader.next_source().await {
        stats.sources_seen += 1;

        let document = match read {
            Ok(document) => document,
            Err(failure) => {
                warn!("Skipping source {}", failure);
                stats.failed += 1;
                bar.inc(1);
                continue;
            }
        };

        bar.set_message(document.source_id.clone());
        match manager.ingest(&document.source_id, &document.content) {
            Ok(outcome) if outcome.skipped => {
                debug!("{} unchanged", document.source_id);
                stats.skipped += 1;
            }
            Ok(outcome) => {
                stats.ingested += 1;
                stats.chunks_added += outcome.chunks_added;
            }
            Err(e) => {
                error!("Failed to ingest {}: {}", document.source_id, e);
                stats.failed += 1;
            }
        }

        bar.set_length(stats.sources_seen as u64 + reader.remaining_hint().unwrap_or(0) as u64);
        bar.inc(1);
    }

    bar.finish_and_clear();
    info!(
        "Batch finished: {} sources, {} ingested, {} unchanged, {} failed, {} chunks added",
        stats.sources_seen, stats.ingested, stats.skipped, stats.failed, stats.chunks_added
    );
    Ok(stats)
}
