use std::collections::HashSet;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::error::ExtractionError;
use crate::record::BikeRecord;
use crate::sink::RecordSink;

/// Batch stats returned after completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Drop URLs already scraped and repeated URLs, keeping input order.
pub fn pending_urls(urls: Vec<String>, done: &HashSet<String>) -> (Vec<String>, usize) {
    let mut seen = HashSet::new();
    let mut skipped = 0;
    let pending = urls
        .into_iter()
        .filter(|url| {
            if done.contains(url) || !seen.insert(url.clone()) {
                skipped += 1;
                false
            } else {
                true
            }
        })
        .collect();
    (pending, skipped)
}

/// Extract pages concurrently, appending each record to the sink as it arrives.
/// A failed write closes the worker pool, so queued URLs are never started.
pub async fn scrape_pages_streaming<W, F, Fut>(
    sink: &mut RecordSink<W>,
    urls: Vec<String>,
    workers: usize,
    extract: F,
) -> Result<BatchStats>
where
    W: Write,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BikeRecord, ExtractionError>> + Send + 'static,
{
    let workers = workers.max(1);
    let extract = Arc::new(extract);
    let semaphore = Arc::new(Semaphore::new(workers));
    let total = urls.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) =
        mpsc::channel::<(String, Result<BikeRecord, ExtractionError>)>(workers * 2);

    for url in urls {
        let extract = Arc::clone(&extract);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let outcome = extract(url.clone()).await;
            let _ = tx.send((url, outcome)).await;
        });
    }

    // rx closes once every task has sent
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some((url, outcome)) = rx.recv().await {
        match outcome {
            Ok(record) => {
                if let Err(e) = sink.append(&record) {
                    semaphore.close();
                    pb.finish_and_clear();
                    return Err(e);
                }
                ok += 1;
            }
            Err(e) => {
                pb.suspend(|| warn!("Failed {}: {}", url, e));
                errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scraped {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(BatchStats {
        total,
        ok,
        errors,
        skipped: 0,
    })
}

// ── Tests ──
