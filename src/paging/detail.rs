use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

use crate::vcs::VcsError;

/// Maximum in-flight detail requests per batch.
pub const DETAIL_CONCURRENCY: usize = 10;

/// Boxed detail request, for fetchers built by a named function.
pub type DetailFuture<T> = Pin<Box<dyn Future<Output = Result<T, VcsError>> + Send>>;

/// Fetch the full record for every summary with at most `limit` requests in flight.
///
/// One task is spawned per summary; a fresh semaphore gates them, so unrelated batches
/// never share permits. Outcomes land on a channel sized to the batch, so no task
/// waits on the collector. Results keep the order of `summaries`.
///
/// The first error drained fails the whole batch. Tasks still running at that point
/// are aborted when the batch is dropped; requests already on the wire may still
/// complete upstream.
pub async fn fetch_details<S, T, F, Fut>(
    summaries: Vec<S>,
    limit: usize,
    fetch: F,
) -> Result<Vec<T>, VcsError>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, VcsError>> + Send + 'static,
{
    let count = summaries.len();
    if count == 0 {
        return Ok(Vec::new());
    }
    debug!(count, limit, "fetching details");

    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let fetch = Arc::new(fetch);
    let (tx, mut rx) = mpsc::channel::<(usize, Result<T, VcsError>)>(count);
    let mut tasks = JoinSet::new();

    for (index, summary) in summaries.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let fetch = Arc::clone(&fetch);
        let tx = tx.clone();
        tasks.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => (*fetch)(summary).await,
                Err(_) => Err(VcsError::Task("detail semaphore closed".to_string())),
            };
            let _ = tx.send((index, outcome)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(count).collect();
    for _ in 0..count {
        let Some((index, outcome)) = rx.recv().await else {
            tasks.abort_all();
            return Err(VcsError::Task(
                "detail task exited without reporting".to_string(),
            ));
        };
        match outcome {
            Ok(item) => slots[index] = Some(item),
            Err(err) => {
                tasks.abort_all();
                return Err(err);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
