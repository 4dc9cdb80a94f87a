//! Concurrent language fetching
//!
//! A fixed pool of workers drains a closed channel of `(index, repository)`
//! jobs. Every worker owns its own [`RemoteClient`] and reports the indices it
//! handled, so results are placed by index rather than completion order.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::github::{ClientFactory, RemoteClient, RepoSummary};
use crate::project::LanguageBreakdown;
use crate::retry::RetryPolicy;

type Job = (usize, RepoSummary);

/// Fetches language breakdowns for many repositories in parallel
pub struct LanguageFetcher {
    factory: Arc<dyn ClientFactory>,
    retry: RetryPolicy,
    pool_size: usize,
}

impl LanguageFetcher {
    pub fn new(factory: Arc<dyn ClientFactory>, retry: RetryPolicy, pool_size: usize) -> Self {
        Self {
            factory,
            retry,
            pool_size: pool_size.max(1),
        }
    }

    /// Language breakdown for every repository; `output[i]` belongs to `repos[i]`.
    ///
    /// A repository whose fetch fails yields an empty breakdown. If the
    /// workers cannot be joined the whole result is empty and callers should
    /// import without language data.
    pub async fn fetch_all(&self, repos: &[RepoSummary]) -> Vec<LanguageBreakdown> {
        if repos.is_empty() {
            return Vec::new();
        }

        let workers = self.pool_size.min(repos.len());
        info!(
            "Fetching languages for {} repositories with {} workers",
            repos.len(),
            workers
        );

        let (sender, receiver) = mpsc::channel::<Job>(repos.len());
        for job in repos.iter().cloned().enumerate() {
            // Capacity equals the job count, so this never waits
            if sender.send(job).await.is_err() {
                warn!("Language work queue closed before it was seeded");
                return Vec::new();
            }
        }
        drop(sender);

        let queue = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let client = match self.factory.connect() {
                Ok(client) => client,
                Err(e) => {
                    warn!("Could not create client for worker {}: {}", worker_id, e);
                    continue;
                }
            };
            handles.push(tokio::spawn(run_worker(
                worker_id,
                client,
                Arc::clone(&queue),
                self.retry,
            )));
        }

        if handles.is_empty() {
            warn!("No language workers could start; importing without language data");
            return Vec::new();
        }

        let mut results = vec![LanguageBreakdown::new(); repos.len()];
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(completed) => {
                    for (index, languages) in completed {
                        results[index] = languages;
                    }
                }
                Err(e) => {
                    warn!("Error joining language workers: {}", e);
                    return Vec::new();
                }
            }
        }

        results
    }
}

async fn run_worker(
    worker_id: usize,
    client: Box<dyn RemoteClient>,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    retry: RetryPolicy,
) -> Vec<(usize, LanguageBreakdown)> {
    let mut completed = Vec::new();

    loop {
        // Hold the lock only for the dequeue
        let next = queue.lock().await.recv().await;
        let Some((index, repo)) = next else {
            break;
        };

        let languages = fetch_languages(client.as_ref(), &retry, &repo).await;
        completed.push((index, languages));
    }

    debug!("Language worker {} handled {} repositories", worker_id, completed.len());
    completed
}

async fn fetch_languages(
    client: &dyn RemoteClient,
    retry: &RetryPolicy,
    repo: &RepoSummary,
) -> LanguageBreakdown {
    let label = format!("fetching languages for {}", repo.full_name);
    retry
        .with_retry_or_default(&label, move || client.language_breakdown(&repo.full_name))
        .await
}
