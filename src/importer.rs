//! Import Pipeline - pulls repositories and language data from GitHub
//!
//! The pipeline lists every repository, enriches each with its language
//! breakdown using a [`LanguageFetcher`], and writes one record file per
//! repository. Failures are isolated to the unit of work they occur in.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::LanguageFetcher;
use crate::github::{resolve_token, ClientFactory, GitHubClientFactory, RepoSummary};
use crate::project::{LanguageBreakdown, RepositoryRecord};
use crate::retry::RetryPolicy;
use crate::store::RecordStore;

/// What an import run did
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub repositories_listed: usize,
    pub records_written: usize,
    pub write_failures: Vec<String>,
    /// True when language enrichment produced no usable result
    pub languages_skipped: bool,
    pub duration: Duration,
}

/// Orchestrates list → fetch languages → assemble → persist
pub struct ImportPipeline {
    factory: Arc<dyn ClientFactory>,
    store: RecordStore,
    retry: RetryPolicy,
    pool_size: usize,
}

impl ImportPipeline {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        store: RecordStore,
        retry: RetryPolicy,
        pool_size: usize,
    ) -> Self {
        Self {
            factory,
            store,
            retry,
            pool_size,
        }
    }

    /// Build a GitHub-backed pipeline. Fails if no token can be resolved.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (strategy, token) = resolve_token(config)?;
        info!("Using authentication strategy: {:?}", strategy);

        let factory = GitHubClientFactory::new(token, config.request_timeout());
        Ok(Self::new(
            Arc::new(factory),
            RecordStore::new(config.projects_dir()),
            RetryPolicy::from_config(config),
            config.import.pool_size,
        ))
    }

    pub async fn run(&self) -> ImportSummary {
        let start_time = Instant::now();

        info!("Attempting to fetch data from GitHub...");
        let repos = self.list_repositories().await;

        let fetcher = LanguageFetcher::new(Arc::clone(&self.factory), self.retry, self.pool_size);
        let languages = fetcher.fetch_all(&repos).await;
        let languages_skipped = !repos.is_empty() && languages.is_empty();
        if languages_skipped {
            warn!("Language data unavailable; importing repositories without it");
        }

        let records = build_records(repos, languages);

        info!("Writing data to files...");
        let mut summary = ImportSummary {
            repositories_listed: records.len(),
            languages_skipped,
            ..Default::default()
        };

        for record in &records {
            match self.store.save(record) {
                Ok(()) => summary.records_written += 1,
                Err(e) => {
                    error!("Failed to write record for {}: {}", record.name, e);
                    summary.write_failures.push(record.name.clone());
                }
            }
        }

        summary.duration = start_time.elapsed();
        info!(
            "Import completed in {:.2}s: {} written, {} failed",
            summary.duration.as_secs_f64(),
            summary.records_written,
            summary.write_failures.len()
        );

        summary
    }

    /// Repository list, or empty when it cannot be fetched
    async fn list_repositories(&self) -> Vec<RepoSummary> {
        let client = match self.factory.connect() {
            Ok(client) => client,
            Err(e) => {
                error!("Unable to fetch repos: {}", e);
                return Vec::new();
            }
        };

        let client = client.as_ref();
        self.retry
            .with_retry_or_default("listing repositories", move || client.list_repositories())
            .await
    }
}

/// Pair repositories with languages by index; missing entries become empty
pub fn build_records(
    repos: Vec<RepoSummary>,
    languages: Vec<LanguageBreakdown>,
) -> Vec<RepositoryRecord> {
    let mut languages = languages.into_iter();

    repos
        .into_iter()
        .map(|repo| {
            let languages = languages.next().unwrap_or_default();
            RepositoryRecord::new(
                repo.name,
                repo.full_name,
                repo.url,
                repo.description,
                repo.created_at,
                repo.pushed_at,
                languages,
            )
        })
        .collect()
}
