/// Common test utilities and helpers for Clarity tests
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clarity::error::Result;
use clarity::project::LanguageBreakdown;
use clarity::{
    ClientFactory, ImportPipeline, MetadataStore, ProjectRepository, RecordStore, RemoteClient,
    RepoSummary, RetryPolicy, SyncError,
};
use tempfile::TempDir;

/// Isolated data directory with both stores
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub records: RecordStore,
    pub metadata: MetadataStore,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let records = RecordStore::new(temp_dir.path().join("projects"));
        let metadata = MetadataStore::new(temp_dir.path().join("metadata"));

        Self {
            temp_dir,
            records,
            metadata,
        }
    }

    pub fn repository(&self) -> ProjectRepository {
        ProjectRepository::new(self.records.clone(), self.metadata.clone())
    }

    pub fn pipeline(&self, remote: FakeRemote) -> ImportPipeline {
        ImportPipeline::new(
            Arc::new(remote),
            self.records.clone(),
            RetryPolicy::new(2, Duration::from_millis(1)),
            3,
        )
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.temp_dir.path().join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }
}

/// Mock GitHub account data for testing
#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    pub repos: Vec<(RepoSummary, LanguageBreakdown)>,
    pub failing: HashSet<String>,
    pub list_fails: bool,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, name: &str, languages: &[(&str, u64)]) -> Self {
        let breakdown = languages
            .iter()
            .map(|(language, bytes)| (language.to_string(), *bytes))
            .collect();
        self.repos.push((summary(name), breakdown));
        self
    }

    /// Language lookups for this repository always fail with an API error
    pub fn with_failing_repo(mut self, name: &str) -> Self {
        self.repos.push((summary(name), LanguageBreakdown::new()));
        self.failing.insert(format!("me/{}", name));
        self
    }

    pub fn with_list_failure(mut self) -> Self {
        self.list_fails = true;
        self
    }
}

impl ClientFactory for FakeRemote {
    fn connect(&self) -> Result<Box<dyn RemoteClient>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn list_repositories(&self) -> Result<Vec<RepoSummary>> {
        if self.list_fails {
            return Err(SyncError::TransientNetwork("connection reset".to_string()));
        }
        Ok(self.repos.iter().map(|(repo, _)| repo.clone()).collect())
    }

    async fn language_breakdown(&self, full_name: &str) -> Result<LanguageBreakdown> {
        if self.failing.contains(full_name) {
            return Err(SyncError::RemoteApi(format!("{} not found", full_name)));
        }
        self.repos
            .iter()
            .find(|(repo, _)| repo.full_name == full_name)
            .map(|(_, languages)| languages.clone())
            .ok_or_else(|| SyncError::RemoteApi(format!("{} not found", full_name)))
    }
}

pub fn summary(name: &str) -> RepoSummary {
    RepoSummary {
        name: name.to_string(),
        full_name: format!("me/{}", name),
        url: format!("https://github.com/me/{}", name),
        description: Some(format!("The {} project", name)),
        created_at: Some("2024-01-10T09:00:00Z".to_string()),
        pushed_at: Some("2024-06-01T12:30:00Z".to_string()),
    }
}

/// Assertion helpers for test validation
#[allow(dead_code)]
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
