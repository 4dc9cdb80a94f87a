//! Clarity - Personal Project Tracker
//!
//! Clarity keeps track of your software projects by combining two sources:
//! objective facts imported from GitHub and subjective metadata you assign.
//!
//! ## Core Features
//!
//! - **Concurrent Import**: Repository and language data fetched by a bounded worker pool
//! - **Transient Retry**: Network failures retried with a fixed delay, API errors degrade per repository
//! - **Merge on Read**: Project views rebuilt from both stores on every load
//! - **Filtering and Sorting**: Typed per-field matching policies and enumeration-aware ordering
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`github`]: GitHub API integration and authentication
//! - [`fetcher`]: Concurrent language fetching
//! - [`importer`]: The import pipeline
//! - [`repository`]: Merged project access
//! - [`query`]: Filtering and sorting

pub mod config;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod importer;
pub mod project;
pub mod query;
pub mod repository;
pub mod retry;
pub mod store;

pub use config::Config;
pub use error::{ErrorKind, SyncError};
pub use fetcher::LanguageFetcher;
pub use github::{ClientFactory, GitHubClient, GitHubClientFactory, RemoteClient, RepoSummary};
pub use importer::{ImportPipeline, ImportSummary};
pub use project::{Project, ProjectMetadata, RepositoryRecord};
pub use query::{ListQuery, SortKey, SortOrder};
pub use repository::ProjectRepository;
pub use retry::RetryPolicy;
pub use store::{MetadataStore, RecordStore};
