//! GitHub access for the importer
//!
//! The [`RemoteClient`] trait is the seam the importer talks through; the
//! octocrab-backed [`GitHubClient`] is the production implementation.
//! Token resolution lives here too.

use async_trait::async_trait;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::project::LanguageBreakdown;

/// The subset of a GitHub repository the importer keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub pushed_at: Option<String>,
}

/// Read-only view of the hosting API used by the importer.
///
/// Implementations never retry; callers wrap calls in a
/// [`RetryPolicy`](crate::retry::RetryPolicy).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Every repository owned by the authenticated identity
    async fn list_repositories(&self) -> Result<Vec<RepoSummary>>;

    /// Byte count per language for `owner/name`, largest first
    async fn language_breakdown(&self, full_name: &str) -> Result<LanguageBreakdown>;
}

/// Builds independent [`RemoteClient`] instances, one per worker
pub trait ClientFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteClient>>;
}

/// GitHub client backed by octocrab
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::build(token, timeout, None)
    }

    /// Point the client at a different API root (GitHub Enterprise, test servers)
    pub fn with_base_uri(token: &str, timeout: Duration, base_uri: &str) -> Result<Self> {
        Self::build(token, timeout, Some(base_uri))
    }

    fn build(token: &str, timeout: Duration, base_uri: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .add_retry_config(RetryConfig::None)
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout));

        if let Some(uri) = base_uri {
            builder = builder
                .base_uri(uri)
                .map_err(|e| SyncError::Config(format!("Invalid GitHub base URI {}: {}", uri, e)))?;
        }

        let client = builder
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteClient for GitHubClient {
    async fn list_repositories(&self) -> Result<Vec<RepoSummary>> {
        debug!("Fetching repositories for the authenticated user");

        let mut repositories = Vec::new();
        let mut page = 1u8;

        loop {
            let page_repos = self
                .client
                .current()
                .list_repos_for_authenticated_user()
                .per_page(100)
                .page(page)
                .send()
                .await?;

            let items = page_repos.items;
            if items.is_empty() {
                break;
            }

            repositories.extend(items.into_iter().map(|repo| RepoSummary {
                full_name: repo.full_name.clone().unwrap_or_else(|| repo.name.clone()),
                url: repo
                    .html_url
                    .as_ref()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| repo.url.to_string()),
                description: repo.description.clone(),
                created_at: repo.created_at.map(|t| t.to_rfc3339()),
                pushed_at: repo.pushed_at.map(|t| t.to_rfc3339()),
                name: repo.name,
            }));

            // GitHub API pagination limit for u8
            if page == u8::MAX {
                warn!("Reached maximum pagination limit (255 pages)");
                break;
            }
            page += 1;
        }

        info!("Found {} repositories", repositories.len());
        Ok(repositories)
    }

    async fn language_breakdown(&self, full_name: &str) -> Result<LanguageBreakdown> {
        let route = format!("/repos/{}/languages", full_name);
        let languages: LanguageBreakdown = self.client.get(route, None::<&()>).await?;
        debug!("{}: {} languages", full_name, languages.len());
        Ok(languages)
    }
}

/// Creates a fresh octocrab client for every worker
#[derive(Debug, Clone)]
pub struct GitHubClientFactory {
    token: String,
    timeout: Duration,
    base_uri: Option<String>,
}

impl GitHubClientFactory {
    pub fn new(token: String, timeout: Duration) -> Self {
        Self {
            token,
            timeout,
            base_uri: None,
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }
}

impl ClientFactory for GitHubClientFactory {
    fn connect(&self) -> Result<Box<dyn RemoteClient>> {
        let client = match &self.base_uri {
            Some(uri) => GitHubClient::with_base_uri(&self.token, self.timeout, uri)?,
            None => GitHubClient::new(&self.token, self.timeout)?,
        };
        Ok(Box::new(client))
    }
}

/// GitHub authentication strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Token stored in the Clarity token file
    TokenFile,
    /// Use environment variable token
    EnvironmentToken,
    /// Use GitHub CLI authentication
    GitHubCLI,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    api_key: String,
}

/// Resolve the API token according to `github.auth_method`
pub fn resolve_token(config: &Config) -> Result<(AuthStrategy, String)> {
    let token_file = config.token_file();

    match config.github.auth_method.as_str() {
        "auto" => {
            if let Ok(token) = read_token_file(&token_file) {
                Ok((AuthStrategy::TokenFile, token))
            } else if let Ok(token) = try_environment_token() {
                Ok((AuthStrategy::EnvironmentToken, token))
            } else if let Ok(token) = try_github_cli() {
                Ok((AuthStrategy::GitHubCLI, token))
            } else {
                Err(SyncError::Credential(format!(
                    "No GitHub token found. Please either:\n\
                     1. Run: clarity auth --token <TOKEN> (writes {})\n\
                     2. Set GITHUB_TOKEN environment variable\n\
                     3. Install and authenticate GitHub CLI: gh auth login",
                    token_file.display()
                )))
            }
        }
        "token_file" => read_token_file(&token_file).map(|t| (AuthStrategy::TokenFile, t)),
        "env" => try_environment_token().map(|t| (AuthStrategy::EnvironmentToken, t)),
        "gh_cli" => try_github_cli().map(|t| (AuthStrategy::GitHubCLI, t)),
        other => Err(SyncError::Config(format!("Unknown auth method: {}", other))),
    }
}

/// Persist a token so later runs resolve it without prompting
pub fn store_token(path: &Path, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SyncError::Credential("Refusing to store an empty token".to_string()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SyncError::persistence("create directory", parent, e))?;
    }

    let content = serde_json::to_string_pretty(&TokenFile {
        api_key: token.to_string(),
    })
    .map_err(|e| SyncError::persistence("serialize", path, e))?;

    std::fs::write(path, content).map_err(|e| SyncError::persistence("write", path, e))?;
    info!("Stored GitHub token in {}", path.display());
    Ok(())
}

fn read_token_file(path: &Path) -> Result<String> {
    debug!("Attempting token file authentication: {}", path.display());

    let content =
        std::fs::read_to_string(path).map_err(|e| SyncError::persistence("read", path, e))?;
    let parsed: TokenFile =
        serde_json::from_str(&content).map_err(|e| SyncError::persistence("parse", path, e))?;

    let token = parsed.api_key.trim().to_string();
    if token.is_empty() {
        return Err(SyncError::Credential(format!("{} holds an empty api_key", path.display())));
    }
    Ok(token)
}

fn try_environment_token() -> Result<String> {
    debug!("Attempting environment variable authentication");

    let token = env::var("GITHUB_TOKEN")
        .map_err(|_| SyncError::Credential("GITHUB_TOKEN environment variable not set".into()))?;

    if token.is_empty() {
        return Err(SyncError::Credential("GITHUB_TOKEN is empty".into()));
    }

    if !token.starts_with("ghp_") && !token.starts_with("gho_") && !token.starts_with("github_pat_")
    {
        warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected ghp_, gho_ or github_pat_)");
    }

    Ok(token)
}

fn try_github_cli() -> Result<String> {
    debug!("Attempting GitHub CLI authentication");

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .map_err(|e| SyncError::Credential(format!("GitHub CLI (gh) is not available: {}", e)))?;

    if !output.status.success() {
        return Err(SyncError::Credential(format!(
            "Failed to retrieve token from GitHub CLI: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(SyncError::Credential("GitHub CLI returned empty token".into()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::with_base_uri("ghp_test", Duration::from_secs(5), &server.uri())
            .expect("client")
    }

    #[tokio::test]
    async fn test_language_breakdown_keeps_api_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/me/app/languages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"TypeScript": 900, "CSS": 40, "HTML": 12}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let languages = client_for(&server).language_breakdown("me/app").await.unwrap();

        let keys: Vec<&str> = languages.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["TypeScript", "CSS", "HTML"]);
        assert_eq!(languages["CSS"], 40);
    }

    #[tokio::test]
    async fn test_api_rejection_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/me/secret/languages"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).language_breakdown("me/secret").await.unwrap_err();
        assert_matches!(err, SyncError::RemoteApi(_));
    }

    fn closed_port_uri() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let uri = closed_port_uri();
        let client = GitHubClient::with_base_uri("ghp_test", Duration::from_secs(1), &uri).unwrap();

        let err = client.language_breakdown("me/app").await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {:?}", err);

        let err = client.list_repositories().await.unwrap_err();
        assert_matches!(err, SyncError::TransientNetwork(_));
    }

    #[tokio::test]
    async fn test_list_repositories_walks_pages() {
        let server = MockServer::start().await;
        let repo = serde_json::json!({
            "id": 1,
            "node_id": "R_1",
            "name": "clarity",
            "full_name": "me/clarity",
            "url": "https://api.github.com/repos/me/clarity",
            "html_url": "https://github.com/me/clarity",
            "description": "Project tracker",
            "created_at": "2023-05-01T12:00:00Z",
            "pushed_at": "2024-01-02T08:30:00Z"
        });

        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([repo])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories().await.unwrap();

        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "clarity");
        assert_eq!(repos[0].full_name, "me/clarity");
        assert_eq!(repos[0].url, "https://github.com/me/clarity");
        assert_eq!(repos[0].description.as_deref(), Some("Project tracker"));
        assert!(repos[0].created_at.as_deref().unwrap().starts_with("2023-05-01T12:00:00"));
    }

    #[test]
    fn test_store_and_read_token_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".clarityrc");

        store_token(&path, "  ghp_abc123  ").unwrap();
        assert_eq!(read_token_file(&path).unwrap(), "ghp_abc123");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"api_key\""));
    }

    #[test]
    fn test_store_empty_token_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = store_token(&temp_dir.path().join("rc"), "   ").unwrap_err();
        assert_matches!(err, SyncError::Credential(_));
    }

    #[test]
    #[serial]
    fn test_resolve_token_prefers_token_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".clarityrc");
        store_token(&path, "ghp_from_file").unwrap();

        let mut config = Config::default();
        config.github.token_file = path.to_string_lossy().into_owned();
        env::set_var("GITHUB_TOKEN", "ghp_from_env");

        let (strategy, token) = resolve_token(&config).unwrap();
        assert_eq!(strategy, AuthStrategy::TokenFile);
        assert_eq!(token, "ghp_from_file");

        config.github.auth_method = "env".to_string();
        let (strategy, token) = resolve_token(&config).unwrap();
        assert_eq!(strategy, AuthStrategy::EnvironmentToken);
        assert_eq!(token, "ghp_from_env");

        env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn test_unknown_auth_method() {
        let mut config = Config::default();
        config.github.auth_method = "carrier-pigeon".to_string();
        assert_matches!(resolve_token(&config), Err(SyncError::Config(_)));

        config.github.auth_method = "token".to_string();
        assert_matches!(resolve_token(&config), Err(SyncError::Config(_)));
    }
}
