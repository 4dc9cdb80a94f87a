use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Clarity
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory for project data
    #[serde(default = "default_data_directory")]
    pub data_directory: String,

    /// Directory of imported repository records (defaults to `<data_directory>/projects`)
    #[serde(default)]
    pub projects_directory: Option<String>,

    /// Directory of user metadata files (defaults to `<data_directory>/metadata`)
    #[serde(default)]
    pub metadata_directory: Option<String>,

    /// GitHub authentication settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Import behavior settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "token_file", "env", "gh_cli"

    /// JSON file holding `{"api_key": "..."}`
    #[serde(default = "default_token_file")]
    pub token_file: String,

    /// Connect and read timeout for API requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Import configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImportConfig {
    /// Number of workers fetching language breakdowns
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Total attempts per API call on network errors
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_data_directory() -> String {
    "~/.clarity".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_token_file() -> String {
    "~/.clarityrc".to_string()
}
fn default_request_timeout() -> u64 {
    5
}
fn default_pool_size() -> usize {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            token_file: default_token_file(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("clarity").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.data_directory = shellexpand::full(&self.data_directory)
            .context("Failed to expand data_directory path")?
            .into_owned();

        if let Some(dir) = &self.projects_directory {
            self.projects_directory = Some(
                shellexpand::full(dir)
                    .context("Failed to expand projects_directory path")?
                    .into_owned(),
            );
        }

        if let Some(dir) = &self.metadata_directory {
            self.metadata_directory = Some(
                shellexpand::full(dir)
                    .context("Failed to expand metadata_directory path")?
                    .into_owned(),
            );
        }

        self.github.token_file = shellexpand::full(&self.github.token_file)
            .context("Failed to expand token_file path")?
            .into_owned();

        Ok(())
    }

    /// Reject settings the import pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.import.pool_size == 0 {
            anyhow::bail!("import.pool_size must be at least 1");
        }
        if self.import.max_attempts == 0 {
            anyhow::bail!("import.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.projects_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.data_directory).join("projects"))
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.metadata_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.data_directory).join("metadata"))
    }

    pub fn token_file(&self) -> PathBuf {
        PathBuf::from(&self.github.token_file)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.github.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.import.retry_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            projects_directory: None,
            metadata_directory: None,
            github: GitHubConfig::default(),
            import: ImportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
