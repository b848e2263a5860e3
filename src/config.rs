//! Configuration file support
//!
//! Handles parsing of `oep-upload.toml`, the per-environment overlay
//! `oep-upload.<env>.toml` and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "oep-upload.toml";

/// Environment variable selecting the environment profile (dev, test, prod)
pub const ENV_PROFILE: &str = "OEP_ENV";

/// Environment variable for the API base URL
pub const ENV_API_URL: &str = "OEP_API_URL";

/// Environment variable for the API token
pub const ENV_API_TOKEN: &str = "OEP_API_TOKEN";

/// Environment variable for the request timeout in seconds
pub const ENV_API_TIMEOUT: &str = "OEP_API_TIMEOUT";

/// Environment variable for the upload batch size
pub const ENV_BATCH_SIZE: &str = "OEP_UPLOAD_BATCH_SIZE";

/// Environment variable enabling dry runs
pub const ENV_DRY_RUN: &str = "OEP_UPLOAD_DRY_RUN";

/// Environment variable for the default schema
pub const ENV_DEFAULT_SCHEMA: &str = "OEP_DEFAULT_SCHEMA";

/// Environment variable overriding the data directory
pub const ENV_DATA_ROOT: &str = "OEP_DATA_ROOT";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Config file is not valid TOML or has wrong types
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Settings are syntactically fine but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Environment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Prod,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!(
                "Unknown environment: {}. Use 'dev', 'test' or 'prod'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Test => write!(f, "test"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// Remote API configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    /// Base URL including the API version prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Token sent as `Authorization: Token <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Optional HTTP basic auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Optional HTTP basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/v0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
            username: None,
            password: None,
        }
    }
}

/// Upload behaviour section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSection {
    /// Maximum rows per POST
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Validate and batch without writing
    #[serde(default)]
    pub dry_run: bool,

    /// Schema used for identifiers without a `schema.` prefix
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Total attempts per batch on server errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base; attempt `n` waits `retry_base_delay ** n` seconds
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: f64,

    /// Strings treated as NULL (case-insensitive, after trimming)
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,
}

fn default_batch_size() -> usize {
    500
}

fn default_schema() -> String {
    "model_draft".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay() -> f64 {
    1.5
}

pub fn default_null_tokens() -> Vec<String> {
    ["", "null", "none", "na", "nan", "n/a"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dry_run: false,
            default_schema: default_schema(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
            null_tokens: default_null_tokens(),
        }
    }
}

/// Filesystem layout section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Project root (relative to the config directory)
    #[serde(default = "default_root")]
    pub root: String,

    /// Data directory (relative to the root) that resource paths resolve against
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Manifest (`datapackage.json`), relative to the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datapackage_file: Option<String>,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            data_dir: default_data_dir(),
            datapackage_file: None,
        }
    }
}

/// Main configuration structure
///
/// Represents the `oep-upload.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Environment profile
    #[serde(default)]
    pub env: Environment,

    /// Remote API configuration
    #[serde(default)]
    pub api: ApiSection,

    /// Upload configuration
    #[serde(default)]
    pub upload: UploadSection,

    /// Filesystem configuration
    #[serde(default)]
    pub paths: PathsSection,
}

impl Settings {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory.
    ///
    /// Reads `oep-upload.toml` (if present), merges `oep-upload.<env>.toml`
    /// over it, applies environment variable overrides and validates.
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let mut merged = read_toml_table(&config_dir.join(CONFIG_FILENAME))?;

        let env_name = match std::env::var(ENV_PROFILE) {
            Ok(value) => value.parse::<Environment>().map_err(ConfigError::Invalid)?,
            Err(_) => match merged.get("env").and_then(toml::Value::as_str) {
                Some(value) => value.parse::<Environment>().map_err(ConfigError::Invalid)?,
                None => Environment::default(),
            },
        };
        let overlay_path = config_dir.join(format!("oep-upload.{}.toml", env_name));
        deep_merge(&mut merged, read_toml_table(&overlay_path)?);

        let mut settings: Settings = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        settings.env = env_name;

        // Relative roots are anchored at the config directory
        if Path::new(&settings.paths.root).is_relative() {
            settings.paths.root = config_dir.join(&settings.paths.root).display().to_string();
        }

        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Convert configuration to a TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; a numeric variable that does not
    /// parse is an error naming the variable
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }

        if let Some(token) = lookup(ENV_API_TOKEN)
            && !token.trim().is_empty()
        {
            self.api.token = Some(token);
        }

        if let Some(timeout) = lookup(ENV_API_TIMEOUT) {
            self.api.timeout_secs = parse_env_number(ENV_API_TIMEOUT, &timeout)?;
        }

        if let Some(size) = lookup(ENV_BATCH_SIZE) {
            self.upload.batch_size = parse_env_number(ENV_BATCH_SIZE, &size)?;
        }

        if let Some(flag) = lookup(ENV_DRY_RUN) {
            self.upload.dry_run = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(schema) = lookup(ENV_DEFAULT_SCHEMA)
            && !schema.trim().is_empty()
        {
            self.upload.default_schema = schema;
        }

        if let Some(data_root) = lookup(ENV_DATA_ROOT) {
            self.paths.data_dir = data_root;
        }
        Ok(())
    }

    /// Reject settings the uploader cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".into()));
        }
        if self.upload.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "upload.batch_size must be greater than zero".into(),
            ));
        }
        if self.upload.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "upload.max_retries must be at least 1".into(),
            ));
        }
        if !self.upload.retry_base_delay.is_finite() || self.upload.retry_base_delay < 0.0 {
            return Err(ConfigError::Invalid(
                "upload.retry_base_delay must be a non-negative number".into(),
            ));
        }
        if self.upload.default_schema.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "upload.default_schema must not be empty".into(),
            ));
        }
        if self.env == Environment::Prod && self.effective_token().is_none() {
            return Err(ConfigError::Invalid(format!(
                "{} is required in production",
                ENV_API_TOKEN
            )));
        }
        Ok(())
    }

    /// Token, if one is configured and non-empty
    pub fn effective_token(&self) -> Option<&str> {
        self.api
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Project root directory
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.root)
    }

    /// Directory that relative resource paths are resolved against
    pub fn data_root(&self) -> PathBuf {
        let data_dir = Path::new(&self.paths.data_dir);
        if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            self.root_dir().join(data_dir)
        }
    }

    /// Configured manifest path, if any
    pub fn datapackage_path(&self) -> Option<PathBuf> {
        self.paths.datapackage_file.as_ref().map(|p| {
            let path = Path::new(p);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.root_dir().join(path)
            }
        })
    }
}

fn read_toml_table(path: &Path) -> ConfigResult<toml::Table> {
    if !path.exists() {
        return Ok(toml::Table::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

fn parse_env_number<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("{} must be a non-negative integer, got '{}'", name, value))
    })
}

/// Merge `overlay` into `base`, recursing into nested tables
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    deep_merge(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# oep-upload configuration
# Values can be overridden per environment in oep-upload.<env>.toml
# and by OEP_* environment variables.

env = "dev"

[api]
# Base URL of the table API, including the version prefix
base_url = "http://127.0.0.1:8000/api/v0"
timeout_secs = 30
# Prefer the OEP_API_TOKEN environment variable over storing tokens here
# token = ""

[upload]
batch_size = 500
dry_run = false
default_schema = "model_draft"
# Total attempts per batch on 5xx or connection errors
max_retries = 5
# Attempt n waits retry_base_delay ** n seconds
retry_base_delay = 1.5
null_tokens = ["", "null", "none", "na", "nan", "n/a"]

[paths]
root = "."
data_dir = "data"
# datapackage_file = "datapackage.json"
"#
}
