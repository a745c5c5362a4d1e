use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_ORACLE_ENDPOINT, DEFAULT_PAGE_SIZE,
    DEFAULT_USER_AGENT,
};
use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "names-sync.toml";

/// Process-wide configuration, built once at startup and handed to each adapter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub oracle: OracleConfig,
    pub list: ListConfig,
    pub credentials: Credentials,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub metrics: MetricsConfig,
    /// Legacy archival export settings. Parsed so old config files keep
    /// loading, never acted upon.
    pub object_store: Option<ObjectStoreConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `.json` row export, or a libSQL URL / database path
    pub dsn: Option<String>,
    pub auth_token: Option<String>,
    /// Overrides the built-in aggregation query
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub requests_per_minute: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            requests_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub endpoint: Option<String>,
    pub identity_endpoint: Option<String>,
    pub page_size: u32,
    pub requests_per_minute: Option<u64>,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            identity_endpoint: None,
            page_size: DEFAULT_PAGE_SIZE,
            requests_per_minute: None,
        }
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Configured directory, or `~/.namessync`
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".namessync")
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub pushgateway_url: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Config {
    /// Read the TOML file (explicit path, else `names-sync.toml` if present,
    /// else defaults) and overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay environment variables. The older `VLIZ_*` names are accepted
    /// when the `NAMESSYNC_*` equivalent is unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(v) = var(&["NAMESSYNC_SOURCE_DSN"]) {
            self.source.dsn = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_SOURCE_AUTH_TOKEN"]) {
            self.source.auth_token = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_ORACLE_ENDPOINT"]) {
            self.oracle.endpoint = v;
        }
        if let Some(v) = var(&["NAMESSYNC_LIST_ENDPOINT", "VLIZ_ENDPOINT"]) {
            self.list.endpoint = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_IDENTITY_ENDPOINT", "VLIZ_JWT_ENDPOINT"]) {
            self.list.identity_endpoint = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_USERNAME", "VLIZ_USER"]) {
            self.credentials.username = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_PASSWORD", "VLIZ_PASSWORD"]) {
            self.credentials.password = Some(v);
        }
        if let Some(v) = var(&["NAMESSYNC_CACHE_DIR"]) {
            self.cache.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var(&["NAMESSYNC_PUSHGATEWAY_URL"]) {
            self.metrics.pushgateway_url = Some(v);
        }

        let s3 = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let region = s3("S3_REGION");
        let endpoint = s3("S3_ENDPOINT");
        let access_key_id = s3("S3_ACCESS_ID");
        let secret_access_key = s3("S3_SECRET_KEY");
        if region.is_some() || endpoint.is_some() || access_key_id.is_some() {
            let store = self.object_store.get_or_insert_with(ObjectStoreConfig::default);
            store.region = region.or(store.region.take());
            store.endpoint = endpoint.or(store.endpoint.take());
            store.access_key_id = access_key_id.or(store.access_key_id.take());
            store.secret_access_key = secret_access_key.or(store.secret_access_key.take());
        }
    }

    /// Check everything `sync` needs before any network traffic
    pub fn validate_for_sync(&self) -> Result<()> {
        let mut missing = self.missing_list_options();
        missing.extend(self.missing_source_options());
        Self::report_missing(missing)
    }

    pub fn validate_for_list(&self) -> Result<()> {
        Self::report_missing(self.missing_list_options())
    }

    pub fn validate_for_source(&self) -> Result<()> {
        Self::report_missing(self.missing_source_options())
    }

    fn missing_list_options(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.list.endpoint.is_none() {
            missing.push("list.endpoint (NAMESSYNC_LIST_ENDPOINT)");
        }
        if self.list.identity_endpoint.is_none() {
            missing.push("list.identity_endpoint (NAMESSYNC_IDENTITY_ENDPOINT)");
        }
        if self.credentials.username.is_none() {
            missing.push("credentials.username (NAMESSYNC_USERNAME)");
        }
        if self.credentials.password.is_none() {
            missing.push("credentials.password (NAMESSYNC_PASSWORD)");
        }
        if self.list.page_size == 0 {
            missing.push("list.page_size (must be positive)");
        }
        missing
    }

    fn missing_source_options(&self) -> Vec<&'static str> {
        if self.source.dsn.is_none() {
            vec!["source.dsn (NAMESSYNC_SOURCE_DSN)"]
        } else {
            Vec::new()
        }
    }

    fn report_missing(missing: Vec<&'static str>) -> Result<()> {
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "missing required options: {}",
                missing.join(", ")
            )))
        }
    }
}
