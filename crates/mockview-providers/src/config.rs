//! Configuration loading and collaborator factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mockview_core::engine::EngineConfig;
use mockview_core::traits::{AnswerAnalyzer, AuthBackend};

use crate::auth::HttpAuthBackend;
use crate::http::HttpAnalyzer;
use crate::mock::{MockAnalyzer, MockAuthBackend, DEFAULT_MOCK_SCORE};

/// Which answer analyzer to use.
///
/// `Debug` output masks the API key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalyzerConfig {
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    Mock {
        #[serde(default = "default_mock_score")]
        score: u8,
        /// Keyword → score overrides.
        #[serde(default)]
        keywords: BTreeMap<String, u8>,
    },
}

impl std::fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .finish(),
            AnalyzerConfig::Mock { score, keywords } => f
                .debug_struct("Mock")
                .field("score", score)
                .field("keywords", keywords)
                .finish(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig::Mock {
            score: default_mock_score(),
            keywords: BTreeMap::new(),
        }
    }
}

fn default_mock_score() -> u8 {
    DEFAULT_MOCK_SCORE
}

/// Which authentication backend to use.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Http {
        base_url: String,
    },
    Mock {
        /// Require this password; any non-empty password when unset.
        #[serde(default)]
        password: Option<String>,
    },
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::Http { base_url } => {
                f.debug_struct("Http").field("base_url", base_url).finish()
            }
            AuthConfig::Mock { password } => f
                .debug_struct("Mock")
                .field("password", &password.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::Mock { password: None }
    }
}

/// Top-level mockview configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockviewConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Automatic retries after a failed analysis attempt.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Backoff multiplier between retries.
    #[serde(default = "default_retry_factor")]
    pub retry_factor: u32,
    /// Cap on any single retry delay in milliseconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
    /// Per-attempt analysis timeout in seconds.
    #[serde(default = "default_timeout")]
    pub analysis_timeout_secs: u64,
    /// Question set file or directory; the built-in set when unset.
    #[serde(default)]
    pub question_sets: Option<PathBuf>,
    /// Where session snapshots are saved.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    /// Where the login token is kept between runs.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

fn default_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    500
}
fn default_retry_factor() -> u32 {
    2
}
fn default_max_retry_delay() -> u64 {
    10_000
}
fn default_timeout() -> u64 {
    10
}
fn default_session_dir() -> PathBuf {
    PathBuf::from("./mockview-sessions")
}

impl Default for MockviewConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            auth: AuthConfig::default(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            retry_factor: default_retry_factor(),
            max_retry_delay_ms: default_max_retry_delay(),
            analysis_timeout_secs: default_timeout(),
            question_sets: None,
            session_dir: default_session_dir(),
            token_path: None,
        }
    }
}

impl MockviewConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
            retry_factor: self.retry_factor.max(1),
            max_retry_delay: Duration::from_millis(self.max_retry_delay_ms),
            analysis_timeout: Duration::from_secs(self.analysis_timeout_secs.max(1)),
        }
    }

    /// The token file: configured path, else under the user config directory.
    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            dirs_path()
                .map(|dir| dir.join("token.json"))
                .unwrap_or_else(|| PathBuf::from(".mockview-token.json"))
        })
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_analyzer_config(config: &AnalyzerConfig) -> AnalyzerConfig {
    match config {
        AnalyzerConfig::Http { base_url, api_key } => AnalyzerConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_key: api_key
                .as_ref()
                .map(|k| resolve_env_vars(k))
                .filter(|k| !k.is_empty()),
        },
        AnalyzerConfig::Mock { .. } => config.clone(),
    }
}

fn resolve_auth_config(config: &AuthConfig) -> AuthConfig {
    match config {
        AuthConfig::Http { base_url } => AuthConfig::Http {
            base_url: resolve_env_vars(base_url),
        },
        AuthConfig::Mock { password } => AuthConfig::Mock {
            password: password.as_ref().map(|p| resolve_env_vars(p)),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `mockview.toml` in the current directory
/// 2. `~/.config/mockview/config.toml`
///
/// Environment variable overrides: `MOCKVIEW_API_URL` points both the analyzer
/// and authentication at an HTTP backend; `MOCKVIEW_API_KEY` sets the analyzer
/// API key.
pub fn load_config() -> Result<MockviewConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MockviewConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("mockview.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MockviewConfig::default(),
    };

    Ok(apply_env_overrides(
        config,
        std::env::var("MOCKVIEW_API_URL").ok(),
        std::env::var("MOCKVIEW_API_KEY").ok(),
    ))
}

/// Parse a TOML config string and resolve `${VAR}` references.
pub fn parse_config(content: &str) -> Result<MockviewConfig> {
    let mut config: MockviewConfig = toml::from_str(content)?;
    config.analyzer = resolve_analyzer_config(&config.analyzer);
    config.auth = resolve_auth_config(&config.auth);
    Ok(config)
}

fn apply_env_overrides(
    mut config: MockviewConfig,
    api_url: Option<String>,
    api_key: Option<String>,
) -> MockviewConfig {
    if let Some(url) = api_url.filter(|u| !u.is_empty()) {
        let existing_key = match &config.analyzer {
            AnalyzerConfig::Http { api_key, .. } => api_key.clone(),
            AnalyzerConfig::Mock { .. } => None,
        };
        config.analyzer = AnalyzerConfig::Http {
            base_url: url.clone(),
            api_key: existing_key,
        };
        config.auth = AuthConfig::Http { base_url: url };
    }

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        if let AnalyzerConfig::Http { api_key, .. } = &mut config.analyzer {
            *api_key = Some(key);
        }
    }

    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("mockview"))
}

/// Create an analyzer from its configuration.
///
/// `timeout` bounds each HTTP request; pass the engine's per-attempt timeout.
pub fn create_analyzer(
    config: &AnalyzerConfig,
    timeout: Duration,
) -> Result<Arc<dyn AnswerAnalyzer>> {
    match config {
        AnalyzerConfig::Http { base_url, api_key } => {
            if base_url.is_empty() {
                anyhow::bail!("analyzer base_url is empty");
            }
            Ok(Arc::new(HttpAnalyzer::with_timeout(
                base_url,
                api_key.clone(),
                timeout,
            )?))
        }
        AnalyzerConfig::Mock { score, keywords } => {
            let analyzer = keywords
                .iter()
                .fold(MockAnalyzer::with_fixed_score(*score), |a, (k, s)| {
                    a.with_keyword(k, *s)
                });
            Ok(Arc::new(analyzer))
        }
    }
}

/// Create an authentication backend from its configuration.
pub fn create_auth_backend(config: &AuthConfig) -> Result<Arc<dyn AuthBackend>> {
    match config {
        AuthConfig::Http { base_url } => {
            if base_url.is_empty() {
                anyhow::bail!("auth base_url is empty");
            }
            Ok(Arc::new(HttpAuthBackend::new(base_url)?))
        }
        AuthConfig::Mock { password } => {
            let backend = match password {
                Some(p) if !p.is_empty() => MockAuthBackend::new().with_password(p),
                _ => MockAuthBackend::new(),
            };
            Ok(Arc::new(backend))
        }
    }
}
