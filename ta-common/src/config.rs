//! Configuration loading
//!
//! Each setting is resolved with the priority order:
//! 1. Command-line argument (applied by the binary after resolution)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_CATALOG_FILE: &str = "public/data/categories.json";
pub const DEFAULT_GENERATIVE_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_GENERATIVE_MODEL: &str = "grok-3";
pub const DEFAULT_GENERATIVE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MARKET_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TRACKAURA_CONFIG";

/// Generative API settings as written in TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerativeSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Market-data API settings as written in TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarketSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Managed backend settings as written in TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendSection {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_key: Option<String>,
}

/// Contents of `config.toml`; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub dev_mode: Option<bool>,
    pub public_dir: Option<PathBuf>,
    /// `backend`, `request`, an `http(s)://` URL or a file path
    pub catalog: Option<String>,
    pub live_teasers: Option<bool>,
    pub alpha_vantage_api_key: Option<String>,
    #[serde(default)]
    pub generative: GenerativeSection,
    #[serde(default)]
    pub market: MarketSection,
    #[serde(default)]
    pub backend: BackendSection,
}

/// Where the category catalog is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSetting {
    /// Local JSON file
    File(PathBuf),
    /// Absolute URL of the JSON file
    Url(String),
    /// `<proto>://<host>/data/categories.json` derived from each request
    FromRequest,
    /// `categories` and `items` tables in the managed backend
    Backend,
}

impl CatalogSetting {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("backend") {
            CatalogSetting::Backend
        } else if raw.eq_ignore_ascii_case("request") {
            CatalogSetting::FromRequest
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            CatalogSetting::Url(raw.to_string())
        } else {
            CatalogSetting::File(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub service_key: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct TrackAuraConfig {
    pub bind: String,
    pub dev_mode: bool,
    pub public_dir: PathBuf,
    pub catalog: CatalogSetting,
    pub live_teasers: bool,
    pub alpha_vantage_api_key: Option<String>,
    pub generative: GenerativeConfig,
    pub market: MarketConfig,
    /// `None` when the backend URL or anon key is missing
    pub backend: Option<BackendConfig>,
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Interpret common truthy spellings
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn first_valid(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| is_valid_key(value))
        .map(|value| value.trim().to_string())
}

impl TrackAuraConfig {
    /// Resolve configuration from a TOML config and an environment lookup
    ///
    /// `env` returns the value of an environment variable; production code
    /// passes [`std::env::var`], tests pass a fixed map.
    pub fn resolve<F>(toml: &TomlConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = first_valid([env("TRACKAURA_BIND"), toml.bind.clone()])
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let dev_mode = env("TRACKAURA_DEV_MODE")
            .map(|v| parse_flag(&v))
            .or(toml.dev_mode)
            .unwrap_or(false);

        let live_teasers = env("TRACKAURA_LIVE_TEASERS")
            .map(|v| parse_flag(&v))
            .or(toml.live_teasers)
            .unwrap_or(false);

        let public_dir = env("TRACKAURA_PUBLIC_DIR")
            .filter(|v| is_valid_key(v))
            .map(PathBuf::from)
            .or_else(|| toml.public_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR));

        let catalog = first_valid([env("TRACKAURA_CATALOG"), toml.catalog.clone()])
            .map(|raw| CatalogSetting::parse(&raw))
            .unwrap_or_else(|| CatalogSetting::File(PathBuf::from(DEFAULT_CATALOG_FILE)));

        let generative = GenerativeConfig {
            api_key: first_valid([
                env("TRACKAURA_GENERATIVE_API_KEY"),
                env("GROK_API_KEY"),
                toml.generative.api_key.clone(),
            ]),
            base_url: first_valid([
                env("TRACKAURA_GENERATIVE_BASE_URL"),
                toml.generative.base_url.clone(),
            ])
            .unwrap_or_else(|| DEFAULT_GENERATIVE_BASE_URL.to_string()),
            model: first_valid([env("TRACKAURA_GENERATIVE_MODEL"), toml.generative.model.clone()])
                .unwrap_or_else(|| DEFAULT_GENERATIVE_MODEL.to_string()),
            timeout: Duration::from_secs(
                toml.generative
                    .timeout_secs
                    .unwrap_or(DEFAULT_GENERATIVE_TIMEOUT_SECS),
            ),
        };

        let market = MarketConfig {
            base_url: first_valid([env("TRACKAURA_MARKET_BASE_URL"), toml.market.base_url.clone()])
                .unwrap_or_else(|| DEFAULT_MARKET_BASE_URL.to_string()),
            api_key: first_valid([env("TRACKAURA_MARKET_API_KEY"), toml.market.api_key.clone()]),
        };

        let backend_url = first_valid([env("TRACKAURA_BACKEND_URL"), toml.backend.url.clone()]);
        let anon_key = first_valid([
            env("TRACKAURA_BACKEND_ANON_KEY"),
            toml.backend.anon_key.clone(),
        ]);
        let service_key = first_valid([
            env("TRACKAURA_BACKEND_SERVICE_KEY"),
            toml.backend.service_key.clone(),
        ]);
        let backend = match (backend_url, anon_key) {
            (Some(url), Some(anon_key)) => Some(BackendConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                service_key,
            }),
            _ => None,
        };

        let alpha_vantage_api_key = first_valid([
            env("ALPHA_VANTAGE_API_KEY"),
            toml.alpha_vantage_api_key.clone(),
        ]);

        Self {
            bind,
            dev_mode,
            public_dir,
            catalog,
            live_teasers,
            alpha_vantage_api_key,
            generative,
            market,
            backend,
        }
    }

    /// Load the TOML file (if any) and resolve against the process environment
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let toml = match resolve_config_path(cli_config_path) {
            Some(path) => load_toml_config(&path)?,
            None => {
                info!("No config file found, using environment and defaults");
                TomlConfig::default()
            }
        };

        let config = Self::resolve(&toml, |name| std::env::var(name).ok());
        config.log_summary();
        Ok(config)
    }

    /// Log which optional integrations are active, never the keys themselves
    pub fn log_summary(&self) {
        info!(
            bind = %self.bind,
            dev_mode = self.dev_mode,
            catalog = ?self.catalog,
            live_teasers = self.live_teasers,
            "Configuration resolved"
        );
        if self.generative.api_key.is_none() {
            if self.dev_mode {
                info!("Generative API key not configured: generic items use dev mock data");
            } else {
                warn!("Generative API key not configured: generic item lookups will fail");
            }
        }
        if self.backend.is_none() {
            warn!("Backend URL/anon key not configured: sign-in and watchlist endpoints disabled");
        }
    }
}

/// Locate the TOML config file
///
/// Priority: explicit path, then `TRACKAURA_CONFIG`, then the platform
/// config directory (`~/.config/trackaura/config.toml` on Linux) if present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if is_valid_key(&path) {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("trackaura").join("config.toml"))
        .filter(|path| path.exists())
}

/// Read and parse a TOML config file
///
/// A missing file logs a warning and yields defaults; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}
