use crate::error::{FormularyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Where drug records are read from and written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local `drugs.json` in the formulary home.
    #[default]
    File,
    /// Hosted PostgREST-style backend at `url`.
    Rest,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for Backend {
    type Err = FormularyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(Backend::File),
            "rest" => Ok(Backend::Rest),
            other => Err(FormularyError::Config(format!(
                "Unknown backend '{}' (expected 'file' or 'rest')",
                other
            ))),
        }
    }
}

/// Configuration for formulary, stored in `<home>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormularyConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the hosted backend (e.g. `https://xyz.example.co`)
    #[serde(default)]
    pub url: Option<String>,

    /// Public API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    /// Table holding `(id, role)` profile rows
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,

    /// Remote procedure returning distinct categories
    #[serde(default = "default_categories_rpc")]
    pub categories_rpc: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    "drugs".to_string()
}

fn default_profiles_table() -> String {
    "profiles_drugcupsabot".to_string()
}

fn default_categories_rpc() -> String {
    "get_unique_categories".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FormularyConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: None,
            api_key: None,
            table: default_table(),
            profiles_table: default_profiles_table(),
            categories_rpc: default_categories_rpc(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Keys accepted by `formulary config <key> [value]`.
pub const CONFIG_KEYS: [&str; 8] = [
    "backend",
    "url",
    "api-key",
    "table",
    "profiles-table",
    "categories-rpc",
    "page-size",
    "timeout-secs",
];

impl FormularyConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(FormularyError::Io)?;
        let config: FormularyConfig =
            serde_json::from_str(&content).map_err(FormularyError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(FormularyError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(FormularyError::Serialization)?;
        fs::write(config_path, content).map_err(FormularyError::Io)?;
        Ok(())
    }

    /// Apply `FORMULARY_URL` / `FORMULARY_API_KEY` style overrides.
    pub fn with_overrides(mut self, url: Option<String>, api_key: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.url = Some(url);
            self.backend = Backend::Rest;
        }
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "backend" => self.backend.to_string(),
            "url" => self.url.clone().unwrap_or_default(),
            "api-key" => self.api_key.clone().unwrap_or_default(),
            "table" => self.table.clone(),
            "profiles-table" => self.profiles_table.clone(),
            "categories-rpc" => self.categories_rpc.clone(),
            "page-size" => self.page_size.to_string(),
            "timeout-secs" => self.timeout_secs.to_string(),
            other => return Err(FormularyError::Config(format!("Unknown config key: {}", other))),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend" => self.backend = value.parse()?,
            "url" => self.url = Some(value.trim_end_matches('/').to_string()),
            "api-key" => self.api_key = Some(value.to_string()),
            "table" => self.table = value.to_string(),
            "profiles-table" => self.profiles_table = value.to_string(),
            "categories-rpc" => self.categories_rpc = value.to_string(),
            "page-size" => {
                self.page_size = match value.parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        return Err(FormularyError::Config(format!(
                            "page-size must be a positive integer, got '{}'",
                            value
                        )))
                    }
                }
            }
            "timeout-secs" => {
                self.timeout_secs = value.parse().map_err(|_| {
                    FormularyError::Config(format!("timeout-secs must be an integer, got '{}'", value))
                })?
            }
            other => return Err(FormularyError::Config(format!("Unknown config key: {}", other))),
        }
        Ok(())
    }
}
