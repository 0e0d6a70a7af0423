use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use sharc_api::supabase::SupabaseOptions;
use sharc_api::tmdb::TmdbOptions;
use sharc_api::traits::SortKey;

use crate::error::SharcError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Environment variables that override secrets from the config file.
pub const ENV_TMDB_API_KEY: &str = "SHARC_TMDB_API_KEY";
pub const ENV_SUPABASE_URL: &str = "SHARC_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SHARC_SUPABASE_ANON_KEY";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub browse: BrowseConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub api_key: String,
    pub base_url: String,
    pub image_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub table: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub remote_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    pub min_vote_count: u32,
    /// One of `rating`, `release-date`, `title`.
    pub default_sort: String,
    pub new_releases_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub preview_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Also write a daily-rotated log file under the data dir.
    pub file: bool,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults,
    /// then environment overrides.
    pub fn load() -> Result<Self, SharcError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self, SharcError> {
        let mut merged: toml::Value =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| SharcError::Config(e.to_string()))?;

        if path.exists() {
            let user_str = std::fs::read_to_string(path)?;
            let user: toml::Value =
                toml::from_str(&user_str).map_err(|e| SharcError::Config(e.to_string()))?;
            merge(&mut merged, user);
        }

        merged
            .try_into()
            .map_err(|e: toml::de::Error| SharcError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), SharcError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SharcError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SharcError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace secrets with values from `lookup` where present and non-empty.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_TMDB_API_KEY) {
            self.catalog.api_key = v;
        }
        if let Some(v) = get(ENV_SUPABASE_URL) {
            self.backend.url = v;
        }
        if let Some(v) = get(ENV_SUPABASE_ANON_KEY) {
            self.backend.anon_key = v;
        }
    }

    pub fn tmdb_options(&self) -> TmdbOptions {
        TmdbOptions {
            api_key: self.catalog.api_key.clone(),
            base_url: self.catalog.base_url.clone(),
            image_base_url: self.catalog.image_base_url.clone(),
            timeout: Duration::from_secs(self.catalog.timeout_secs),
        }
    }

    pub fn supabase_options(&self) -> SupabaseOptions {
        SupabaseOptions {
            url: self.backend.url.clone(),
            anon_key: self.backend.anon_key.clone(),
            table: self.backend.table.clone(),
            timeout: Duration::from_secs(self.backend.timeout_secs),
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.store.remote_timeout_secs.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    /// Configured default sort, falling back to rating when unrecognized.
    pub fn default_sort(&self) -> SortKey {
        SortKey::from_short_str(&self.browse.default_sort).unwrap_or_else(|| {
            tracing::warn!(value = %self.browse.default_sort, "Unknown default_sort, using rating");
            SortKey::RatingDesc
        })
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Directory for log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "sharc")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
