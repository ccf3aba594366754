//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_CACHE__URI`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub docs_dir: String,
    pub extension: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { docs_dir: "data/docs".to_string(), extension: "txt".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub uri: String,
    pub table: String,
    pub prune_stale: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { uri: "data/emb_cache".to_string(), table: "embeddings".to_string(), prune_stale: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub fake_dim: usize,
    pub batch_size: usize,
    /// Provider call timeout in seconds; 0 disables the limit.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, fake_dim: 384, batch_size: 64, timeout_secs: 120 }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Probe at startup; accelerated when available, exact otherwise.
    #[default]
    Auto,
    Accelerated,
    Exact,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: BackendPreference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub preview_chars: usize,
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5, preview_chars: 200, synonyms: BTreeMap::new() }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".to_string()));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be > 0".to_string()));
        }
        if self.cache.table.trim().is_empty() {
            return Err(Error::InvalidConfig("cache.table must not be empty".to_string()));
        }
        if self.embedding.use_fake && self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn docs_dir(&self) -> PathBuf {
        expand_path(&self.data.docs_dir)
    }

    pub fn cache_uri(&self) -> String {
        expand_path(&self.cache.uri).to_string_lossy().into_owned()
    }

    pub fn model_dir(&self) -> Option<PathBuf> {
        self.embedding.model_dir.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_apply_without_files() {
        Jail::expect_with(|_jail| {
            let settings = Config::load_for_env("test").map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.embedding.timeout(), Some(Duration::from_secs(120)));
            Ok(())
        });
    }

    #[test]
    fn env_file_and_vars_layer_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[cache]\ntable = \"base\"\n[search]\ntop_k = 7\n")?;
            jail.create_file("config.prod.toml", "[cache]\ntable = \"prod\"\n")?;
            jail.set_env("APP_EMBEDDING__BATCH_SIZE", "8");
            jail.set_env("APP_INDEX__BACKEND", "exact");
            let settings = Config::load_for_env("prod").map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings.cache.table, "prod");
            assert_eq!(settings.search.top_k, 7);
            assert_eq!(settings.embedding.batch_size, 8);
            assert_eq!(settings.index.backend, BackendPreference::Exact);
            Ok(())
        });
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[embedding]\nbatch_size = 0\n")?;
            assert!(matches!(Config::load_for_env("dev"), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }
}
