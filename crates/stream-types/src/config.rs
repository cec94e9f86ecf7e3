//! Configuration loading for the stream indexer.
//!
//! Layered config: defaults -> config file -> env vars (`INDEXER_*`) -> CLI flags.
//! The default config file lives at `~/.config/stream-indexer/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TypesError;

const APP_NAME: &str = "stream-indexer";

/// What a batch does when applying a single record fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplyErrorPolicy {
    /// Report the record as failed and keep going (default)
    #[default]
    SkipRecord,
    /// Roll back the whole batch on the first failure
    AbortBatch,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Shared storage mount; the index lives in `<mount_path>/index`
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Source table name, informational
    #[serde(default)]
    pub table_name: Option<String>,

    /// Index writer memory budget in megabytes
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Empty or absent for hash-only tables
    #[serde(default = "default_sort_key")]
    pub sort_key: Option<String>,

    /// String attributes indexed as exact-match keywords
    #[serde(default)]
    pub keyword_attributes: Vec<String>,

    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,

    #[serde(default = "default_max_query_limit")]
    pub max_query_limit: usize,

    #[serde(default)]
    pub apply_error_policy: ApplyErrorPolicy,

    /// Abort a batch that runs longer than this
    #[serde(default)]
    pub batch_time_budget_ms: Option<u64>,
}

fn default_mount_path() -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_partition_key() -> String {
    "PK".to_string()
}

fn default_sort_key() -> Option<String> {
    Some("SK".to_string())
}

fn default_query_limit() -> usize {
    10
}

fn default_max_query_limit() -> usize {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            log_level: default_log_level(),
            table_name: None,
            writer_memory_mb: default_writer_memory_mb(),
            partition_key: default_partition_key(),
            sort_key: default_sort_key(),
            keyword_attributes: Vec::new(),
            default_query_limit: default_query_limit(),
            max_query_limit: default_max_query_limit(),
            apply_error_policy: ApplyErrorPolicy::default(),
            batch_time_budget_ms: None,
        }
    }
}

fn config_err(e: config::ConfigError) -> TypesError {
    TypesError::Config(e.to_string())
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/stream-indexer/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (INDEXER_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        Self::load_with_env(cli_config_path, None)
    }

    /// Same as [`Settings::load`], reading environment variables from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        cli_config_path: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("mount_path", default_mount_path())
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .set_default("writer_memory_mb", default_writer_memory_mb() as i64)
            .map_err(config_err)?
            .set_default("partition_key", default_partition_key())
            .map_err(config_err)?
            .set_default("sort_key", "SK")
            .map_err(config_err)?
            .set_default("default_query_limit", default_query_limit() as i64)
            .map_err(config_err)?
            .set_default("max_query_limit", default_max_query_limit() as i64)
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // INDEXER_MOUNT_PATH, INDEXER_WRITER_MEMORY_MB, INDEXER_KEYWORD_ATTRIBUTES=a,b
        builder = builder.add_source(
            Environment::with_prefix("INDEXER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("keyword_attributes")
                .source(env),
        );

        let settings: Settings = builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.mount_path.trim().is_empty() {
            return Err(TypesError::Config("mount_path must not be empty".to_string()));
        }
        if self.partition_key.trim().is_empty() {
            return Err(TypesError::Config(
                "partition_key must not be empty".to_string(),
            ));
        }
        if self.writer_memory_mb == 0 {
            return Err(TypesError::Config("writer_memory_mb must be > 0".to_string()));
        }
        if self.default_query_limit == 0 || self.max_query_limit == 0 {
            return Err(TypesError::Config("query limits must be > 0".to_string()));
        }
        if self.default_query_limit > self.max_query_limit {
            return Err(TypesError::Config(format!(
                "default_query_limit {} exceeds max_query_limit {}",
                self.default_query_limit, self.max_query_limit
            )));
        }
        Ok(())
    }

    /// Directory holding the index files
    pub fn index_path(&self) -> PathBuf {
        self.expanded_mount_path().join("index")
    }

    /// Expand ~ in mount_path to the home directory
    pub fn expanded_mount_path(&self) -> PathBuf {
        if let Some(rest) = self.mount_path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(&self.mount_path)
    }
}
