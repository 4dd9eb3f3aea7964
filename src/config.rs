//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (FRAGCORE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [storage]
//! data_dir = "./data"
//!
//! [chase]
//! max_iterations = 100
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! FRAGCORE_STORAGE__DATA_DIR=/custom/path
//! FRAGCORE_CHASE__MAX_ITERATIONS=50
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chase: ChaseConfig,
    #[serde(default)]
    pub derivation: DerivationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage layout configuration: where the three databases and the
/// two text inputs for a run live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for a run's working files (fs.db, fo.db, chase.db, rules.txt, C.txt, ...)
    pub data_dir: PathBuf,

    /// File name of the Fs (server) database within `data_dir`
    #[serde(default = "default_fs_name")]
    pub fs_file: String,

    /// File name of the Fo (owner) database within `data_dir`
    #[serde(default = "default_fo_name")]
    pub fo_file: String,

    /// File name of the Chase database within `data_dir`
    #[serde(default = "default_chase_name")]
    pub chase_file: String,

    /// File name of the rule input within `data_dir`
    #[serde(default = "default_rules_name")]
    pub rules_file: String,

    /// File name of the sensitive-root input within `data_dir`
    #[serde(default = "default_roots_name")]
    pub roots_file: String,
}

fn default_fs_name() -> String { "fs.db".to_string() }
fn default_fo_name() -> String { "fo.db".to_string() }
fn default_chase_name() -> String { "chase.db".to_string() }
fn default_rules_name() -> String { "rules.txt".to_string() }
fn default_roots_name() -> String { "C.txt".to_string() }

impl StorageConfig {
    pub fn fs_path(&self) -> PathBuf { self.data_dir.join(&self.fs_file) }
    pub fn fo_path(&self) -> PathBuf { self.data_dir.join(&self.fo_file) }
    pub fn chase_path(&self) -> PathBuf { self.data_dir.join(&self.chase_file) }
    pub fn rules_path(&self) -> PathBuf { self.data_dir.join(&self.rules_file) }
    pub fn roots_path(&self) -> PathBuf { self.data_dir.join(&self.roots_file) }
    pub fn graphs_path(&self) -> PathBuf { self.data_dir.join("graphs.txt") }
    pub fn paths_path(&self) -> PathBuf { self.data_dir.join("paths.txt") }
    pub fn union_greedy_path(&self) -> PathBuf { self.data_dir.join("union_greedy.txt") }
    pub fn report_path(&self) -> PathBuf { self.data_dir.join("report.json") }
}

/// Chase engine tuning (C4)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaseConfig {
    /// Safety cap on chase rounds, guarding against a misconfigured rule set (§4.4)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize { 100 }

impl Default for ChaseConfig {
    fn default() -> Self {
        ChaseConfig { max_iterations: default_max_iterations() }
    }
}

/// Derivation-graph builder tuning (C5)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationConfig {
    /// Depth cap for backward expansion, guarding against pathological blowup (§4.5)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize { 64 }

impl Default for DerivationConfig {
    fn default() -> Self {
        DerivationConfig { max_depth: default_max_depth() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level() }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (FRAGCORE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("FRAGCORE_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path, with env overrides still applied
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("FRAGCORE_").split("__"))
            .extract()
    }

    /// Build a configuration rooted at an arbitrary working directory, useful for
    /// tests and for the driver binary which is handed a directory on the command line.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            storage: StorageConfig {
                data_dir: data_dir.into(),
                fs_file: default_fs_name(),
                fo_file: default_fo_name(),
                chase_file: default_chase_name(),
                rules_file: default_rules_name(),
                roots_file: default_roots_name(),
            },
            chase: ChaseConfig::default(),
            derivation: DerivationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::for_data_dir("./data")
    }
}
