//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file given with `--config`
//! 3. Environment variables: `PMERKLE_*` prefix, `__` between nested keys
//!    (`PMERKLE_PERFORMANCE__MAX_CONCURRENCY=8`, `PMERKLE_DATA=a,b,c`)
//! 4. Command line flags

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::data::StringData;
use crate::hash::TreeHasher;
use crate::merkle::TreeBuilder;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PMERKLE";

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`.
    pub verbosity_level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            verbosity_level: "info".into(),
        }
    }
}

/// Performance knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PerformanceSettings {
    /// Upper bound on concurrent hashing workers.
    pub max_concurrency: u32,
    /// Lease engines and buffers from pools instead of allocating them.
    pub reuse_buffer_allocation: bool,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 1000,
            reuse_buffer_allocation: true,
        }
    }
}

/// Effective settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Hash algorithm identifier.
    pub hash: String,
    /// Sort the leaf level and each digest pair before hashing.
    pub sort: bool,
    /// Items to commit, in order.
    pub data: Vec<String>,
    /// Logging.
    pub log: LogSettings,
    /// Performance.
    pub performance: PerformanceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hash: "sha256".into(),
            sort: true,
            data: Vec::new(),
            log: LogSettings::default(),
            performance: PerformanceSettings::default(),
        }
    }
}

/// Values given explicitly on the command line; `None` keeps the layered
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--hash`
    pub hash: Option<String>,
    /// `--sort`
    pub sort: Option<bool>,
    /// `--data`
    pub data: Option<Vec<String>>,
    /// `--log-level`
    pub log_level: Option<String>,
    /// `--max-concurrency`
    pub max_concurrency: Option<u32>,
    /// `--reuse-buffer-allocation`
    pub reuse_buffer_allocation: Option<bool>,
}

impl Settings {
    /// Loads defaults, then `path`, then the process environment, then
    /// `overrides`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(path, None, overrides)
    }

    /// Same as [`Settings::load`], reading environment variables from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
        overrides: &Overrides,
    ) -> Result<Self> {
        // Missing keys fall back to the serde defaults above.
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("data")
                .source(env),
        );

        builder = builder
            .set_override_option("hash", overrides.hash.clone())?
            .set_override_option("sort", overrides.sort)?
            .set_override_option("data", overrides.data.clone())?
            .set_override_option("log.verbosity_level", overrides.log_level.clone())?
            .set_override_option(
                "performance.max_concurrency",
                overrides.max_concurrency.map(i64::from),
            )?
            .set_override_option(
                "performance.reuse_buffer_allocation",
                overrides.reuse_buffer_allocation,
            )?;

        let config = builder.build().with_context(|| match path {
            Some(path) => format!("unable to read configuration file {}", path.display()),
            None => "unable to read configuration".to_string(),
        })?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Hasher described by `hash`, `sort` and `performance.reuse_buffer_allocation`.
    pub fn hasher(&self) -> crate::Result<TreeHasher> {
        TreeHasher::from_name(
            &self.hash,
            self.sort,
            self.performance.reuse_buffer_allocation,
        )
    }

    /// Tree builder configured from these settings.
    pub fn tree_builder(&self) -> crate::Result<TreeBuilder> {
        Ok(TreeBuilder::new()
            .with_hasher(self.hasher()?)
            .with_max_concurrency(self.performance.max_concurrency as usize))
    }

    /// Configured items.
    pub fn items(&self) -> Vec<StringData> {
        self.data.iter().map(StringData::new).collect()
    }

    /// Parsed log level.
    pub fn log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log.verbosity_level).with_context(|| {
            format!(
                "unable to parse log level '{}'",
                self.log.verbosity_level
            )
        })
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize config")
    }
}
