//! Run-level configuration file.
//!
//! ```toml
//! fallback_dir = "fallbacks"
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//!
//! [reference]
//! subdivisions = "reference/subdivisions.csv"
//! countries = "reference/countries.csv"
//!
//! [resolver]
//! fuzzy_ignore = ["unknown"]
//!
//! [datasets.acled]
//! path = "data/acled.csv"
//! source = "ACLED"
//!
//! [datasets.acled.schema]
//! admin_columns = ["iso3"]
//! date_column = "event_date"
//!
//! [[datasets.acled.schema.groups]]
//! columns = ["events"]
//! reducer = { kind = "sum" }
//! ```
//!
//! Relative paths are resolved against the directory of the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hdx_aggregate::RowSchema;
use hdx_match::ResolverConfig;
use hdx_reference::{AdminIndex, load_reference};
use serde::Deserialize;
use tracing::Level;

use crate::fallback::FallbackStore;
use crate::logging::{LogConfig, LogFormat};

/// Environment variable overriding the configuration directory.
pub const CONFIG_ENV_VAR: &str = "HDX_CONFIG_DIR";

/// File name of the run configuration inside the configuration directory.
pub const RUN_CONFIG_FILE: &str = "run.toml";

/// Configuration directory.
///
/// Resolution order:
/// 1. `HDX_CONFIG_DIR` environment variable
/// 2. `config/` relative to the working directory
pub fn config_root() -> PathBuf {
    if let Ok(root) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(root);
    }
    PathBuf::from("config")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// CSV with `iso3,pcode,name` columns.
    pub subdivisions: Option<PathBuf>,
    /// Optional CSV with `iso3,iso2,name,code_length,regions` columns.
    pub countries: Option<PathBuf>,
}

/// `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub timestamps: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            timestamps: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = self
            .level
            .parse::<Level>()
            .with_context(|| format!("invalid log level '{}'", self.level))?;
        Ok(LogConfig::default()
            .with_level(level)
            .with_format(self.format)
            .with_timestamps(self.timestamps)
            .with_log_file(self.file.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    /// Headed CSV holding the dataset rows.
    pub path: PathBuf,
    /// Publisher cited for every indicator of the dataset.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub schema: RowSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub resolver: ResolverConfig,
    pub reference: ReferenceConfig,
    pub fallback_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub datasets: BTreeMap<String, DatasetConfig>,
}

impl RunConfig {
    /// Parses a configuration. Schemas without a name take their table key.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text).context("parse run configuration")?;
        for (name, dataset) in &mut config.datasets {
            if dataset.schema.name.is_empty() {
                dataset.schema.name.clone_from(name);
            }
        }
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read run configuration {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("load run configuration {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Loads `run.toml` from [`config_root`].
    pub fn load_default() -> Result<Self> {
        Self::from_path(&config_root().join(RUN_CONFIG_FILE))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let rebase = |path: &mut PathBuf| *path = base.join(&*path);
        if let Some(path) = &mut self.reference.subdivisions {
            rebase(path);
        }
        if let Some(path) = &mut self.reference.countries {
            rebase(path);
        }
        if let Some(path) = &mut self.fallback_dir {
            rebase(path);
        }
        if let Some(path) = &mut self.logging.file {
            rebase(path);
        }
        for dataset in self.datasets.values_mut() {
            rebase(&mut dataset.path);
        }
    }

    /// Loads and freezes the reference data.
    pub fn build_index(&self) -> Result<AdminIndex> {
        let subdivisions = self
            .reference
            .subdivisions
            .as_deref()
            .context("no subdivision reference file configured ([reference] subdivisions)")?;
        let data = load_reference(subdivisions, self.reference.countries.as_deref())
            .with_context(|| format!("load reference data {}", subdivisions.display()))?;
        AdminIndex::build(data).context("build admin index")
    }

    /// Fallback snapshots, or an empty store when no directory is configured.
    pub fn fallback_store(&self) -> Result<FallbackStore> {
        match &self.fallback_dir {
            Some(dir) => FallbackStore::from_dir(dir),
            None => Ok(FallbackStore::new()),
        }
    }
}
