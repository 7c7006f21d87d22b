//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for building a
//! [`ConfigStore`] from a directory of YAML files, and the
//! [`YamlTaxConfigSource`] that reads and writes per-year tax files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::error::{EngineError, EngineResult};

use super::store::{ConfigStore, TaxConfigSource};
use super::types::{HealthWelfareRules, RoutingTable, TaxConfig};

/// Loads payroll configuration from a directory.
///
/// # Directory Structure
///
/// ```text
/// config/
/// ├── routing.yaml          # Subsidiary → hub grant
/// ├── health_welfare.yaml   # Employer health-welfare rules
/// └── tax/
///     └── 2025.yaml         # One file per tax year
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let store = ConfigLoader::load("./config")?;
/// let tax = store.tax_config(2025)?;
/// println!("Brackets for 2025: {}", tax.brackets.len());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the configuration directory into a [`ConfigStore`].
    ///
    /// Every tax year file is parsed and validated up front, so a malformed
    /// bracket table is reported at start-up rather than mid-run.
    ///
    /// # Errors
    ///
    /// - `ConfigNotFound` if a required file or the `tax` directory is missing
    /// - `ConfigParseError` if a file contains invalid YAML
    /// - `MalformedBrackets` if a tax year breaks the bracket invariants
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<ConfigStore> {
        let path = path.as_ref();

        let routing = load_yaml::<RoutingTable>(&path.join("routing.yaml"))?;
        let health_welfare = load_yaml::<HealthWelfareRules>(&path.join("health_welfare.yaml"))?;

        let source = YamlTaxConfigSource::new(path.join("tax"));
        let years = source.validate_all()?;
        info!(
            config_dir = %path.display(),
            tax_years = ?years,
            "Loaded payroll configuration"
        );

        Ok(ConfigStore::new(Arc::new(source), routing, health_welfare))
    }
}

/// Loads and parses a YAML file.
fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let path_str = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
        path: path_str.clone(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
        path: path_str,
        message: e.to_string(),
    })
}

/// Tax configuration stored as one YAML file per year (`<dir>/<year>.yaml`).
#[derive(Debug, Clone)]
pub struct YamlTaxConfigSource {
    dir: PathBuf,
}

impl YamlTaxConfigSource {
    /// Creates a source over a directory of `<year>.yaml` files.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn year_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("{}.yaml", year))
    }

    /// Parses and validates every year file, returning the years found.
    fn validate_all(&self) -> EngineResult<Vec<i32>> {
        let dir_str = self.dir.display().to_string();
        let entries = fs::read_dir(&self.dir).map_err(|_| EngineError::ConfigNotFound {
            path: dir_str.clone(),
        })?;

        let mut years = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: dir_str.clone(),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                let config = load_yaml::<TaxConfig>(&path)?;
                config.validate()?;
                years.push(config.tax_year);
            }
        }

        if years.is_empty() {
            return Err(EngineError::ConfigNotFound {
                path: format!("{} (no tax year files found)", dir_str),
            });
        }
        years.sort_unstable();
        Ok(years)
    }
}

impl TaxConfigSource for YamlTaxConfigSource {
    fn load_tax_year(&self, year: i32) -> EngineResult<Option<TaxConfig>> {
        let path = self.year_path(year);
        if !path.exists() {
            return Ok(None);
        }
        load_yaml(&path).map(Some)
    }

    fn save_tax_year(&self, config: &TaxConfig) -> EngineResult<()> {
        let yaml = serde_yaml::to_string(config).map_err(|e| EngineError::PersistenceFailed {
            message: format!("cannot serialise tax year {}: {}", config.tax_year, e),
        })?;
        let path = self.year_path(config.tax_year);
        // Readers only ever see the old file or the complete new one.
        let staged = path.with_extension("yaml.tmp");
        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&staged, yaml))
            .and_then(|_| fs::rename(&staged, &path))
            .map_err(|e| EngineError::PersistenceFailed {
                message: format!("cannot write tax year {}: {}", config.tax_year, e),
            })
    }
}
