//! The tax configuration store.
//!
//! [`ConfigStore`] caches validated [`TaxConfig`]s per tax year in front of a
//! [`TaxConfigSource`]. The cache has no expiry: entries are dropped only by an
//! explicit invalidation, which [`ConfigStore::update_tax_config`] performs
//! before it returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{ResidencyClass, Subsidiary};

use super::types::{HealthWelfareRules, RoutingTable, TaxConfig};

/// Backing storage for per-year tax configuration.
pub trait TaxConfigSource: Send + Sync {
    /// Reads the configuration of a tax year. `Ok(None)` if the year is not configured.
    ///
    /// The returned configuration is not validated.
    fn load_tax_year(&self, year: i32) -> EngineResult<Option<TaxConfig>>;

    /// Writes the configuration of a tax year, replacing any previous one.
    fn save_tax_year(&self, config: &TaxConfig) -> EngineResult<()>;
}

/// A [`TaxConfigSource`] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTaxConfigSource {
    configs: RwLock<HashMap<i32, TaxConfig>>,
    loads: AtomicU64,
}

impl InMemoryTaxConfigSource {
    /// Creates a source holding the given configurations.
    pub fn new(configs: impl IntoIterator<Item = TaxConfig>) -> Self {
        Self {
            configs: RwLock::new(configs.into_iter().map(|c| (c.tax_year, c)).collect()),
            loads: AtomicU64::new(0),
        }
    }

    /// Replaces a year directly in the backing storage, bypassing any store.
    pub fn put(&self, config: TaxConfig) {
        self.configs.write().insert(config.tax_year, config);
    }

    /// Number of reads served so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl TaxConfigSource for InMemoryTaxConfigSource {
    fn load_tax_year(&self, year: i32) -> EngineResult<Option<TaxConfig>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.configs.read().get(&year).cloned())
    }

    fn save_tax_year(&self, config: &TaxConfig) -> EngineResult<()> {
        self.put(config.clone());
        Ok(())
    }
}

/// Versioned, explicitly invalidated access to payroll configuration.
///
/// Also holds the static routing and employer health-welfare tables, which do
/// not change at run time.
pub struct ConfigStore {
    source: Arc<dyn TaxConfigSource>,
    cache: RwLock<HashMap<i32, Arc<TaxConfig>>>,
    generation: AtomicU64,
    /// Serialises the read-bump-write of `update_tax_config`.
    update_lock: Mutex<()>,
    routing: RoutingTable,
    health_welfare: HealthWelfareRules,
}

impl ConfigStore {
    /// Creates a store over a tax configuration source and the static tables.
    pub fn new(
        source: Arc<dyn TaxConfigSource>,
        routing: RoutingTable,
        health_welfare: HealthWelfareRules,
    ) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            update_lock: Mutex::new(()),
            routing,
            health_welfare,
        }
    }

    /// Returns the validated configuration for a tax year.
    ///
    /// # Errors
    ///
    /// - `MissingTaxConfig` if the source has no configuration for the year
    /// - `MalformedBrackets` if the stored configuration breaks the bracket invariants
    pub fn tax_config(&self, year: i32) -> EngineResult<Arc<TaxConfig>> {
        if let Some(config) = self.cache.read().get(&year) {
            return Ok(Arc::clone(config));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let config = self
            .source
            .load_tax_year(year)?
            .ok_or(EngineError::MissingTaxConfig { year })?;
        if config.tax_year != year {
            return Err(EngineError::CalculationError {
                message: format!(
                    "tax config stored for {} declares tax year {}",
                    year, config.tax_year
                ),
            });
        }
        config.validate()?;
        let config = Arc::new(config);

        let mut cache = self.cache.write();
        // An invalidation raced with the load; hand out the fresh read but do not cache it.
        if self.generation.load(Ordering::Acquire) == generation {
            cache.insert(year, Arc::clone(&config));
            debug!(tax_year = year, version = config.version, "Cached tax configuration");
        }
        Ok(config)
    }

    /// Validates and stores a new configuration for its tax year.
    ///
    /// The version is set one above the previously stored version. The cached
    /// entry for the year is invalidated before this returns, so every later
    /// calculation sees the new brackets.
    pub fn update_tax_config(&self, mut config: TaxConfig) -> EngineResult<Arc<TaxConfig>> {
        config.validate()?;
        let _update = self.update_lock.lock();
        let previous = self
            .source
            .load_tax_year(config.tax_year)?
            .map(|c| c.version)
            .unwrap_or(0);
        config.version = previous + 1;
        self.source.save_tax_year(&config)?;
        self.invalidate(config.tax_year);
        info!(
            tax_year = config.tax_year,
            version = config.version,
            "Tax configuration updated"
        );
        Ok(Arc::new(config))
    }

    /// Drops the cached configuration of one tax year.
    pub fn invalidate(&self, year: i32) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.remove(&year);
    }

    /// Drops every cached tax year.
    pub fn invalidate_all(&self) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.clear();
    }

    /// Tax years currently held in the cache, ascending.
    pub fn cached_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.cache.read().keys().copied().collect();
        years.sort_unstable();
        years
    }

    /// Number of invalidations performed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The subsidiary to hub-grant routing table.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Employer health-welfare multiplier for a subsidiary and residency class.
    pub fn employer_health_welfare_multiplier(
        &self,
        subsidiary: Subsidiary,
        residency_class: ResidencyClass,
    ) -> Decimal {
        self.health_welfare
            .employer_multiplier(subsidiary, residency_class)
    }
}
