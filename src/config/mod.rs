//! Configuration loading and management for the payroll engine.
//!
//! This module loads tax brackets and settings per tax year, the subsidiary to
//! hub-grant routing table and the employer health-welfare rules, and serves
//! them through the explicitly invalidated [`ConfigStore`].
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let store = ConfigLoader::load("./config").unwrap();
//! println!("Tax year 2025 version: {}", store.tax_config(2025).unwrap().version);
//! ```

mod loader;
mod store;
mod types;

pub use loader::{ConfigLoader, YamlTaxConfigSource};
pub use store::{ConfigStore, InMemoryTaxConfigSource, TaxConfigSource};
pub use types::{
    EmployerHealthWelfareRule, HealthWelfareRules, RoutingTable, TaxBracket, TaxConfig,
    TaxSettings,
};
