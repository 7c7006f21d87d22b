//! Application state for the payroll engine API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use crate::config::ConfigStore;
use crate::engine::{EngineSettings, InMemoryEmployeeDirectory, InMemoryPayrollStore, PayrollEngine};

/// Shared application state.
///
/// Holds the engine and the in-memory employee directory that
/// `PUT /employees/:employee_id` feeds.
#[derive(Clone)]
pub struct AppState {
    engine: PayrollEngine,
    directory: Arc<InMemoryEmployeeDirectory>,
}

impl AppState {
    /// Creates a state with an empty directory and an in-memory payroll store.
    pub fn new(config: ConfigStore, settings: EngineSettings) -> Self {
        let directory = Arc::new(InMemoryEmployeeDirectory::default());
        let engine = PayrollEngine::new(
            Arc::new(config),
            directory.clone(),
            Arc::new(InMemoryPayrollStore::new()),
            settings,
        );
        Self { engine, directory }
    }

    /// Returns the payroll engine.
    pub fn engine(&self) -> &PayrollEngine {
        &self.engine
    }

    /// Returns the employee directory.
    pub fn directory(&self) -> &InMemoryEmployeeDirectory {
        &self.directory
    }
}
