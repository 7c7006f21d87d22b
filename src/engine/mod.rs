//! The payroll engine and its collaborators.
//!
//! - [`compute_records`] turns an employee snapshot into payroll records
//! - [`detect_advances`] raises inter-subsidiary advances for those records
//! - [`PayrollStore`] persists a record set and its advances as one unit
//! - [`PayrollEngine`] runs single employees and bulk batches
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use payroll_engine::config::ConfigLoader;
//! use payroll_engine::engine::{
//!     BatchControl, EngineSettings, InMemoryEmployeeDirectory, InMemoryPayrollStore,
//!     PayrollEngine,
//! };
//! use payroll_engine::models::PayPeriod;
//!
//! # async fn run() -> Result<(), payroll_engine::error::EngineError> {
//! let engine = PayrollEngine::new(
//!     Arc::new(ConfigLoader::load("./config")?),
//!     Arc::new(InMemoryEmployeeDirectory::default()),
//!     Arc::new(InMemoryPayrollStore::new()),
//!     EngineSettings::default(),
//! );
//! let period: PayPeriod = "2025-03".parse().unwrap();
//! let batch = engine
//!     .compute_bulk_payroll(vec!["emp_001".to_string()], period, &BatchControl::new())
//!     .await;
//! println!("{:?}", batch.summary());
//! # Ok(())
//! # }
//! ```

mod advances;
mod batch;
mod directory;
mod payroll;
mod plan;
mod store;

pub use advances::{detect_advances, to_previews};
pub use batch::{BatchControl, BatchFailure, BatchResult, BatchSummary};
pub use directory::{EmployeeDirectory, InMemoryEmployeeDirectory};
pub use payroll::{EngineSettings, PayrollEngine, RetryPolicy};
pub use plan::{LEVEL_OF_EFFORT_TOLERANCE, compute_records, validate_allocations};
pub use store::{InMemoryPayrollStore, Invalidation, PayrollCommit, PayrollStore};
