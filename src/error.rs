//! Error types for the payroll engine.
//!
//! Every fallible operation returns [`EngineError`]. Each variant belongs to one
//! [`ErrorKind`], which decides how far a failure reaches: a validation error
//! aborts one employee, a computation error halts a whole batch.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{AdvanceState, PayPeriod, Subsidiary};

/// The category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input for one employee. The batch continues.
    Validation,
    /// Systemic configuration fault. The batch halts.
    Computation,
    /// A computation for the same employee and period is already running.
    Concurrency,
    /// The store failed to commit. Retried, then reported.
    Persistence,
    /// Configuration files are missing or unreadable.
    Configuration,
}

/// The main error type for the payroll engine.
///
/// # Example
///
/// ```
/// use payroll_engine::error::{EngineError, ErrorKind};
///
/// let error = EngineError::MissingTaxConfig { year: 2031 };
/// assert_eq!(error.to_string(), "No tax configuration for tax year 2031");
/// assert_eq!(error.kind(), ErrorKind::Validation);
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// No tax configuration exists for the pay period's tax year.
    #[error("No tax configuration for tax year {year}")]
    MissingTaxConfig {
        /// The tax year that was requested.
        year: i32,
    },

    /// The tax bracket table violates its structural invariants.
    #[error("Malformed tax brackets for tax year {year}: {message}")]
    MalformedBrackets {
        /// The tax year of the offending configuration.
        year: i32,
        /// What is wrong with the table.
        message: String,
    },

    /// The employee is not known to the directory.
    #[error("Employee not found: {employee_id}")]
    EmployeeNotFound {
        /// The unknown employee id.
        employee_id: String,
    },

    /// An employment term field is missing or inconsistent.
    #[error("Invalid employment field '{field}': {message}")]
    InvalidEmployment {
        /// The field that was invalid.
        field: String,
        /// A description of what made the field invalid.
        message: String,
    },

    /// No funding allocation is active on the pay period's closing date.
    #[error("Employee '{employee_id}' has no active funding allocation for {pay_period}")]
    NoActiveAllocations {
        /// The employee id.
        employee_id: String,
        /// The pay period.
        pay_period: PayPeriod,
    },

    /// A single allocation's level of effort is outside (0, 1].
    #[error("Allocation '{allocation_id}' has invalid level of effort {level_of_effort}")]
    InvalidLevelOfEffort {
        /// The allocation id.
        allocation_id: String,
        /// The offending fraction.
        level_of_effort: rust_decimal::Decimal,
    },

    /// Two active allocations share an id, so their records would share a key.
    #[error("Employee '{employee_id}' has more than one active allocation '{allocation_id}' in {pay_period}")]
    DuplicateAllocation {
        /// The employee id.
        employee_id: String,
        /// The repeated allocation id.
        allocation_id: String,
        /// The pay period.
        pay_period: PayPeriod,
    },

    /// Active allocations do not add up to 100% level of effort.
    #[error(
        "Level of effort for employee '{employee_id}' in {pay_period} sums to {total}, expected 1"
    )]
    LevelOfEffortMismatch {
        /// The employee id.
        employee_id: String,
        /// The pay period.
        pay_period: PayPeriod,
        /// The actual sum of the active fractions.
        total: rust_decimal::Decimal,
    },

    /// The routing table has no hub grant for a funding subsidiary.
    #[error("No hub grant configured for subsidiary {subsidiary}")]
    MissingHubGrant {
        /// The funding subsidiary without a route.
        subsidiary: Subsidiary,
    },

    /// No advance exists with the given id.
    #[error("Advance not found: {advance_id}")]
    AdvanceNotFound {
        /// The unknown advance id.
        advance_id: Uuid,
    },

    /// An advance state change is not allowed from its current state.
    #[error("Advance {advance_id} cannot move from {from} to {to}")]
    InvalidAdvanceTransition {
        /// The advance id.
        advance_id: Uuid,
        /// The current state.
        from: AdvanceState,
        /// The requested state.
        to: AdvanceState,
    },

    /// A regeneration would rewrite or drop an already settled advance.
    #[error("Advance {advance_id} is settled and cannot be changed by regeneration")]
    SettledAdvanceConflict {
        /// The settled advance id.
        advance_id: Uuid,
    },

    /// A computation for the same employee and period is already in flight.
    #[error("Payroll for employee '{employee_id}' in {pay_period} is already being computed")]
    ComputationInFlight {
        /// The employee id.
        employee_id: String,
        /// The pay period.
        pay_period: PayPeriod,
    },

    /// The store failed to commit a unit of work.
    #[error("Persistence failure: {message}")]
    PersistenceFailed {
        /// A description of the failure.
        message: String,
    },

    /// A general calculation error occurred.
    #[error("Calculation error: {message}")]
    CalculationError {
        /// A description of the calculation error.
        message: String,
    },
}

impl EngineError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ErrorKind::Configuration
            }
            EngineError::MalformedBrackets { .. } | EngineError::CalculationError { .. } => {
                ErrorKind::Computation
            }
            EngineError::ComputationInFlight { .. } => ErrorKind::Concurrency,
            EngineError::PersistenceFailed { .. } => ErrorKind::Persistence,
            EngineError::MissingTaxConfig { .. }
            | EngineError::EmployeeNotFound { .. }
            | EngineError::InvalidEmployment { .. }
            | EngineError::NoActiveAllocations { .. }
            | EngineError::InvalidLevelOfEffort { .. }
            | EngineError::LevelOfEffortMismatch { .. }
            | EngineError::DuplicateAllocation { .. }
            | EngineError::MissingHubGrant { .. }
            | EngineError::AdvanceNotFound { .. }
            | EngineError::InvalidAdvanceTransition { .. }
            | EngineError::SettledAdvanceConflict { .. } => ErrorKind::Validation,
        }
    }

    /// Returns a stable, machine-readable reason code for batch reports and API bodies.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            EngineError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            EngineError::MissingTaxConfig { .. } => "MISSING_TAX_CONFIG",
            EngineError::MalformedBrackets { .. } => "MALFORMED_BRACKETS",
            EngineError::EmployeeNotFound { .. } => "EMPLOYEE_NOT_FOUND",
            EngineError::InvalidEmployment { .. } => "INVALID_EMPLOYMENT",
            EngineError::NoActiveAllocations { .. } => "NO_ACTIVE_ALLOCATIONS",
            EngineError::InvalidLevelOfEffort { .. } => "INVALID_LEVEL_OF_EFFORT",
            EngineError::LevelOfEffortMismatch { .. } => "LOE_SUM_MISMATCH",
            EngineError::DuplicateAllocation { .. } => "DUPLICATE_ALLOCATION",
            EngineError::MissingHubGrant { .. } => "MISSING_HUB_GRANT",
            EngineError::AdvanceNotFound { .. } => "ADVANCE_NOT_FOUND",
            EngineError::InvalidAdvanceTransition { .. } => "INVALID_ADVANCE_TRANSITION",
            EngineError::SettledAdvanceConflict { .. } => "SETTLED_ADVANCE_CONFLICT",
            EngineError::ComputationInFlight { .. } => "COMPUTATION_IN_FLIGHT",
            EngineError::PersistenceFailed { .. } => "PERSISTENCE_FAILED",
            EngineError::CalculationError { .. } => "CALCULATION_ERROR",
        }
    }

    /// Returns true if this error must halt a batch run.
    pub fn is_fatal_to_batch(&self) -> bool {
        self.kind() == ErrorKind::Computation
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
