//! Core data models for the payroll engine.
//!
//! This module contains all the domain models used throughout the engine.

mod advance;
mod employee;
mod employment;
mod pay_period;
mod payroll_record;

pub use advance::{AdvancePreview, AdvanceState, InterSubsidiaryAdvance};
pub use employee::{Employee, FilerProfile, MaritalStatus, ResidencyClass, Subsidiary};
pub use employment::{
    AllocationType, EmployeeSnapshot, EmploymentTerm, FundingAllocation, MAX_MONTHLY_AMOUNT,
    PeriodAdjustment,
};
pub use pay_period::{InvalidPayPeriod, PayPeriod};
pub use payroll_record::{
    AuditStep, Deductions, EmployerContributions, PayrollRecord, PayrollResult, RecordKey,
    RetirementFundKind,
};
