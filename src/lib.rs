//! Payroll and Thai Income Tax Engine
//!
//! This crate computes monthly payroll for employees whose salary is split
//! across funding allocations: gross and net salary per allocation, statutory
//! deductions, income tax under the Thai progressive schedule and 13th-month
//! accrual. It raises inter-subsidiary advances when an allocation is funded
//! by a subsidiary other than the employer.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;

#[cfg(test)]
mod test_support;
