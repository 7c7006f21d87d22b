//! Calculation logic for the payroll engine.
//!
//! This module contains the pure calculation functions: income tax under the
//! progressive schedule, monthly base salary with probation pro-ration and the
//! annual increment, allocation weighting, 13th-month accrual, the statutory
//! deductions, and the rounding and apportionment helpers shared by them.
//! Every calculator returns its figures together with an [`AuditStep`](crate::models::AuditStep).

mod allocation_salary;
mod deductions;
mod money;
mod tax;

pub use allocation_salary::{
    ANNUAL_INCREMENT_RATE, ANNUAL_INCREMENT_SERVICE_DAYS, AllocationSalaryResult,
    MonthlyBaseResult, THIRTEENTH_MONTH_SERVICE_MONTHS, ThirteenthMonthResult,
    compute_allocation_salary, compute_monthly_base, compute_thirteenth_month_accrual,
};
pub use deductions::{
    HEALTH_WELFARE_LOWER_THRESHOLD, HEALTH_WELFARE_UPPER_THRESHOLD, HealthWelfareResult,
    RetirementFundResult, SocialSecurityResult, compute_health_welfare, compute_retirement_fund,
    compute_social_security, health_welfare_tier,
};
pub use money::{apportion, round_money};
pub use tax::{MONTHS_PER_YEAR, TaxBreakdown, TaxComputation, compute_annual_tax, total_allowances};
