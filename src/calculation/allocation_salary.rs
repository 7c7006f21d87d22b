//! Monthly base salary and allocation salary calculation.
//!
//! This module derives the monthly base of an employment for a pay period,
//! pro-rating the month in which probation ends and applying the annual
//! increment, then weights it by FTE and level of effort for each allocation.

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::models::{AuditStep, EmploymentTerm, PayPeriod};

use super::money::round_money;

/// Flat annual increment on the position salary (1%).
pub const ANNUAL_INCREMENT_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Calendar days of service after which the annual increment applies.
pub const ANNUAL_INCREMENT_SERVICE_DAYS: i64 = 365;

/// Calendar months of service before 13th-month salary accrues.
pub const THIRTEENTH_MONTH_SERVICE_MONTHS: u32 = 6;

/// The result of a monthly base calculation.
#[derive(Debug, Clone)]
pub struct MonthlyBaseResult {
    /// Monthly base salary for the pay period.
    pub monthly_base: Decimal,
    /// The position salary used, after any increment.
    pub position_salary: Decimal,
    /// Whether the annual increment was applied.
    pub increment_applied: bool,
    /// Days of the month paid at the probation rate.
    pub probation_days: u32,
    /// Days of the month paid at the position rate.
    pub position_days: u32,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// The result of weighting a monthly base for one allocation.
#[derive(Debug, Clone)]
pub struct AllocationSalaryResult {
    /// Salary charged to the allocation.
    pub salary: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// The result of a 13th-month accrual calculation.
#[derive(Debug, Clone)]
pub struct ThirteenthMonthResult {
    /// Amount accrued this period.
    pub accrual: Decimal,
    /// Whether the employment qualified for accrual.
    pub eligible: bool,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Computes the monthly base salary of an employment for a pay period.
///
/// The probation pass date decides the rate:
/// - before the first day of the month: the position salary for the whole month
/// - on or after the last day of the month: the probation salary for the whole month
/// - otherwise days `1..=pass day` are paid at the probation daily rate and the
///   rest at the position daily rate, where the daily rate is the monthly
///   salary divided by the days in that month
///
/// Once service at the closing date reaches 365 days the position salary is
/// raised by 1%. The raise is applied to the contract salary, so it never
/// compounds.
///
/// # Arguments
///
/// * `term` - The employment term
/// * `pay_period` - The month being paid
/// * `step_number` - The step number for audit trail sequencing
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::compute_monthly_base;
/// use payroll_engine::models::{EmploymentTerm, PayPeriod};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let term = EmploymentTerm {
///     id: "empl_001".to_string(),
///     position_salary: Decimal::new(50000, 0),
///     probation_salary: Decimal::new(40000, 0),
///     probation_pass_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
///     start_date: NaiveDate::from_ymd_opt(2024, 10, 15).unwrap(),
///     fte: Decimal::ONE,
/// };
/// let result = compute_monthly_base(&term, PayPeriod::new(2025, 1).unwrap(), 1);
/// assert_eq!(result.monthly_base, Decimal::new(4516129, 2));
/// ```
pub fn compute_monthly_base(
    term: &EmploymentTerm,
    pay_period: PayPeriod,
    step_number: u32,
) -> MonthlyBaseResult {
    let closing = pay_period.closing_date();
    let days_in_month = pay_period.days_in_month();

    let increment_applied = term.service_days(closing) >= ANNUAL_INCREMENT_SERVICE_DAYS;
    let position_salary = if increment_applied {
        round_money(term.position_salary * (Decimal::ONE + ANNUAL_INCREMENT_RATE))
    } else {
        term.position_salary
    };

    let pass = term.probation_pass_date;
    let (probation_days, position_days, monthly_base, basis) = if pass < pay_period.start_date() {
        (0, days_in_month, position_salary, "position salary")
    } else if pass >= closing {
        (days_in_month, 0, term.probation_salary, "probation salary")
    } else {
        let probation_days = pass.day();
        let position_days = days_in_month - probation_days;
        let prorated = (Decimal::from(probation_days) * term.probation_salary
            + Decimal::from(position_days) * position_salary)
            / Decimal::from(days_in_month);
        (
            probation_days,
            position_days,
            round_money(prorated),
            "pro-rated at probation pass",
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "monthly_base".to_string(),
        rule_name: "Monthly Base Salary".to_string(),
        input: serde_json::json!({
            "pay_period": pay_period.to_string(),
            "position_salary": term.position_salary.normalize().to_string(),
            "probation_salary": term.probation_salary.normalize().to_string(),
            "probation_pass_date": pass.to_string(),
            "start_date": term.start_date.to_string()
        }),
        output: serde_json::json!({
            "monthly_base": monthly_base.normalize().to_string(),
            "increment_applied": increment_applied,
            "probation_days": probation_days,
            "position_days": position_days
        }),
        reasoning: format!(
            "{} of {} days at probation rate, {} at position rate {} ({}): base {}",
            probation_days,
            days_in_month,
            position_days,
            position_salary.normalize(),
            basis,
            monthly_base.normalize()
        ),
    };

    MonthlyBaseResult {
        monthly_base,
        position_salary,
        increment_applied,
        probation_days,
        position_days,
        audit_step,
    }
}

/// Weights a monthly base by FTE and an allocation's level of effort.
///
/// salary = round(monthly_base × fte × level_of_effort, 2)
pub fn compute_allocation_salary(
    monthly_base: Decimal,
    fte: Decimal,
    level_of_effort: Decimal,
    step_number: u32,
) -> AllocationSalaryResult {
    let salary = round_money(monthly_base * fte * level_of_effort);

    let audit_step = AuditStep {
        step_number,
        rule_id: "allocation_salary".to_string(),
        rule_name: "Allocation Salary".to_string(),
        input: serde_json::json!({
            "monthly_base": monthly_base.normalize().to_string(),
            "fte": fte.normalize().to_string(),
            "level_of_effort": level_of_effort.normalize().to_string()
        }),
        output: serde_json::json!({
            "salary": salary.normalize().to_string()
        }),
        reasoning: format!(
            "{} x {} FTE x {} LOE = {}",
            monthly_base.normalize(),
            fte.normalize(),
            level_of_effort.normalize(),
            salary.normalize()
        ),
    };

    AllocationSalaryResult { salary, audit_step }
}

/// Computes the 13th-month salary accrued on an allocation salary.
///
/// Accrues one twelfth of the salary once the employee has served six
/// calendar months and passed probation by the closing date; zero otherwise.
pub fn compute_thirteenth_month_accrual(
    allocation_salary: Decimal,
    term: &EmploymentTerm,
    pay_period: PayPeriod,
    step_number: u32,
) -> ThirteenthMonthResult {
    let closing = pay_period.closing_date();
    let served = term.has_served_months(THIRTEENTH_MONTH_SERVICE_MONTHS, closing);
    let passed = term.probation_passed_by(closing);
    let eligible = served && passed;

    let accrual = if eligible {
        round_money(allocation_salary / Decimal::from(12))
    } else {
        Decimal::ZERO
    };

    let reasoning = match (served, passed) {
        (true, true) => format!(
            "Eligible: {} / 12 = {}",
            allocation_salary.normalize(),
            accrual.normalize()
        ),
        (false, _) => format!(
            "Not eligible: fewer than {} months of service at {}",
            THIRTEENTH_MONTH_SERVICE_MONTHS, closing
        ),
        (true, false) => format!("Not eligible: probation not passed by {}", closing),
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "thirteenth_month".to_string(),
        rule_name: "13th-Month Accrual".to_string(),
        input: serde_json::json!({
            "allocation_salary": allocation_salary.normalize().to_string(),
            "start_date": term.start_date.to_string(),
            "probation_pass_date": term.probation_pass_date.to_string(),
            "closing_date": closing.to_string()
        }),
        output: serde_json::json!({
            "eligible": eligible,
            "accrual": accrual.normalize().to_string()
        }),
        reasoning,
    };

    ThirteenthMonthResult {
        accrual,
        eligible,
        audit_step,
    }
}
