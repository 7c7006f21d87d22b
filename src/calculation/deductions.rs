//! Statutory deductions computed on an employee's combined gross salary.
//!
//! Each function works at employee level; the engine apportions the results to
//! allocations by gross share so that caps hold for the employee as a whole.

use rust_decimal::Decimal;

use crate::config::TaxSettings;
use crate::models::{AuditStep, ResidencyClass, RetirementFundKind};

use super::money::round_money;

/// Gross above which the top health welfare tier applies.
pub const HEALTH_WELFARE_UPPER_THRESHOLD: Decimal = Decimal::from_parts(15000, 0, 0, false, 0);
/// Gross above which the middle health welfare tier applies.
pub const HEALTH_WELFARE_LOWER_THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

const HEALTH_WELFARE_TOP_TIER: Decimal = Decimal::from_parts(150, 0, 0, false, 0);
const HEALTH_WELFARE_MIDDLE_TIER: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const HEALTH_WELFARE_BASE_TIER: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// The result of a retirement fund calculation.
#[derive(Debug, Clone)]
pub struct RetirementFundResult {
    /// Provident Fund or Saving Fund.
    pub kind: RetirementFundKind,
    /// Employee contribution for the month.
    pub amount: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// The result of a Social Security calculation.
#[derive(Debug, Clone)]
pub struct SocialSecurityResult {
    /// Gross clamped to the contribution salary range.
    pub contribution_base: Decimal,
    /// Employee contribution.
    pub employee: Decimal,
    /// Employer contribution, equal to the employee's.
    pub employer: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// The result of a health welfare calculation.
#[derive(Debug, Clone)]
pub struct HealthWelfareResult {
    /// Employee contribution by gross tier.
    pub employee: Decimal,
    /// Employer contribution.
    pub employer: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Computes the monthly retirement fund contribution.
///
/// Resident-ID holders contribute to the Provident Fund, everyone else to the
/// Saving Fund. Nothing is deducted before probation has been passed.
///
/// # Examples
///
/// ```no_run
/// use payroll_engine::calculation::compute_retirement_fund;
/// use payroll_engine::config::ConfigLoader;
/// use payroll_engine::models::{ResidencyClass, RetirementFundKind};
/// use rust_decimal::Decimal;
///
/// let store = ConfigLoader::load("./config")?;
/// let config = store.tax_config(2025)?;
/// let result = compute_retirement_fund(
///     Decimal::new(50000, 0),
///     ResidencyClass::LocalId,
///     true,
///     &config.settings,
///     1,
/// );
/// assert_eq!(result.kind, RetirementFundKind::ProvidentFund);
/// assert_eq!(result.amount, Decimal::new(3750, 0));
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub fn compute_retirement_fund(
    combined_gross: Decimal,
    residency_class: ResidencyClass,
    probation_passed: bool,
    settings: &TaxSettings,
    step_number: u32,
) -> RetirementFundResult {
    let (kind, rate, cap) = if residency_class.contributes_to_provident_fund() {
        (
            RetirementFundKind::ProvidentFund,
            settings.pvd_rate,
            settings.pvd_cap,
        )
    } else {
        (
            RetirementFundKind::SavingFund,
            settings.saving_fund_rate,
            settings.saving_fund_cap,
        )
    };

    let amount = if probation_passed && combined_gross > Decimal::ZERO {
        round_money(combined_gross * rate).min(cap)
    } else {
        Decimal::ZERO
    };

    let reasoning = if probation_passed {
        format!(
            "{:?}: {} x {} capped at {} = {}",
            kind,
            combined_gross.normalize(),
            rate.normalize(),
            cap.normalize(),
            amount.normalize()
        )
    } else {
        format!("{:?}: no contribution before probation is passed", kind)
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "retirement_fund".to_string(),
        rule_name: "Retirement Fund Contribution".to_string(),
        input: serde_json::json!({
            "combined_gross": combined_gross.normalize().to_string(),
            "residency_class": residency_class,
            "probation_passed": probation_passed
        }),
        output: serde_json::json!({
            "kind": kind,
            "amount": amount.normalize().to_string()
        }),
        reasoning,
    };

    RetirementFundResult {
        kind,
        amount,
        audit_step,
    }
}

/// Computes Social Security contributions.
///
/// The contribution base is the combined gross clamped to the configured
/// salary range; the contribution is `base × rate`, never above the monthly
/// cap. The employer pays the same amount. No gross means no contribution.
pub fn compute_social_security(
    combined_gross: Decimal,
    settings: &TaxSettings,
    step_number: u32,
) -> SocialSecurityResult {
    let (contribution_base, contribution) = if combined_gross > Decimal::ZERO {
        let base = combined_gross.clamp(settings.ssf_min_salary, settings.ssf_max_salary);
        (
            base,
            round_money(base * settings.ssf_rate).min(settings.ssf_monthly_cap),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "social_security".to_string(),
        rule_name: "Social Security Contribution".to_string(),
        input: serde_json::json!({
            "combined_gross": combined_gross.normalize().to_string(),
            "min_salary": settings.ssf_min_salary.normalize().to_string(),
            "max_salary": settings.ssf_max_salary.normalize().to_string(),
            "rate": settings.ssf_rate.normalize().to_string()
        }),
        output: serde_json::json!({
            "contribution_base": contribution_base.normalize().to_string(),
            "employee": contribution.normalize().to_string(),
            "employer": contribution.normalize().to_string()
        }),
        reasoning: format!(
            "Base {} x {} capped at {} = {} each for employee and employer",
            contribution_base.normalize(),
            settings.ssf_rate.normalize(),
            settings.ssf_monthly_cap.normalize(),
            contribution.normalize()
        ),
    };

    SocialSecurityResult {
        contribution_base,
        employee: contribution,
        employer: contribution,
        audit_step,
    }
}

/// Employee health welfare contribution for a combined gross.
///
/// | Combined gross      | Contribution |
/// |---------------------|--------------|
/// | above 15,000        | 150          |
/// | above 5,000         | 100          |
/// | 5,000 or less       | 60           |
///
/// Both thresholds are exclusive, so a fractional gross such as 5,000.50
/// already falls in the 100 tier; the bands leave no gap below 5,001.
pub fn health_welfare_tier(combined_gross: Decimal) -> Decimal {
    if combined_gross > HEALTH_WELFARE_UPPER_THRESHOLD {
        HEALTH_WELFARE_TOP_TIER
    } else if combined_gross > HEALTH_WELFARE_LOWER_THRESHOLD {
        HEALTH_WELFARE_MIDDLE_TIER
    } else {
        HEALTH_WELFARE_BASE_TIER
    }
}

/// Computes health welfare contributions.
///
/// The employer pays the employee amount times the multiplier configured for
/// the employee's subsidiary and residency class.
pub fn compute_health_welfare(
    combined_gross: Decimal,
    employer_multiplier: Decimal,
    step_number: u32,
) -> HealthWelfareResult {
    let employee = health_welfare_tier(combined_gross);
    let employer = round_money(employee * employer_multiplier);

    let audit_step = AuditStep {
        step_number,
        rule_id: "health_welfare".to_string(),
        rule_name: "Health Welfare Contribution".to_string(),
        input: serde_json::json!({
            "combined_gross": combined_gross.normalize().to_string(),
            "employer_multiplier": employer_multiplier.normalize().to_string()
        }),
        output: serde_json::json!({
            "employee": employee.normalize().to_string(),
            "employer": employer.normalize().to_string()
        }),
        reasoning: format!(
            "Gross {} falls in the {} tier; employer pays {} x {} = {}",
            combined_gross.normalize(),
            employee.normalize(),
            employee.normalize(),
            employer_multiplier.normalize(),
            employer.normalize()
        ),
    };

    HealthWelfareResult {
        employee,
        employer,
        audit_step,
    }
}
