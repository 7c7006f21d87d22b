//! Personal income tax calculation.
//!
//! This module computes annual and monthly income tax under the Thai
//! progressive schedule: employment expense deduction, personal allowances,
//! then the bracket containing the remaining taxable income.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::TaxConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{AuditStep, FilerProfile};

use super::money::round_money;

/// Months over which annual tax is withheld.
pub const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// The intermediate figures of a tax computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// Annual income the computation started from.
    pub annual_income: Decimal,
    /// Employment expense deduction after the cap.
    pub employment_deduction: Decimal,
    /// Personal, spouse and child allowances.
    pub allowances: Decimal,
    /// Income left after deduction and allowances, never negative.
    pub taxable_income: Decimal,
    /// Index of the bracket the taxable income fell into.
    pub bracket_index: usize,
    /// Marginal rate of that bracket.
    pub marginal_rate: Decimal,
}

/// The result of an annual tax computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxComputation {
    /// Tax due for the year.
    pub annual_tax: Decimal,
    /// Annual tax divided by twelve.
    pub monthly_tax: Decimal,
    /// How the tax was derived.
    pub breakdown: TaxBreakdown,
    /// The audit step recording this computation.
    pub audit_step: AuditStep,
}

/// Sums the allowances a filer may claim.
pub fn total_allowances(profile: &FilerProfile, config: &TaxConfig) -> Decimal {
    let s = &config.settings;
    let mut allowances = s.personal_allowance;
    if profile.claims_spouse_allowance() {
        allowances += s.spouse_allowance;
    }
    if profile.children >= 1 {
        allowances += s.child_allowance_first;
        allowances += s.child_allowance_subsequent * Decimal::from(profile.children - 1);
    }
    allowances
}

/// Computes annual income tax for a filer.
///
/// The steps run in statutory order:
/// 1. employment deduction = min(income × rate, cap)
/// 2. allowances = personal + spouse + children
/// 3. taxable income = max(0, income − deduction − allowances)
/// 4. tax = bracket base tax + (taxable − bracket lower bound) × bracket rate
/// 5. monthly tax = annual tax / 12
///
/// # Arguments
///
/// * `annual_income` - Income for the whole year
/// * `profile` - The filer's marital and dependent status
/// * `config` - Validated brackets and settings of the tax year
/// * `step_number` - The step number for audit trail sequencing
///
/// # Errors
///
/// Returns `CalculationError` if no bracket covers the taxable income, which
/// a validated configuration rules out.
///
/// # Examples
///
/// ```no_run
/// use payroll_engine::calculation::compute_annual_tax;
/// use payroll_engine::config::ConfigLoader;
/// use payroll_engine::models::FilerProfile;
/// use rust_decimal::Decimal;
///
/// let store = ConfigLoader::load("./config")?;
/// let config = store.tax_config(2025)?;
/// let result = compute_annual_tax(Decimal::new(360000, 0), &FilerProfile::single(), &config, 1)?;
/// assert_eq!(result.annual_tax, Decimal::new(2500, 0));
/// assert_eq!(result.monthly_tax, Decimal::new(20833, 2));
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub fn compute_annual_tax(
    annual_income: Decimal,
    profile: &FilerProfile,
    config: &TaxConfig,
    step_number: u32,
) -> EngineResult<TaxComputation> {
    let s = &config.settings;

    let employment_deduction = (annual_income.max(Decimal::ZERO) * s.employment_deduction_rate)
        .min(s.employment_deduction_cap);
    let allowances = total_allowances(profile, config);
    let taxable_income =
        (annual_income - employment_deduction - allowances).max(Decimal::ZERO);

    let (bracket_index, bracket) =
        config
            .bracket_for(taxable_income)
            .ok_or_else(|| EngineError::CalculationError {
                message: format!(
                    "no tax bracket for taxable income {} in tax year {}",
                    taxable_income, config.tax_year
                ),
            })?;

    let annual_tax = if taxable_income.is_zero() {
        Decimal::ZERO
    } else {
        round_money(bracket.tax_for(taxable_income))
    };
    let monthly_tax = round_money(annual_tax / MONTHS_PER_YEAR);

    let breakdown = TaxBreakdown {
        annual_income,
        employment_deduction,
        allowances,
        taxable_income,
        bracket_index,
        marginal_rate: bracket.rate,
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "income_tax".to_string(),
        rule_name: "Annual Income Tax".to_string(),
        input: serde_json::json!({
            "annual_income": annual_income.normalize().to_string(),
            "tax_year": config.tax_year,
            "config_version": config.version,
            "children": profile.children,
            "spouse_allowance": profile.claims_spouse_allowance()
        }),
        output: serde_json::json!({
            "employment_deduction": employment_deduction.normalize().to_string(),
            "allowances": allowances.normalize().to_string(),
            "taxable_income": taxable_income.normalize().to_string(),
            "bracket_index": bracket_index,
            "annual_tax": annual_tax.normalize().to_string(),
            "monthly_tax": monthly_tax.normalize().to_string()
        }),
        reasoning: format!(
            "Taxable {} = {} - {} deduction - {} allowances; bracket {} at {} gives {} per year, {} per month",
            taxable_income.normalize(),
            annual_income.normalize(),
            employment_deduction.normalize(),
            allowances.normalize(),
            bracket_index,
            bracket.rate.normalize(),
            annual_tax.normalize(),
            monthly_tax.normalize()
        ),
    };

    Ok(TaxComputation {
        annual_tax,
        monthly_tax,
        breakdown,
        audit_step,
    })
}
