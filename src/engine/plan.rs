//! Computation of one employee's payroll records for a pay period.
//!
//! [`compute_records`] is pure: it reads a snapshot and a tax configuration and
//! produces one [`PayrollRecord`] per active allocation without touching any
//! store. Deductions are computed on the employee's combined figures and
//! apportioned back to the allocations.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::warn;

use crate::calculation::{
    MONTHS_PER_YEAR, apportion, compute_allocation_salary, compute_annual_tax,
    compute_health_welfare, compute_monthly_base, compute_retirement_fund,
    compute_social_security, compute_thirteenth_month_accrual,
};
use crate::config::TaxConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, Deductions, EmployeeSnapshot, EmployerContributions, FundingAllocation, PayPeriod,
    PayrollRecord, RecordKey,
};

/// Allowed distance of the level-of-effort sum from 1.
pub const LEVEL_OF_EFFORT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Selects the active allocations and checks their levels of effort.
///
/// # Errors
///
/// - `NoActiveAllocations` if nothing is active on the closing date
/// - `DuplicateAllocation` if two active allocations share an id
/// - `InvalidLevelOfEffort` if one fraction lies outside (0, 1]
/// - `LevelOfEffortMismatch` if the fractions do not sum to 1 within tolerance
pub fn validate_allocations(
    snapshot: &EmployeeSnapshot,
    pay_period: PayPeriod,
) -> EngineResult<Vec<&FundingAllocation>> {
    let active = snapshot.active_allocations(pay_period);
    if active.is_empty() {
        return Err(EngineError::NoActiveAllocations {
            employee_id: snapshot.employee.id.clone(),
            pay_period,
        });
    }

    let mut seen = HashSet::with_capacity(active.len());
    for allocation in &active {
        if !seen.insert(allocation.id.as_str()) {
            return Err(EngineError::DuplicateAllocation {
                employee_id: snapshot.employee.id.clone(),
                allocation_id: allocation.id.clone(),
                pay_period,
            });
        }
        let loe = allocation.level_of_effort;
        if loe <= Decimal::ZERO || loe > Decimal::ONE {
            return Err(EngineError::InvalidLevelOfEffort {
                allocation_id: allocation.id.clone(),
                level_of_effort: loe,
            });
        }
    }

    let total: Decimal = active.iter().map(|a| a.level_of_effort).sum();
    if (total - Decimal::ONE).abs() > LEVEL_OF_EFFORT_TOLERANCE {
        return Err(EngineError::LevelOfEffortMismatch {
            employee_id: snapshot.employee.id.clone(),
            pay_period,
            total,
        });
    }

    Ok(active)
}

struct AllocationIncome<'a> {
    allocation: &'a FundingAllocation,
    gross: Decimal,
    compensation_refund: Decimal,
    thirteenth_month: Decimal,
    total_income: Decimal,
    steps: Vec<AuditStep>,
}

/// Computes the payroll records of one employee for a pay period.
///
/// `employer_health_welfare_multiplier` is the employer rule for the
/// employee's subsidiary and residency class.
///
/// Records come out in allocation input order. A record whose net salary is
/// negative is kept and flagged `needs_review`.
pub fn compute_records(
    snapshot: &EmployeeSnapshot,
    pay_period: PayPeriod,
    config: &TaxConfig,
    employer_health_welfare_multiplier: Decimal,
) -> EngineResult<Vec<PayrollRecord>> {
    let employee = &snapshot.employee;
    let term = &snapshot.employment;
    snapshot.validate()?;
    let active = validate_allocations(snapshot, pay_period)?;

    let base = compute_monthly_base(term, pay_period, 1);

    let incomes: Vec<AllocationIncome> = active
        .into_iter()
        .map(|allocation| {
            let salary =
                compute_allocation_salary(base.monthly_base, term.fte, allocation.level_of_effort, 2);
            let accrual = compute_thirteenth_month_accrual(salary.salary, term, pay_period, 3);
            let refund = snapshot.compensation_refund(pay_period, &allocation.id);
            AllocationIncome {
                allocation,
                gross: salary.salary,
                compensation_refund: refund,
                thirteenth_month: accrual.accrual,
                total_income: salary.salary + refund + accrual.accrual,
                steps: vec![salary.audit_step, accrual.audit_step],
            }
        })
        .collect();

    let gross_weights: Vec<Decimal> = incomes.iter().map(|i| i.gross).collect();
    let income_weights: Vec<Decimal> = incomes.iter().map(|i| i.total_income).collect();
    let combined_gross: Decimal = gross_weights.iter().copied().sum();
    let combined_income: Decimal = income_weights.iter().copied().sum();

    let probation_passed = term.probation_passed_by(pay_period.closing_date());
    let settings = &config.settings;
    let retirement = compute_retirement_fund(
        combined_gross,
        employee.residency_class,
        probation_passed,
        settings,
        4,
    );
    let social_security = compute_social_security(combined_gross, settings, 5);
    let health_welfare = compute_health_welfare(combined_gross, employer_health_welfare_multiplier, 6);
    let annual_income = combined_income
        .checked_mul(MONTHS_PER_YEAR)
        .ok_or_else(|| EngineError::CalculationError {
            message: format!("annual income of {} overflows", employee.id),
        })?;
    let tax = compute_annual_tax(
        annual_income,
        &employee.filer_profile,
        config,
        7,
    )?;

    let retirement_shares = apportion(retirement.amount, &gross_weights);
    let ssf_shares = apportion(social_security.employee, &gross_weights);
    let ssf_employer_shares = apportion(social_security.employer, &gross_weights);
    let hw_shares = apportion(health_welfare.employee, &gross_weights);
    let hw_employer_shares = apportion(health_welfare.employer, &gross_weights);
    let tax_shares = apportion(tax.monthly_tax, &income_weights);

    let shared_steps = [
        base.audit_step,
        retirement.audit_step,
        social_security.audit_step,
        health_welfare.audit_step,
        tax.audit_step,
    ];

    let records = incomes
        .into_iter()
        .enumerate()
        .map(|(i, income)| {
            let deductions = Deductions {
                retirement_fund_kind: retirement.kind,
                retirement_fund: retirement_shares[i],
                social_security: ssf_shares[i],
                health_welfare: hw_shares[i],
                income_tax: tax_shares[i],
            };
            let net_salary = income.total_income - deductions.total();
            let needs_review = net_salary < Decimal::ZERO;

            let key = RecordKey {
                employment_id: term.id.clone(),
                allocation_id: income.allocation.id.clone(),
                pay_period,
            };
            if needs_review {
                warn!(
                    employee_id = %employee.id,
                    allocation_id = %income.allocation.id,
                    pay_period = %pay_period,
                    net_salary = %net_salary,
                    "Negative net salary, record flagged for review"
                );
            }

            let mut audit_steps = Vec::with_capacity(shared_steps.len() + income.steps.len() + 1);
            audit_steps.push(shared_steps[0].clone());
            audit_steps.extend(income.steps);
            audit_steps.extend(shared_steps[1..].iter().cloned());
            audit_steps.push(net_salary_step(
                8,
                &income.allocation.id,
                income.total_income,
                &deductions,
                net_salary,
            ));

            PayrollRecord {
                id: key.record_id(),
                employee_id: employee.id.clone(),
                employment_id: key.employment_id,
                allocation_id: key.allocation_id,
                pay_period,
                allocation_type: income.allocation.allocation_type.clone(),
                level_of_effort: income.allocation.level_of_effort,
                monthly_base: base.monthly_base,
                gross_salary: income.gross,
                compensation_refund: income.compensation_refund,
                thirteenth_month_accrual: income.thirteenth_month,
                total_income: income.total_income,
                deductions,
                net_salary,
                employer_contributions: EmployerContributions {
                    social_security: ssf_employer_shares[i],
                    health_welfare: hw_employer_shares[i],
                },
                needs_review,
                audit_steps,
            }
        })
        .collect();

    Ok(records)
}

fn net_salary_step(
    step_number: u32,
    allocation_id: &str,
    total_income: Decimal,
    deductions: &Deductions,
    net_salary: Decimal,
) -> AuditStep {
    AuditStep {
        step_number,
        rule_id: "net_salary".to_string(),
        rule_name: "Net Salary".to_string(),
        input: serde_json::json!({
            "allocation_id": allocation_id,
            "total_income": total_income.normalize().to_string(),
            "retirement_fund": deductions.retirement_fund.normalize().to_string(),
            "social_security": deductions.social_security.normalize().to_string(),
            "health_welfare": deductions.health_welfare.normalize().to_string(),
            "income_tax": deductions.income_tax.normalize().to_string()
        }),
        output: serde_json::json!({
            "net_salary": net_salary.normalize().to_string()
        }),
        reasoning: format!(
            "{} income less {} apportioned deductions = {}",
            total_income.normalize(),
            deductions.total().normalize(),
            net_salary.normalize()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResidencyClass, RetirementFundKind, Subsidiary};
    use crate::test_support::{
        date, dec, grant, org_funded, period, split_funding_snapshot, thai_tax_config,
    };

    fn records_for(snapshot: &EmployeeSnapshot) -> EngineResult<Vec<PayrollRecord>> {
        compute_records(snapshot, period(2025, 3), &thai_tax_config(2025), dec("1"))
    }

    // ==========================================================================
    // SMRU employee, 20% BHF grant and 80% SMRU org funds, 25,000 a month
    // ==========================================================================
    #[test]
    fn test_split_funding_scenario() {
        let records = records_for(&split_funding_snapshot()).unwrap();
        assert_eq!(records.len(), 2);

        let (grant_record, org_record) = (&records[0], &records[1]);
        assert_eq!(grant_record.allocation_id, "alloc_grant");
        assert_eq!(grant_record.gross_salary, dec("5000"));
        assert_eq!(org_record.gross_salary, dec("20000"));

        // served nine months and passed probation: 13th month accrues
        assert_eq!(grant_record.thirteenth_month_accrual, dec("416.67"));
        assert_eq!(org_record.thirteenth_month_accrual, dec("1666.67"));

        // employee level: PVD 1,875, SSF 750, HW 150
        assert_eq!(grant_record.deductions.retirement_fund_kind, RetirementFundKind::ProvidentFund);
        assert_eq!(grant_record.deductions.retirement_fund, dec("375"));
        assert_eq!(org_record.deductions.retirement_fund, dec("1500"));
        assert_eq!(grant_record.deductions.social_security, dec("150"));
        assert_eq!(org_record.deductions.social_security, dec("600"));
        assert_eq!(grant_record.deductions.health_welfare, dec("30"));
        assert_eq!(org_record.deductions.health_welfare, dec("120"));
        assert_eq!(org_record.employer_contributions.social_security, dec("600"));
        assert_eq!(org_record.employer_contributions.health_welfare, dec("120"));

        // annual income 27,083.34 x 12 = 325,000.08, taxable 165,000.08
        let monthly_tax = grant_record.deductions.income_tax + org_record.deductions.income_tax;
        assert_eq!(monthly_tax, dec("62.50"));
        assert_eq!(grant_record.deductions.income_tax, dec("12.50"));

        for record in &records {
            assert_eq!(record.net_salary, record.total_income - record.deductions.total());
            assert!(!record.needs_review);
            assert_eq!(record.audit_steps.len(), 8);
        }
    }

    #[test]
    fn test_record_ids_are_deterministic() {
        let first = records_for(&split_funding_snapshot()).unwrap();
        let second = records_for(&split_funding_snapshot()).unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_loe_mismatch_is_rejected() {
        let mut snapshot = split_funding_snapshot();
        snapshot.allocations[1].level_of_effort = dec("0.7");

        match records_for(&snapshot) {
            Err(EngineError::LevelOfEffortMismatch { total, .. }) => assert_eq!(total, dec("0.9")),
            other => panic!("Expected LevelOfEffortMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_loe_within_tolerance_is_accepted() {
        let mut snapshot = split_funding_snapshot();
        snapshot.allocations[0].level_of_effort = dec("0.3333333");
        snapshot.allocations[1].level_of_effort = dec("0.6666666");
        assert!(records_for(&snapshot).is_ok());
    }

    #[test]
    fn test_invalid_single_loe() {
        let mut snapshot = split_funding_snapshot();
        snapshot.allocations[0].level_of_effort = dec("1.2");
        snapshot.allocations[1].level_of_effort = dec("-0.2");
        assert!(matches!(
            records_for(&snapshot),
            Err(EngineError::InvalidLevelOfEffort { .. })
        ));
    }

    #[test]
    fn test_duplicate_active_allocation_id_is_rejected() {
        let mut snapshot = split_funding_snapshot();
        snapshot.allocations = vec![
            grant("alloc_x", Subsidiary::Bhf, "0.5"),
            org_funded("alloc_x", Subsidiary::Smru, "0.5"),
        ];

        match records_for(&snapshot) {
            Err(EngineError::DuplicateAllocation { allocation_id, .. }) => {
                assert_eq!(allocation_id, "alloc_x")
            }
            other => panic!("Expected DuplicateAllocation, got {:?}", other),
        }
    }

    #[test]
    fn test_ended_allocation_may_reuse_an_id() {
        let mut snapshot = split_funding_snapshot();
        let mut ended = grant("alloc_grant", Subsidiary::Bhf, "0.5");
        ended.end_date = Some(date(2025, 1, 1));
        snapshot.allocations.push(ended);

        let records = records_for(&snapshot).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_inactive_allocations_are_ignored() {
        let mut snapshot = split_funding_snapshot();
        let mut ended = grant("alloc_old", Subsidiary::Bhf, "0.5");
        ended.end_date = Some(date(2025, 1, 1));
        snapshot.allocations.push(ended);

        let records = records_for(&snapshot).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_no_active_allocations() {
        let mut snapshot = split_funding_snapshot();
        for allocation in &mut snapshot.allocations {
            allocation.start_date = date(2025, 4, 1);
        }
        assert!(matches!(
            records_for(&snapshot),
            Err(EngineError::NoActiveAllocations { .. })
        ));
    }

    #[test]
    fn test_compensation_refund_adds_to_income() {
        let mut snapshot = split_funding_snapshot();
        snapshot.adjustments.push(crate::models::PeriodAdjustment {
            pay_period: period(2025, 3),
            allocation_id: "alloc_org".to_string(),
            compensation_refund: dec("1000"),
        });

        let records = records_for(&snapshot).unwrap();
        assert_eq!(records[1].compensation_refund, dec("1000"));
        assert_eq!(records[1].total_income, dec("22666.67"));
        // refund is income, not gross: SSF unchanged
        assert_eq!(records[1].deductions.social_security, dec("600"));
    }

    #[test]
    fn test_saving_fund_for_non_id_resident() {
        let mut snapshot = split_funding_snapshot();
        snapshot.employee.residency_class = ResidencyClass::LocalNonId;
        let records = records_for(&snapshot).unwrap();
        assert_eq!(records[0].deductions.retirement_fund_kind, RetirementFundKind::SavingFund);
    }

    #[test]
    fn test_no_retirement_fund_or_accrual_during_probation() {
        let mut snapshot = split_funding_snapshot();
        snapshot.employment.start_date = date(2025, 2, 1);
        snapshot.employment.probation_pass_date = date(2025, 5, 1);

        let records = records_for(&snapshot).unwrap();
        assert!(records.iter().all(|r| r.deductions.retirement_fund.is_zero()));
        assert!(records.iter().all(|r| r.thirteenth_month_accrual.is_zero()));
    }

    #[test]
    fn test_negative_net_is_flagged_for_review() {
        let mut snapshot = split_funding_snapshot();
        snapshot.employment.position_salary = Decimal::ZERO;
        snapshot.employment.probation_salary = Decimal::ZERO;
        snapshot.allocations = vec![org_funded("alloc_org", Subsidiary::Smru, "1")];

        let records = records_for(&snapshot).unwrap();
        assert_eq!(records[0].deductions.health_welfare, dec("60"));
        assert_eq!(records[0].net_salary, dec("-60"));
        assert!(records[0].needs_review);
    }

    #[test]
    fn test_invalid_employment_is_rejected() {
        let mut snapshot = split_funding_snapshot();
        snapshot.employment.fte = dec("1.5");
        assert!(matches!(
            records_for(&snapshot),
            Err(EngineError::InvalidEmployment { .. })
        ));
    }

    #[test]
    fn test_huge_salary_is_rejected_without_panicking() {
        let mut snapshot = split_funding_snapshot();
        snapshot.employment.position_salary = Decimal::MAX;
        snapshot.employment.probation_salary = Decimal::MAX;
        match records_for(&snapshot) {
            Err(EngineError::InvalidEmployment { field, .. }) => {
                assert_eq!(field, "position_salary")
            }
            other => panic!("Expected InvalidEmployment, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_refund_is_rejected_without_panicking() {
        let mut snapshot = split_funding_snapshot();
        snapshot.adjustments.push(crate::models::PeriodAdjustment {
            pay_period: period(2025, 3),
            allocation_id: "alloc_org".to_string(),
            compensation_refund: Decimal::MAX,
        });
        match records_for(&snapshot) {
            Err(EngineError::InvalidEmployment { field, .. }) => {
                assert_eq!(field, "compensation_refund")
            }
            other => panic!("Expected InvalidEmployment, got {:?}", other),
        }
    }
}
