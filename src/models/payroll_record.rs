//! Payroll record models.
//!
//! This module contains the [`PayrollRecord`] produced for each funding allocation
//! of an employee in a pay period, the [`AuditStep`] trail attached to it, and the
//! [`PayrollResult`] returned for one employee.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AllocationType, InterSubsidiaryAdvance, PayPeriod, Subsidiary};

/// Namespace for deterministic record ids.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_4a7e_93d2_4b8a_a0c5_2f1e_7d9b_3c41);

/// A single step in the audit trail recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// The unique key of a payroll record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// The employment the record pays.
    pub employment_id: String,
    /// The funding allocation the record is charged to.
    pub allocation_id: String,
    /// The pay period.
    pub pay_period: PayPeriod,
}

impl RecordKey {
    /// Deterministic record id for this key.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{PayPeriod, RecordKey};
    ///
    /// let key = RecordKey {
    ///     employment_id: "empl_001".to_string(),
    ///     allocation_id: "alloc_01".to_string(),
    ///     pay_period: PayPeriod::new(2025, 3).unwrap(),
    /// };
    /// assert_eq!(key.record_id(), key.clone().record_id());
    /// ```
    pub fn record_id(&self) -> Uuid {
        let name = format!(
            "{}/{}/{}",
            self.employment_id, self.allocation_id, self.pay_period
        );
        Uuid::new_v5(&RECORD_NAMESPACE, name.as_bytes())
    }
}

/// Which retirement scheme an employee contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetirementFundKind {
    /// Provident Fund, for resident-ID holders.
    ProvidentFund,
    /// Saving Fund, for everyone else.
    SavingFund,
}

/// Employee-side deductions of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deductions {
    /// The retirement scheme the contribution goes to.
    pub retirement_fund_kind: RetirementFundKind,
    /// Provident Fund or Saving Fund contribution.
    pub retirement_fund: Decimal,
    /// Social Security contribution.
    pub social_security: Decimal,
    /// Health welfare contribution.
    pub health_welfare: Decimal,
    /// Income tax withheld.
    pub income_tax: Decimal,
}

impl Deductions {
    /// Sum of all deduction components.
    pub fn total(&self) -> Decimal {
        self.retirement_fund + self.social_security + self.health_welfare + self.income_tax
    }
}

/// Employer-side contributions of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerContributions {
    /// Employer Social Security contribution.
    pub social_security: Decimal,
    /// Employer health welfare contribution.
    pub health_welfare: Decimal,
}

/// The payroll outcome of one funding allocation in one pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRecord {
    /// Deterministic id derived from the record key.
    pub id: Uuid,
    /// The employee paid.
    pub employee_id: String,
    /// The employment paid.
    pub employment_id: String,
    /// The funding allocation charged.
    pub allocation_id: String,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// Funding source of the allocation.
    pub allocation_type: AllocationType,
    /// The allocation's level of effort.
    pub level_of_effort: Decimal,
    /// Monthly base salary of the employment before weighting.
    pub monthly_base: Decimal,
    /// Gross salary charged to this allocation.
    pub gross_salary: Decimal,
    /// Compensation refund paid with this record.
    pub compensation_refund: Decimal,
    /// 13th-month salary accrued this period.
    pub thirteenth_month_accrual: Decimal,
    /// Gross salary plus refund plus accrual.
    pub total_income: Decimal,
    /// Employee-side deductions.
    pub deductions: Deductions,
    /// Total income minus deductions. May be negative.
    pub net_salary: Decimal,
    /// Employer-side contributions.
    pub employer_contributions: EmployerContributions,
    /// Set when the record needs a human look before payment (e.g. negative net salary).
    pub needs_review: bool,
    /// How the figures were derived.
    pub audit_steps: Vec<AuditStep>,
}

impl PayrollRecord {
    /// The unique key of this record.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            employment_id: self.employment_id.clone(),
            allocation_id: self.allocation_id.clone(),
            pay_period: self.pay_period,
        }
    }

    /// The subsidiary paying for this record.
    pub fn funding_subsidiary(&self) -> Subsidiary {
        self.allocation_type.funding_subsidiary()
    }
}

/// The committed outcome of one employee's payroll for a pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollResult {
    /// The employee.
    pub employee_id: String,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// One record per active allocation.
    pub records: Vec<PayrollRecord>,
    /// Advances for records funded by another subsidiary.
    pub advances: Vec<InterSubsidiaryAdvance>,
}

impl PayrollResult {
    /// Sum of net salary over all records.
    pub fn total_net_salary(&self) -> Decimal {
        self.records.iter().map(|r| r.net_salary).sum()
    }
}
