//! Employment terms, funding allocations and the per-employee snapshot.
//!
//! These are read-only inputs supplied by the HR system for one calculation run.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::{Employee, PayPeriod, Subsidiary};

/// Largest monthly salary or refund accepted, in THB. Keeps every product in
/// the calculation within `Decimal` range.
pub const MAX_MONTHLY_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// The active employment contract of an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentTerm {
    /// Unique identifier of the employment.
    pub id: String,
    /// Full monthly salary of the position after probation.
    pub position_salary: Decimal,
    /// Monthly salary paid during probation.
    pub probation_salary: Decimal,
    /// The day probation ends; from the next day the position salary applies.
    pub probation_pass_date: NaiveDate,
    /// First day of employment.
    pub start_date: NaiveDate,
    /// Full-time equivalent fraction in (0, 1].
    #[serde(default = "full_time_equivalent")]
    pub fte: Decimal,
}

fn full_time_equivalent() -> Decimal {
    Decimal::ONE
}

impl EmploymentTerm {
    /// Calendar days of service from the start date up to `on`.
    pub fn service_days(&self, on: NaiveDate) -> i64 {
        (on - self.start_date).num_days()
    }

    /// Returns true if at least `months` calendar months of service have been completed by `on`.
    pub fn has_served_months(&self, months: u32, on: NaiveDate) -> bool {
        self.start_date
            .checked_add_months(Months::new(months))
            .is_some_and(|anniversary| anniversary <= on)
    }

    /// Returns true if probation has ended on or before `on`.
    pub fn probation_passed_by(&self, on: NaiveDate) -> bool {
        self.probation_pass_date <= on
    }

    /// Checks that the term carries usable figures.
    pub fn validate(&self) -> EngineResult<()> {
        if self.position_salary < Decimal::ZERO {
            return Err(invalid("position_salary", "must not be negative"));
        }
        if self.probation_salary < Decimal::ZERO {
            return Err(invalid("probation_salary", "must not be negative"));
        }
        for (field, salary) in [
            ("position_salary", self.position_salary),
            ("probation_salary", self.probation_salary),
        ] {
            if salary > MAX_MONTHLY_AMOUNT {
                return Err(invalid(
                    field,
                    &format!("{} exceeds {}", salary, MAX_MONTHLY_AMOUNT),
                ));
            }
        }
        if self.fte <= Decimal::ZERO || self.fte > Decimal::ONE {
            return Err(invalid(
                "fte",
                &format!("{} is outside (0, 1]", self.fte),
            ));
        }
        if self.probation_pass_date < self.start_date {
            return Err(invalid(
                "probation_pass_date",
                "is before the employment start date",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> EngineError {
    EngineError::InvalidEmployment {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Where an allocation's money comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationType {
    /// Funded by a research grant held by a subsidiary.
    Grant {
        /// The grant identifier.
        grant_id: String,
        /// The subsidiary holding the grant.
        subsidiary: Subsidiary,
    },
    /// Funded from an organisational fund.
    OrgFunded {
        /// The fund identifier.
        fund_id: String,
        /// The subsidiary owning the fund.
        subsidiary: Subsidiary,
    },
}

impl AllocationType {
    /// The subsidiary paying for this allocation.
    pub fn funding_subsidiary(&self) -> Subsidiary {
        match self {
            AllocationType::Grant { subsidiary, .. } => *subsidiary,
            AllocationType::OrgFunded { subsidiary, .. } => *subsidiary,
        }
    }

    /// The grant or fund identifier.
    pub fn source_id(&self) -> &str {
        match self {
            AllocationType::Grant { grant_id, .. } => grant_id,
            AllocationType::OrgFunded { fund_id, .. } => fund_id,
        }
    }
}

/// One funding source covering part of an employment's cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingAllocation {
    /// Unique identifier of the allocation.
    pub id: String,
    /// Grant or organisational funding.
    pub allocation_type: AllocationType,
    /// Fraction of the employment paid from this source, in (0, 1].
    pub level_of_effort: Decimal,
    /// First day the allocation applies (inclusive).
    pub start_date: NaiveDate,
    /// Day the allocation stops applying (exclusive). `None` means open-ended.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl FundingAllocation {
    /// Returns true if the allocation's validity window `[start, end)` contains `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.is_none_or(|end| date < end)
    }
}

/// A one-off amount for an allocation in a given pay period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAdjustment {
    /// The pay period the adjustment belongs to.
    pub pay_period: PayPeriod,
    /// The allocation it is booked against.
    pub allocation_id: String,
    /// Refunded compensation added to total income.
    pub compensation_refund: Decimal,
}

/// Everything the engine needs to know about one employee for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    /// The employee.
    pub employee: Employee,
    /// The active employment term.
    pub employment: EmploymentTerm,
    /// All funding allocations of the employment, active or not.
    pub allocations: Vec<FundingAllocation>,
    /// Period adjustments such as compensation refunds.
    #[serde(default)]
    pub adjustments: Vec<PeriodAdjustment>,
}

impl EmployeeSnapshot {
    /// Checks the employment term and the magnitude of every adjustment.
    pub fn validate(&self) -> EngineResult<()> {
        self.employment.validate()?;
        for adjustment in &self.adjustments {
            if adjustment.compensation_refund.abs() > MAX_MONTHLY_AMOUNT {
                return Err(invalid(
                    "compensation_refund",
                    &format!(
                        "{} on allocation '{}' exceeds {}",
                        adjustment.compensation_refund,
                        adjustment.allocation_id,
                        MAX_MONTHLY_AMOUNT
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Allocations valid on the pay period's closing date, in input order.
    pub fn active_allocations(&self, pay_period: PayPeriod) -> Vec<&FundingAllocation> {
        let closing = pay_period.closing_date();
        self.allocations
            .iter()
            .filter(|a| a.is_active_on(closing))
            .collect()
    }

    /// Total compensation refund for an allocation in a pay period.
    pub fn compensation_refund(&self, pay_period: PayPeriod, allocation_id: &str) -> Decimal {
        self.adjustments
            .iter()
            .filter(|adj| adj.pay_period == pay_period && adj.allocation_id == allocation_id)
            .map(|adj| adj.compensation_refund)
            .sum()
    }
}
