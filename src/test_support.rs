//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{
    EmployerHealthWelfareRule, HealthWelfareRules, RoutingTable, TaxBracket, TaxConfig,
    TaxSettings,
};
use crate::models::{
    AllocationType, Employee, EmployeeSnapshot, EmploymentTerm, FilerProfile, FundingAllocation,
    PayPeriod, ResidencyClass, Subsidiary,
};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn period(y: i32, m: u32) -> PayPeriod {
    PayPeriod::new(y, m).unwrap()
}

fn bracket(lower: &str, upper: Option<&str>, rate: &str, base: &str) -> TaxBracket {
    TaxBracket {
        lower_bound: dec(lower),
        upper_bound: upper.map(dec),
        rate: dec(rate),
        base_tax: dec(base),
    }
}

/// The Thai personal income tax schedule.
pub fn thai_tax_config(year: i32) -> TaxConfig {
    TaxConfig {
        tax_year: year,
        version: 1,
        brackets: vec![
            bracket("0", Some("150000"), "0", "0"),
            bracket("150000", Some("300000"), "0.05", "0"),
            bracket("300000", Some("500000"), "0.10", "7500"),
            bracket("500000", Some("750000"), "0.15", "27500"),
            bracket("750000", Some("1000000"), "0.20", "65000"),
            bracket("1000000", Some("2000000"), "0.25", "115000"),
            bracket("2000000", Some("5000000"), "0.30", "365000"),
            bracket("5000000", None, "0.35", "1265000"),
        ],
        settings: TaxSettings {
            employment_deduction_rate: dec("0.5"),
            employment_deduction_cap: dec("100000"),
            personal_allowance: dec("60000"),
            spouse_allowance: dec("60000"),
            child_allowance_first: dec("30000"),
            child_allowance_subsequent: dec("60000"),
            ssf_rate: dec("0.05"),
            ssf_min_salary: dec("1650"),
            ssf_max_salary: dec("15000"),
            ssf_monthly_cap: dec("750"),
            pvd_rate: dec("0.075"),
            pvd_cap: dec("10000"),
            saving_fund_rate: dec("0.075"),
            saving_fund_cap: dec("10000"),
        },
    }
}

pub fn routing_table() -> RoutingTable {
    RoutingTable {
        hub_grants: HashMap::from([
            (Subsidiary::Smru, "SMRU-HUB-0001".to_string()),
            (Subsidiary::Bhf, "BHF-HUB-0001".to_string()),
        ]),
    }
}

pub fn health_welfare_rules() -> HealthWelfareRules {
    HealthWelfareRules {
        employer_rules: vec![EmployerHealthWelfareRule {
            subsidiary: Subsidiary::Smru,
            residency_class: ResidencyClass::LocalId,
            employer_multiplier: dec("1"),
        }],
    }
}

pub fn employee(id: &str, subsidiary: Subsidiary) -> Employee {
    Employee {
        id: id.to_string(),
        subsidiary,
        residency_class: ResidencyClass::LocalId,
        filer_profile: FilerProfile::single(),
    }
}

/// A term well past probation with no annual increment due in 2025.
pub fn employment_term(position_salary: &str) -> EmploymentTerm {
    EmploymentTerm {
        id: "empl_001".to_string(),
        position_salary: dec(position_salary),
        probation_salary: dec(position_salary),
        probation_pass_date: date(2024, 9, 1),
        start_date: date(2024, 6, 1),
        fte: Decimal::ONE,
    }
}

pub fn grant(id: &str, subsidiary: Subsidiary, loe: &str) -> FundingAllocation {
    FundingAllocation {
        id: id.to_string(),
        allocation_type: AllocationType::Grant {
            grant_id: format!("GRANT-{}", id),
            subsidiary,
        },
        level_of_effort: dec(loe),
        start_date: date(2024, 6, 1),
        end_date: None,
    }
}

pub fn org_funded(id: &str, subsidiary: Subsidiary, loe: &str) -> FundingAllocation {
    FundingAllocation {
        id: id.to_string(),
        allocation_type: AllocationType::OrgFunded {
            fund_id: format!("FUND-{}", id),
            subsidiary,
        },
        level_of_effort: dec(loe),
        start_date: date(2024, 6, 1),
        end_date: None,
    }
}

/// SMRU employee paid 25,000 a month, 20% from a BHF grant and 80% from SMRU funds.
pub fn split_funding_snapshot() -> EmployeeSnapshot {
    EmployeeSnapshot {
        employee: employee("emp_001", Subsidiary::Smru),
        employment: employment_term("25000"),
        allocations: vec![
            grant("alloc_grant", Subsidiary::Bhf, "0.2"),
            org_funded("alloc_org", Subsidiary::Smru, "0.8"),
        ],
        adjustments: vec![],
    }
}
