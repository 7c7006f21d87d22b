//! Configuration types for payroll calculation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{ResidencyClass, Subsidiary};

/// One income tax bracket.
///
/// The bracket covers `[lower_bound, upper_bound)`; an income equal to a
/// boundary belongs to the higher bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Inclusive lower bound of taxable income.
    pub lower_bound: Decimal,
    /// Exclusive upper bound. `None` for the open top bracket.
    #[serde(default)]
    pub upper_bound: Option<Decimal>,
    /// Marginal rate applied within the bracket.
    pub rate: Decimal,
    /// Tax due on all income below `lower_bound`.
    pub base_tax: Decimal,
}

impl TaxBracket {
    /// Tax due on `taxable` income falling inside this bracket.
    pub fn tax_for(&self, taxable: Decimal) -> Decimal {
        self.base_tax + (taxable - self.lower_bound) * self.rate
    }
}

/// Deduction, allowance and contribution settings for a tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Share of income deductible as employment expense.
    pub employment_deduction_rate: Decimal,
    /// Annual cap on the employment expense deduction.
    pub employment_deduction_cap: Decimal,
    /// Personal allowance per filer.
    pub personal_allowance: Decimal,
    /// Allowance for a spouse without income.
    pub spouse_allowance: Decimal,
    /// Allowance for the first child.
    pub child_allowance_first: Decimal,
    /// Allowance for each further child.
    pub child_allowance_subsequent: Decimal,
    /// Social Security contribution rate.
    pub ssf_rate: Decimal,
    /// Lowest monthly salary used as Social Security base.
    pub ssf_min_salary: Decimal,
    /// Highest monthly salary used as Social Security base.
    pub ssf_max_salary: Decimal,
    /// Monthly cap on the Social Security contribution, per side.
    pub ssf_monthly_cap: Decimal,
    /// Provident Fund contribution rate.
    pub pvd_rate: Decimal,
    /// Monthly cap on the Provident Fund contribution.
    pub pvd_cap: Decimal,
    /// Saving Fund contribution rate.
    pub saving_fund_rate: Decimal,
    /// Monthly cap on the Saving Fund contribution.
    pub saving_fund_cap: Decimal,
}

/// Brackets and settings for one tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    /// The tax year the configuration applies to.
    pub tax_year: i32,
    /// Revision of this year's configuration, bumped on every update.
    #[serde(default = "initial_version")]
    pub version: u32,
    /// Brackets ordered by lower bound.
    pub brackets: Vec<TaxBracket>,
    /// Deduction and contribution settings.
    pub settings: TaxSettings,
}

fn initial_version() -> u32 {
    1
}

impl TaxConfig {
    /// Checks the structural invariants of the bracket table and settings.
    ///
    /// The table must start at zero, be contiguous with no gaps or overlaps,
    /// end in a single unbounded bracket, have non-decreasing rates in `[0, 1]`,
    /// and carry base taxes that make the tax function continuous.
    pub fn validate(&self) -> EngineResult<()> {
        let malformed = |message: String| EngineError::MalformedBrackets {
            year: self.tax_year,
            message,
        };

        let first = self
            .brackets
            .first()
            .ok_or_else(|| malformed("no brackets configured".to_string()))?;
        if !first.lower_bound.is_zero() {
            return Err(malformed(format!(
                "first bracket starts at {} instead of 0",
                first.lower_bound
            )));
        }
        if !first.base_tax.is_zero() {
            return Err(malformed("first bracket has a non-zero base tax".to_string()));
        }

        for (index, bracket) in self.brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(malformed(format!(
                    "bracket {} has rate {} outside [0, 1]",
                    index, bracket.rate
                )));
            }
            let is_last = index + 1 == self.brackets.len();
            match bracket.upper_bound {
                Some(upper) if upper <= bracket.lower_bound => {
                    return Err(malformed(format!(
                        "bracket {} upper bound {} is not above lower bound {}",
                        index, upper, bracket.lower_bound
                    )));
                }
                Some(_) if is_last => {
                    return Err(malformed("top bracket must be unbounded".to_string()));
                }
                None if !is_last => {
                    return Err(malformed(format!(
                        "bracket {} is unbounded but not the top bracket",
                        index
                    )));
                }
                _ => {}
            }
        }

        for (index, pair) in self.brackets.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            // validated above: only the last bracket is unbounded
            let prev_upper = prev.upper_bound.unwrap_or(prev.lower_bound);
            if prev_upper != next.lower_bound {
                let kind = if prev_upper < next.lower_bound {
                    "gap"
                } else {
                    "overlap"
                };
                return Err(malformed(format!(
                    "{} between bracket {} (ends {}) and bracket {} (starts {})",
                    kind,
                    index,
                    prev_upper,
                    index + 1,
                    next.lower_bound
                )));
            }
            if next.rate < prev.rate {
                return Err(malformed(format!(
                    "rate decreases from {} to {} at {}",
                    prev.rate, next.rate, next.lower_bound
                )));
            }
            let expected_base = prev.tax_for(prev_upper);
            if next.base_tax != expected_base {
                return Err(malformed(format!(
                    "bracket {} base tax {} does not continue from {}",
                    index + 1,
                    next.base_tax,
                    expected_base
                )));
            }
        }

        self.validate_settings()
    }

    fn validate_settings(&self) -> EngineResult<()> {
        let s = &self.settings;
        let non_negative = [
            ("employment_deduction_rate", s.employment_deduction_rate),
            ("employment_deduction_cap", s.employment_deduction_cap),
            ("personal_allowance", s.personal_allowance),
            ("spouse_allowance", s.spouse_allowance),
            ("child_allowance_first", s.child_allowance_first),
            ("child_allowance_subsequent", s.child_allowance_subsequent),
            ("ssf_rate", s.ssf_rate),
            ("ssf_min_salary", s.ssf_min_salary),
            ("ssf_max_salary", s.ssf_max_salary),
            ("ssf_monthly_cap", s.ssf_monthly_cap),
            ("pvd_rate", s.pvd_rate),
            ("pvd_cap", s.pvd_cap),
            ("saving_fund_rate", s.saving_fund_rate),
            ("saving_fund_cap", s.saving_fund_cap),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, v)| *v < Decimal::ZERO) {
            return Err(EngineError::MalformedBrackets {
                year: self.tax_year,
                message: format!("setting {} is negative ({})", name, value),
            });
        }
        if s.ssf_min_salary > s.ssf_max_salary {
            return Err(EngineError::MalformedBrackets {
                year: self.tax_year,
                message: "ssf_min_salary exceeds ssf_max_salary".to_string(),
            });
        }
        Ok(())
    }

    /// Finds the bracket containing `taxable` income.
    ///
    /// Uses a binary search over the ordered lower bounds. Returns `None` only
    /// for negative income.
    pub fn bracket_for(&self, taxable: Decimal) -> Option<(usize, &TaxBracket)> {
        let index = self
            .brackets
            .partition_point(|b| b.lower_bound <= taxable)
            .checked_sub(1)?;
        self.brackets.get(index).map(|b| (index, b))
    }
}

/// Static mapping from funding subsidiary to its routing hub grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Hub grant id per subsidiary.
    pub hub_grants: HashMap<Subsidiary, String>,
}

impl RoutingTable {
    /// The hub grant of a funding subsidiary.
    pub fn hub_grant(&self, subsidiary: Subsidiary) -> EngineResult<&str> {
        self.hub_grants
            .get(&subsidiary)
            .map(String::as_str)
            .ok_or(EngineError::MissingHubGrant { subsidiary })
    }
}

/// Employer health-welfare rule for a subsidiary and residency class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerHealthWelfareRule {
    /// The employing subsidiary.
    pub subsidiary: Subsidiary,
    /// The employee's residency class.
    pub residency_class: ResidencyClass,
    /// Employer contribution as a multiple of the employee contribution.
    pub employer_multiplier: Decimal,
}

/// The employer health-welfare rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthWelfareRules {
    /// Rules, at most one per subsidiary and residency class.
    #[serde(default)]
    pub employer_rules: Vec<EmployerHealthWelfareRule>,
}

impl HealthWelfareRules {
    /// Employer multiplier for a subsidiary and residency class. Zero when no rule exists.
    pub fn employer_multiplier(
        &self,
        subsidiary: Subsidiary,
        residency_class: ResidencyClass,
    ) -> Decimal {
        self.employer_rules
            .iter()
            .find(|r| r.subsidiary == subsidiary && r.residency_class == residency_class)
            .map(|r| r.employer_multiplier)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dec, thai_tax_config};

    #[test]
    fn test_thai_schedule_is_valid() {
        assert!(thai_tax_config(2025).validate().is_ok());
    }

    #[test]
    fn test_gap_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets[1].lower_bound = dec("150001");
        match config.validate() {
            Err(EngineError::MalformedBrackets { year, message }) => {
                assert_eq!(year, 2025);
                assert!(message.contains("gap"), "{}", message);
            }
            other => panic!("Expected MalformedBrackets, got {:?}", other),
        }
    }

    #[test]
    fn test_overlap_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets[0].upper_bound = Some(dec("160000"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_decreasing_rate_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets[3].rate = dec("0.01");
        let err = config.validate().unwrap_err();
        assert_eq!(err.reason_code(), "MALFORMED_BRACKETS");
    }

    #[test]
    fn test_discontinuous_base_tax_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets[2].base_tax = dec("7000");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not continue"));
    }

    #[test]
    fn test_bounded_top_bracket_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets[7].upper_bound = Some(dec("10000000"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.brackets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_ssf_range_is_rejected() {
        let mut config = thai_tax_config(2025);
        config.settings.ssf_min_salary = dec("20000");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bracket_lookup_boundaries_belong_to_higher_bracket() {
        let config = thai_tax_config(2025);
        assert_eq!(config.bracket_for(dec("0")).unwrap().0, 0);
        assert_eq!(config.bracket_for(dec("149999.99")).unwrap().0, 0);
        assert_eq!(config.bracket_for(dec("150000")).unwrap().0, 1);
        assert_eq!(config.bracket_for(dec("5000000")).unwrap().0, 7);
        assert_eq!(config.bracket_for(dec("99999999")).unwrap().0, 7);
        assert!(config.bracket_for(dec("-1")).is_none());
    }

    #[test]
    fn test_routing_table_missing_subsidiary() {
        let table = RoutingTable::default();
        match table.hub_grant(Subsidiary::Bhf) {
            Err(EngineError::MissingHubGrant { subsidiary }) => {
                assert_eq!(subsidiary, Subsidiary::Bhf)
            }
            other => panic!("Expected MissingHubGrant, got {:?}", other),
        }
    }

    #[test]
    fn test_health_welfare_multiplier_defaults_to_zero() {
        let rules = HealthWelfareRules {
            employer_rules: vec![EmployerHealthWelfareRule {
                subsidiary: Subsidiary::Smru,
                residency_class: ResidencyClass::LocalNonId,
                employer_multiplier: dec("1"),
            }],
        };
        assert_eq!(
            rules.employer_multiplier(Subsidiary::Smru, ResidencyClass::LocalNonId),
            dec("1")
        );
        assert_eq!(
            rules.employer_multiplier(Subsidiary::Bhf, ResidencyClass::LocalNonId),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_deserialize_tax_config_yaml() {
        let yaml = r#"
tax_year: 2025
brackets:
  - { lower_bound: "0", upper_bound: "150000", rate: "0", base_tax: "0" }
  - { lower_bound: "150000", rate: "0.05", base_tax: "0" }
settings:
  employment_deduction_rate: "0.5"
  employment_deduction_cap: "100000"
  personal_allowance: "60000"
  spouse_allowance: "60000"
  child_allowance_first: "30000"
  child_allowance_subsequent: "60000"
  ssf_rate: "0.05"
  ssf_min_salary: "1650"
  ssf_max_salary: "15000"
  ssf_monthly_cap: "750"
  pvd_rate: "0.075"
  pvd_cap: "500000"
  saving_fund_rate: "0.075"
  saving_fund_cap: "500000"
"#;
        let config: TaxConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.brackets.len(), 2);
        assert!(config.brackets[1].upper_bound.is_none());
        assert!(config.validate().is_ok());
    }
}
