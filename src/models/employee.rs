//! Employee model and related types.
//!
//! This module defines the [`Employee`] snapshot together with the organisational
//! and tax-filing enums that drive deduction rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An organisational unit that employs staff or funds their salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subsidiary {
    /// Shoklo Malaria Research Unit.
    #[serde(rename = "SMRU")]
    Smru,
    /// Borderland Health Foundation.
    #[serde(rename = "BHF")]
    Bhf,
}

impl fmt::Display for Subsidiary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsidiary::Smru => f.write_str("SMRU"),
            Subsidiary::Bhf => f.write_str("BHF"),
        }
    }
}

/// Residency status class of an employee.
///
/// Decides between Provident Fund and Saving Fund and selects the employer
/// health-welfare rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyClass {
    /// Holder of a Thai resident ID card.
    LocalId,
    /// Local staff without a Thai resident ID.
    LocalNonId,
    /// Expatriate staff.
    Expat,
}

impl ResidencyClass {
    /// Returns true if this class contributes to the Provident Fund rather than the Saving Fund.
    pub fn contributes_to_provident_fund(&self) -> bool {
        matches!(self, ResidencyClass::LocalId)
    }
}

/// Marital status as declared for income tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    /// Not married.
    Single,
    /// Married.
    Married,
}

/// The tax-filing profile used for personal allowances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilerProfile {
    /// Declared marital status.
    pub marital_status: MaritalStatus,
    /// Whether the spouse earns income of their own.
    #[serde(default)]
    pub spouse_has_income: bool,
    /// Number of dependent children.
    #[serde(default)]
    pub children: u32,
}

impl FilerProfile {
    /// A single filer with no dependents.
    pub fn single() -> Self {
        Self {
            marital_status: MaritalStatus::Single,
            spouse_has_income: false,
            children: 0,
        }
    }

    /// Returns true if the spouse allowance may be claimed.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::models::{FilerProfile, MaritalStatus};
    ///
    /// let profile = FilerProfile {
    ///     marital_status: MaritalStatus::Married,
    ///     spouse_has_income: false,
    ///     children: 2,
    /// };
    /// assert!(profile.claims_spouse_allowance());
    /// ```
    pub fn claims_spouse_allowance(&self) -> bool {
        self.marital_status == MaritalStatus::Married && !self.spouse_has_income
    }
}

/// Represents an employee as seen by the payroll engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// The subsidiary that employs this person.
    pub subsidiary: Subsidiary,
    /// Residency status class.
    pub residency_class: ResidencyClass,
    /// Tax-filing profile.
    pub filer_profile: FilerProfile,
}
