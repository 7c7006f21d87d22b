//! Inter-subsidiary advance models.
//!
//! An advance is raised when a salary is charged to an allocation funded by a
//! subsidiary other than the employer. It is routed through the funding
//! subsidiary's hub grant and tracked until settlement.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

use super::{PayPeriod, Subsidiary};

/// Namespace for advance ids derived from payroll record ids.
const ADVANCE_NAMESPACE: Uuid = Uuid::from_u128(0x0b8e_52d1_7f3a_4c69_9e24_d5a8_16c0_f7b2);

/// Lifecycle state of an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceState {
    /// Raised and awaiting settlement.
    Pending,
    /// Settled by the external settlement workflow. Terminal.
    Settled,
    /// Withdrawn because the owning payroll record was invalidated.
    Cancelled,
}

impl fmt::Display for AdvanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvanceState::Pending => f.write_str("pending"),
            AdvanceState::Settled => f.write_str("settled"),
            AdvanceState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A cash advance between two subsidiaries for one payroll record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterSubsidiaryAdvance {
    /// Deterministic id derived from the payroll record id and the revision.
    pub id: Uuid,
    /// The payroll record this advance covers. One live advance per record.
    pub payroll_record_id: Uuid,
    /// Zero for the first advance of a record, bumped each time a cancelled
    /// advance is replaced by a fresh one.
    #[serde(default)]
    pub revision: u32,
    /// The employee whose salary is advanced.
    pub employee_id: String,
    /// The subsidiary funding the allocation.
    pub from_subsidiary: Subsidiary,
    /// The subsidiary that employs and pays the employee.
    pub to_subsidiary: Subsidiary,
    /// The hub grant the money is routed through.
    pub routing_hub_grant_id: String,
    /// The amount advanced, equal to the record's net salary.
    pub amount: Decimal,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// Current lifecycle state.
    pub state: AdvanceState,
}

impl InterSubsidiaryAdvance {
    /// The advance id belonging to a payroll record at a revision.
    pub fn id_for_record(payroll_record_id: Uuid, revision: u32) -> Uuid {
        let mut name = payroll_record_id.as_bytes().to_vec();
        if revision > 0 {
            name.extend_from_slice(&revision.to_be_bytes());
        }
        Uuid::new_v5(&ADVANCE_NAMESPACE, &name)
    }

    /// A fresh pending advance replacing this cancelled one, with the next revision.
    pub fn reissue(&self) -> Self {
        let revision = self.revision + 1;
        Self {
            id: Self::id_for_record(self.payroll_record_id, revision),
            revision,
            state: AdvanceState::Pending,
            ..self.clone()
        }
    }

    /// Moves a pending advance to `Settled`.
    pub fn settle(&mut self) -> EngineResult<()> {
        self.transition(AdvanceState::Settled)
    }

    /// Moves a pending advance to `Cancelled`.
    pub fn cancel(&mut self) -> EngineResult<()> {
        self.transition(AdvanceState::Cancelled)
    }

    fn transition(&mut self, to: AdvanceState) -> EngineResult<()> {
        match (self.state, to) {
            (AdvanceState::Pending, AdvanceState::Settled)
            | (AdvanceState::Pending, AdvanceState::Cancelled) => {
                self.state = to;
                Ok(())
            }
            (from, to) => Err(EngineError::InvalidAdvanceTransition {
                advance_id: self.id,
                from,
                to,
            }),
        }
    }
}

/// A read-only view of the advance a payroll run would raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancePreview {
    /// The allocation that triggers the advance.
    pub allocation_id: String,
    /// The payroll record the advance would belong to.
    pub payroll_record_id: Uuid,
    /// The subsidiary funding the allocation.
    pub from_subsidiary: Subsidiary,
    /// The employing subsidiary.
    pub to_subsidiary: Subsidiary,
    /// The hub grant used for routing.
    pub routing_hub_grant_id: String,
    /// The amount that would be advanced.
    pub amount: Decimal,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// State of an already stored advance for the same record, if any.
    pub existing_state: Option<AdvanceState>,
}
