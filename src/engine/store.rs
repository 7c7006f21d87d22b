//! Persistence of payroll records and inter-subsidiary advances.
//!
//! A [`PayrollCommit`] carries one employee's complete record set for a pay
//! period together with the advances detected for it. The store applies it as
//! one unit: every record and advance change is checked first and written only
//! if all of them are allowed.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AdvanceState, InterSubsidiaryAdvance, PayPeriod, PayrollRecord, PayrollResult, RecordKey,
};

/// One employee's computed payroll for a pay period, ready to persist.
#[derive(Debug, Clone)]
pub struct PayrollCommit {
    /// The employee.
    pub employee_id: String,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// The complete record set; replaces whatever was stored before.
    pub records: Vec<PayrollRecord>,
    /// Pending advances for records funded by another subsidiary.
    pub advances: Vec<InterSubsidiaryAdvance>,
}

/// What an invalidation removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    /// The employee.
    pub employee_id: String,
    /// The pay period.
    pub pay_period: PayPeriod,
    /// Records deleted.
    pub records_removed: usize,
    /// Pending advances moved to `Cancelled`.
    pub advances_cancelled: usize,
}

/// Transactional storage for payroll results.
pub trait PayrollStore: Send + Sync {
    /// Atomically replaces the employee's record set for the period and
    /// reconciles its advances, returning what is now stored.
    fn commit(&self, commit: &PayrollCommit) -> EngineResult<PayrollResult>;

    /// The stored result of an employee for a period, `None` if nothing is stored.
    fn load(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Option<PayrollResult>>;

    /// Looks up an advance by id.
    fn advance(&self, advance_id: Uuid) -> EngineResult<Option<InterSubsidiaryAdvance>>;

    /// The latest advance raised for a payroll record, in any state.
    fn current_advance(
        &self,
        payroll_record_id: Uuid,
    ) -> EngineResult<Option<InterSubsidiaryAdvance>>;

    /// Moves a pending advance to `Settled`.
    fn settle_advance(&self, advance_id: Uuid) -> EngineResult<InterSubsidiaryAdvance>;

    /// Deletes the record set of an employee for a period and cancels its
    /// pending advances. Rejected if one of the advances is settled.
    fn invalidate(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Invalidation>;
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<RecordKey, PayrollRecord>,
    record_sets: HashMap<(String, PayPeriod), Vec<RecordKey>>,
    advances: HashMap<Uuid, InterSubsidiaryAdvance>,
    /// Payroll record id to the id of its latest advance.
    current: HashMap<Uuid, Uuid>,
}

impl StoreState {
    fn current_advance(&self, payroll_record_id: Uuid) -> Option<&InterSubsidiaryAdvance> {
        self.current
            .get(&payroll_record_id)
            .and_then(|id| self.advances.get(id))
    }

    fn current_advances_of(
        &self,
        employee_id: &str,
        pay_period: PayPeriod,
    ) -> Vec<&InterSubsidiaryAdvance> {
        self.current
            .values()
            .filter_map(|id| self.advances.get(id))
            .filter(|a| a.employee_id == employee_id && a.pay_period == pay_period)
            .collect()
    }

    fn write_advance(&mut self, advance: InterSubsidiaryAdvance) {
        self.current.insert(advance.payroll_record_id, advance.id);
        self.advances.insert(advance.id, advance);
    }

    fn result_for(&self, employee_id: &str, pay_period: PayPeriod) -> Option<PayrollResult> {
        let keys = self
            .record_sets
            .get(&(employee_id.to_string(), pay_period))?;
        let records: Vec<PayrollRecord> = keys
            .iter()
            .filter_map(|k| self.records.get(k).cloned())
            .collect();
        let advances = records
            .iter()
            .filter_map(|r| {
                self.current_advance(r.id)
                    .filter(|a| a.state != AdvanceState::Cancelled)
                    .cloned()
            })
            .collect();
        Some(PayrollResult {
            employee_id: employee_id.to_string(),
            pay_period,
            records,
            advances,
        })
    }
}

/// Computes the advance writes a commit needs, rejecting the commit if a
/// settled advance would change.
///
/// A cancelled advance stays cancelled; a record that needs an advance again
/// gets a fresh one at the next revision.
fn reconcile_advances(
    state: &StoreState,
    commit: &PayrollCommit,
) -> EngineResult<Vec<InterSubsidiaryAdvance>> {
    let mut writes = Vec::new();

    for candidate in &commit.advances {
        match state.current_advance(candidate.payroll_record_id) {
            None => writes.push(InterSubsidiaryAdvance {
                state: AdvanceState::Pending,
                ..candidate.clone()
            }),
            Some(existing) => match existing.state {
                AdvanceState::Pending => writes.push(InterSubsidiaryAdvance {
                    id: existing.id,
                    revision: existing.revision,
                    state: AdvanceState::Pending,
                    ..candidate.clone()
                }),
                AdvanceState::Cancelled => {
                    let fresh = existing.reissue();
                    writes.push(InterSubsidiaryAdvance {
                        id: fresh.id,
                        revision: fresh.revision,
                        state: AdvanceState::Pending,
                        ..candidate.clone()
                    })
                }
                AdvanceState::Settled => {
                    if existing.amount != candidate.amount {
                        return Err(EngineError::SettledAdvanceConflict {
                            advance_id: existing.id,
                        });
                    }
                }
            },
        }
    }

    for stale in state.current_advances_of(&commit.employee_id, commit.pay_period) {
        if commit
            .advances
            .iter()
            .any(|a| a.payroll_record_id == stale.payroll_record_id)
        {
            continue;
        }
        match stale.state {
            AdvanceState::Pending => {
                let mut cancelled = stale.clone();
                cancelled.cancel()?;
                writes.push(cancelled);
            }
            AdvanceState::Settled => {
                return Err(EngineError::SettledAdvanceConflict {
                    advance_id: stale.id,
                });
            }
            AdvanceState::Cancelled => {}
        }
    }

    Ok(writes)
}

/// A [`PayrollStore`] held in memory behind a single lock.
#[derive(Debug, Default)]
pub struct InMemoryPayrollStore {
    state: RwLock<StoreState>,
}

impl InMemoryPayrollStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored across all employees and periods.
    pub fn record_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Number of advances stored, in any state and revision.
    pub fn advance_count(&self) -> usize {
        self.state.read().advances.len()
    }
}

impl PayrollStore for InMemoryPayrollStore {
    fn commit(&self, commit: &PayrollCommit) -> EngineResult<PayrollResult> {
        let mut state = self.state.write();
        let advance_writes = reconcile_advances(&state, commit)?;

        let set_key = (commit.employee_id.clone(), commit.pay_period);
        if let Some(previous) = state.record_sets.remove(&set_key) {
            for key in previous {
                state.records.remove(&key);
            }
        }
        let keys: Vec<RecordKey> = commit.records.iter().map(PayrollRecord::key).collect();
        for record in &commit.records {
            state.records.insert(record.key(), record.clone());
        }
        state.record_sets.insert(set_key, keys);

        let advances_written = advance_writes.len();
        for advance in advance_writes {
            state.write_advance(advance);
        }

        debug!(
            employee_id = %commit.employee_id,
            pay_period = %commit.pay_period,
            records = commit.records.len(),
            advances_written,
            "Committed payroll"
        );

        state
            .result_for(&commit.employee_id, commit.pay_period)
            .ok_or_else(|| EngineError::PersistenceFailed {
                message: "committed record set is not readable".to_string(),
            })
    }

    fn load(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Option<PayrollResult>> {
        Ok(self.state.read().result_for(employee_id, pay_period))
    }

    fn advance(&self, advance_id: Uuid) -> EngineResult<Option<InterSubsidiaryAdvance>> {
        Ok(self.state.read().advances.get(&advance_id).cloned())
    }

    fn current_advance(
        &self,
        payroll_record_id: Uuid,
    ) -> EngineResult<Option<InterSubsidiaryAdvance>> {
        Ok(self.state.read().current_advance(payroll_record_id).cloned())
    }

    fn settle_advance(&self, advance_id: Uuid) -> EngineResult<InterSubsidiaryAdvance> {
        let mut state = self.state.write();
        let advance = state
            .advances
            .get_mut(&advance_id)
            .ok_or(EngineError::AdvanceNotFound { advance_id })?;
        advance.settle()?;
        Ok(advance.clone())
    }

    fn invalidate(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Invalidation> {
        let mut state = self.state.write();

        let mut cancelled = Vec::new();
        for advance in state.current_advances_of(employee_id, pay_period) {
            match advance.state {
                AdvanceState::Settled => {
                    return Err(EngineError::SettledAdvanceConflict {
                        advance_id: advance.id,
                    });
                }
                AdvanceState::Pending => {
                    let mut advance = advance.clone();
                    advance.cancel()?;
                    cancelled.push(advance);
                }
                AdvanceState::Cancelled => {}
            }
        }

        let advances_cancelled = cancelled.len();
        for advance in cancelled {
            state.write_advance(advance);
        }

        let removed = state
            .record_sets
            .remove(&(employee_id.to_string(), pay_period));
        let records_removed = match removed {
            Some(keys) => {
                for key in &keys {
                    state.records.remove(key);
                }
                keys.len()
            }
            None => 0,
        };

        Ok(Invalidation {
            employee_id: employee_id.to_string(),
            pay_period,
            records_removed,
            advances_cancelled,
        })
    }
}
