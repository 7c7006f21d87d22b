//! Bulk payroll runs over many employees.
//!
//! Employees are computed on a bounded pool of tasks. A validation failure
//! only fails its employee; a computation failure means the configuration is
//! broken for everyone, so dispatch stops and the batch reports a halt.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::PayPeriod;

use super::payroll::PayrollEngine;

/// Handle for stopping a running batch.
///
/// Aborting stops new employees from being dispatched; computations already
/// running finish and commit.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    aborted: Arc<AtomicBool>,
}

impl BatchControl {
    /// Creates a handle that has not been aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops dispatching.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// One employee that failed in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// The employee.
    pub employee_id: String,
    /// Stable reason code of the error.
    pub reason_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl BatchFailure {
    fn from_error(employee_id: String, err: &EngineError) -> Self {
        Self {
            employee_id,
            reason_code: err.reason_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Counts of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Employees requested.
    pub total: usize,
    /// Employees committed.
    pub succeeded: usize,
    /// Employees that failed.
    pub failed: usize,
    /// Employees never started because of an abort or halt.
    pub not_dispatched: usize,
    /// Whether a computation error halted the batch.
    pub halted: bool,
    /// Whether the batch was aborted.
    pub aborted: bool,
}

/// The outcome of a bulk payroll run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// The pay period.
    pub pay_period: PayPeriod,
    /// Employees committed, in request order.
    pub succeeded: Vec<String>,
    /// Employees that failed, in request order.
    pub failed: Vec<BatchFailure>,
    /// Employees never started, in request order.
    pub not_dispatched: Vec<String>,
    /// The computation error that halted the batch, if any.
    pub halt: Option<BatchFailure>,
    /// Whether the batch was aborted through its [`BatchControl`].
    pub aborted: bool,
}

impl BatchResult {
    /// Counts of this batch.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.succeeded.len() + self.failed.len() + self.not_dispatched.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            not_dispatched: self.not_dispatched.len(),
            halted: self.halt.is_some(),
            aborted: self.aborted,
        }
    }
}

impl PayrollEngine {
    /// Computes payroll for many employees on a bounded worker pool.
    ///
    /// At most `worker_count` employees run at once. Each employee commits
    /// independently. Dispatch stops when `control` is aborted or when an
    /// employee fails with a computation error; the remaining employees are
    /// reported as not dispatched.
    pub async fn compute_bulk_payroll(
        &self,
        employee_ids: Vec<String>,
        pay_period: PayPeriod,
        control: &BatchControl,
    ) -> BatchResult {
        let batch_id = Uuid::new_v4();
        let start_time = Instant::now();
        let worker_count = self.settings().worker_count.max(1);
        info!(
            batch_id = %batch_id,
            pay_period = %pay_period,
            employees = employee_ids.len(),
            worker_count,
            "Starting bulk payroll"
        );

        let order: HashMap<String, usize> = employee_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut dispatched = Vec::new();
        let mut not_dispatched = Vec::new();

        let mut pending = employee_ids.into_iter();
        while let Some(employee_id) = pending.next() {
            let permit = if control.is_aborted() || halted.load(Ordering::SeqCst) {
                None
            } else {
                Arc::clone(&semaphore).acquire_owned().await.ok()
            };
            // dispatch state may have changed while waiting for a permit
            let permit = match permit {
                Some(permit) if !control.is_aborted() && !halted.load(Ordering::SeqCst) => permit,
                _ => {
                    not_dispatched.push(employee_id);
                    not_dispatched.extend(pending.by_ref());
                    break;
                }
            };

            let engine = self.clone();
            let halted = Arc::clone(&halted);
            let task_employee = employee_id.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = engine.compute_payroll(&task_employee, pay_period).await;
                if let Err(err) = &outcome {
                    if err.is_fatal_to_batch() {
                        halted.store(true, Ordering::SeqCst);
                    }
                }
                (task_employee, outcome)
            });
            dispatched.push(employee_id);
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut halt = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((employee_id, Ok(_))) => succeeded.push(employee_id),
                Ok((employee_id, Err(err))) => {
                    let failure = BatchFailure::from_error(employee_id, &err);
                    if err.is_fatal_to_batch() {
                        error!(
                            batch_id = %batch_id,
                            employee_id = %failure.employee_id,
                            pay_period = %pay_period,
                            reason_code = %failure.reason_code,
                            error = %err,
                            "Computation error, batch halted"
                        );
                        if halt.is_none() {
                            halt = Some(failure.clone());
                        }
                    } else {
                        warn!(
                            batch_id = %batch_id,
                            employee_id = %failure.employee_id,
                            reason_code = %failure.reason_code,
                            error = %err,
                            "Employee failed"
                        );
                    }
                    failed.push(failure);
                }
                Err(join_err) => {
                    error!(batch_id = %batch_id, error = %join_err, "Payroll task panicked");
                }
            }
        }

        // a panicked task loses its employee id; recover it from the dispatch list
        for employee_id in dispatched {
            let reported = succeeded.contains(&employee_id)
                || failed.iter().any(|f: &BatchFailure| f.employee_id == employee_id);
            if !reported {
                failed.push(BatchFailure {
                    employee_id,
                    reason_code: "TASK_FAILED".to_string(),
                    message: "payroll task panicked".to_string(),
                });
            }
        }

        let position = |id: &String| order.get(id).copied().unwrap_or(usize::MAX);
        succeeded.sort_by_key(position);
        failed.sort_by_key(|f| position(&f.employee_id));

        let result = BatchResult {
            pay_period,
            succeeded,
            failed,
            not_dispatched,
            halt,
            aborted: control.is_aborted(),
        };
        let summary = result.summary();
        info!(
            batch_id = %batch_id,
            pay_period = %pay_period,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            not_dispatched = summary.not_dispatched,
            halted = summary.halted,
            aborted = summary.aborted,
            duration_ms = start_time.elapsed().as_millis(),
            "Bulk payroll finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::{ConfigStore, InMemoryTaxConfigSource, TaxConfigSource};
    use crate::engine::{
        EngineSettings, InMemoryEmployeeDirectory, InMemoryPayrollStore, RetryPolicy,
    };
    use crate::models::EmployeeSnapshot;
    use crate::test_support::{
        dec, health_welfare_rules, period, routing_table, split_funding_snapshot, thai_tax_config,
    };

    fn snapshot(id: &str) -> EmployeeSnapshot {
        let mut snapshot = split_funding_snapshot();
        snapshot.employee.id = id.to_string();
        snapshot.employment.id = format!("empl_{}", id);
        snapshot
    }

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("emp_{:03}", i)).collect()
    }

    fn build(
        source: Arc<InMemoryTaxConfigSource>,
        snapshots: Vec<EmployeeSnapshot>,
        worker_count: usize,
    ) -> PayrollEngine {
        let source: Arc<dyn TaxConfigSource> = source;
        let config = Arc::new(ConfigStore::new(source, routing_table(), health_welfare_rules()));
        PayrollEngine::new(
            config,
            Arc::new(InMemoryEmployeeDirectory::new(snapshots)),
            Arc::new(InMemoryPayrollStore::new()),
            EngineSettings {
                worker_count,
                retry: RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_millis(1),
                },
            },
        )
    }

    fn engine_for(count: usize) -> PayrollEngine {
        build(
            Arc::new(InMemoryTaxConfigSource::new([thai_tax_config(2025)])),
            ids(count).iter().map(|id| snapshot(id)).collect(),
            4,
        )
    }

    #[tokio::test]
    async fn test_bulk_run_succeeds_for_all() {
        let engine = engine_for(20);
        let result = engine
            .compute_bulk_payroll(ids(20), period(2025, 3), &BatchControl::new())
            .await;

        assert_eq!(result.succeeded, ids(20));
        assert!(result.failed.is_empty());
        assert!(result.halt.is_none());
        assert_eq!(result.summary().succeeded, 20);
    }

    #[tokio::test]
    async fn test_validation_failure_does_not_stop_batch() {
        let mut snapshots: Vec<EmployeeSnapshot> = ids(5).iter().map(|id| snapshot(id)).collect();
        snapshots[2].allocations[0].level_of_effort = dec("0.5");
        let engine = build(
            Arc::new(InMemoryTaxConfigSource::new([thai_tax_config(2025)])),
            snapshots,
            2,
        );

        let mut requested = ids(5);
        requested.push("emp_unknown".to_string());
        let result = engine
            .compute_bulk_payroll(requested, period(2025, 3), &BatchControl::new())
            .await;

        assert_eq!(result.succeeded.len(), 4);
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.failed[0].employee_id, "emp_002");
        assert_eq!(result.failed[0].reason_code, "LOE_SUM_MISMATCH");
        assert_eq!(result.failed[1].reason_code, "EMPLOYEE_NOT_FOUND");
        assert!(result.halt.is_none());
        assert!(result.not_dispatched.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_brackets_halt_batch() {
        let mut broken = thai_tax_config(2025);
        broken.brackets[3].base_tax = dec("1");
        let engine = build(
            Arc::new(InMemoryTaxConfigSource::new([broken])),
            ids(10).iter().map(|id| snapshot(id)).collect(),
            1,
        );

        let result = engine
            .compute_bulk_payroll(ids(10), period(2025, 3), &BatchControl::new())
            .await;

        let halt = result.halt.clone().unwrap();
        assert_eq!(halt.employee_id, "emp_000");
        assert_eq!(halt.reason_code, "MALFORMED_BRACKETS");
        assert!(result.succeeded.is_empty());
        assert_eq!(result.failed.len() + result.not_dispatched.len(), 10);
        assert!(!result.not_dispatched.is_empty());
        assert!(result.summary().halted);
    }

    #[tokio::test]
    async fn test_aborted_batch_dispatches_nothing_more() {
        let engine = engine_for(10);
        let control = BatchControl::new();
        control.abort();

        let result = engine
            .compute_bulk_payroll(ids(10), period(2025, 3), &control)
            .await;

        assert!(result.succeeded.is_empty());
        assert_eq!(result.not_dispatched, ids(10));
        assert!(result.aborted);
    }

    #[tokio::test]
    async fn test_abort_mid_run_lets_in_flight_finish() {
        let engine = engine_for(200);
        let control = BatchControl::new();
        let run = {
            let engine = engine.clone();
            let control = control.clone();
            tokio::spawn(async move {
                engine
                    .compute_bulk_payroll(ids(200), period(2025, 3), &control)
                    .await
            })
        };
        tokio::task::yield_now().await;
        control.abort();
        let result = run.await.unwrap();

        assert!(result.aborted);
        assert_eq!(
            result.succeeded.len() + result.failed.len() + result.not_dispatched.len(),
            200
        );
        for id in &result.succeeded {
            assert!(engine.payroll(id, period(2025, 3)).unwrap().is_some());
        }
    }
}
