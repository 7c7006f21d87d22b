//! The payroll engine.
//!
//! [`PayrollEngine`] ties the directory, the configuration store and the
//! payroll store together. One call to [`PayrollEngine::compute_payroll`]
//! computes and commits one employee for one pay period as a single unit.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ConfigStore;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::models::{
    AdvancePreview, EmployeeSnapshot, InterSubsidiaryAdvance, PayPeriod, PayrollRecord,
    PayrollResult,
};

use super::advances::{detect_advances, to_previews};
use super::directory::EmployeeDirectory;
use super::plan::compute_records;
use super::store::{Invalidation, PayrollCommit, PayrollStore};

/// Retry schedule for commits that fail with a persistence error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled before each further one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Tuning of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Concurrent employee computations in a bulk run.
    pub worker_count: usize,
    /// Retry schedule for persistence failures.
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            worker_count: 8,
            retry: RetryPolicy::default(),
        }
    }
}

type RunKey = (String, PayPeriod);

/// Employees and periods with a computation in flight.
#[derive(Debug, Default)]
struct InFlightRegistry {
    keys: Mutex<HashSet<RunKey>>,
}

/// Releases its key from the registry when dropped.
struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    key: RunKey,
}

impl InFlightRegistry {
    fn acquire(self: &Arc<Self>, employee_id: &str, pay_period: PayPeriod) -> EngineResult<InFlightGuard> {
        let key = (employee_id.to_string(), pay_period);
        if !self.keys.lock().insert(key.clone()) {
            return Err(EngineError::ComputationInFlight {
                employee_id: employee_id.to_string(),
                pay_period,
            });
        }
        Ok(InFlightGuard {
            registry: Arc::clone(self),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.keys.lock().remove(&self.key);
    }
}

/// Computes, commits and tracks payroll per employee and pay period.
///
/// Cheap to clone: every clone shares the same stores and in-flight registry.
#[derive(Clone)]
pub struct PayrollEngine {
    config: Arc<ConfigStore>,
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<dyn PayrollStore>,
    settings: EngineSettings,
    in_flight: Arc<InFlightRegistry>,
}

impl PayrollEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(
        config: Arc<ConfigStore>,
        directory: Arc<dyn EmployeeDirectory>,
        store: Arc<dyn PayrollStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            config,
            directory,
            store,
            settings,
            in_flight: Arc::new(InFlightRegistry::default()),
        }
    }

    /// The engine's configuration store.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The engine's tuning.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Computes and commits one employee's payroll for a pay period.
    ///
    /// Records and advances of the employee for the period are replaced as a
    /// whole; on any error nothing is written. A second call for the same
    /// employee and period while one is running fails with
    /// `ComputationInFlight`. Persistence failures are retried per the
    /// engine's [`RetryPolicy`].
    pub async fn compute_payroll(
        &self,
        employee_id: &str,
        pay_period: PayPeriod,
    ) -> EngineResult<PayrollResult> {
        let _guard = self.in_flight.acquire(employee_id, pay_period)?;
        let correlation_id = Uuid::new_v4();
        let start_time = Instant::now();

        let snapshot = self.snapshot(employee_id)?;
        let (records, advances) = self.compute(&snapshot, pay_period)?;
        let commit = PayrollCommit {
            employee_id: employee_id.to_string(),
            pay_period,
            records,
            advances,
        };
        let result = self.commit_with_retry(&commit, correlation_id).await?;

        info!(
            correlation_id = %correlation_id,
            employee_id = %employee_id,
            pay_period = %pay_period,
            records = result.records.len(),
            advances = result.advances.len(),
            net_salary = %result.total_net_salary(),
            duration_us = start_time.elapsed().as_micros(),
            "Payroll computed"
        );
        Ok(result)
    }

    /// Shows the advances a payroll run would raise, without writing anything.
    pub fn preview_advances(
        &self,
        employee_id: &str,
        pay_period: PayPeriod,
    ) -> EngineResult<Vec<AdvancePreview>> {
        let snapshot = self.snapshot(employee_id)?;
        let (records, advances) = self.compute(&snapshot, pay_period)?;

        let mut states = Vec::with_capacity(advances.len());
        for advance in &advances {
            let current = self.store.current_advance(advance.payroll_record_id)?;
            states.push((advance.payroll_record_id, current.map(|a| a.state)));
        }
        Ok(to_previews(&records, advances, |advance| {
            states
                .iter()
                .find(|(record_id, _)| *record_id == advance.payroll_record_id)
                .and_then(|(_, state)| *state)
        }))
    }

    /// The stored payroll of an employee for a pay period.
    pub fn payroll(
        &self,
        employee_id: &str,
        pay_period: PayPeriod,
    ) -> EngineResult<Option<PayrollResult>> {
        self.store.load(employee_id, pay_period)
    }

    /// Marks a pending advance as settled.
    pub fn settle_advance(&self, advance_id: Uuid) -> EngineResult<InterSubsidiaryAdvance> {
        let advance = self.store.settle_advance(advance_id)?;
        info!(advance_id = %advance_id, amount = %advance.amount, "Advance settled");
        Ok(advance)
    }

    /// Deletes an employee's records for a period and cancels their pending advances.
    pub fn invalidate_payroll(
        &self,
        employee_id: &str,
        pay_period: PayPeriod,
    ) -> EngineResult<Invalidation> {
        let _guard = self.in_flight.acquire(employee_id, pay_period)?;
        let invalidation = self.store.invalidate(employee_id, pay_period)?;
        info!(
            employee_id = %employee_id,
            pay_period = %pay_period,
            records_removed = invalidation.records_removed,
            advances_cancelled = invalidation.advances_cancelled,
            "Payroll invalidated"
        );
        Ok(invalidation)
    }

    fn snapshot(&self, employee_id: &str) -> EngineResult<EmployeeSnapshot> {
        self.directory
            .snapshot(employee_id)?
            .ok_or_else(|| EngineError::EmployeeNotFound {
                employee_id: employee_id.to_string(),
            })
    }

    fn compute(
        &self,
        snapshot: &EmployeeSnapshot,
        pay_period: PayPeriod,
    ) -> EngineResult<(Vec<PayrollRecord>, Vec<InterSubsidiaryAdvance>)> {
        let tax_config = self.config.tax_config(pay_period.tax_year())?;
        let employee = &snapshot.employee;
        let multiplier = self
            .config
            .employer_health_welfare_multiplier(employee.subsidiary, employee.residency_class);
        let records = compute_records(snapshot, pay_period, &tax_config, multiplier)?;
        let advances = detect_advances(employee, pay_period, &records, self.config.routing())?;
        Ok((records, advances))
    }

    async fn commit_with_retry(
        &self,
        commit: &PayrollCommit,
        correlation_id: Uuid,
    ) -> EngineResult<PayrollResult> {
        let policy = self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.store.commit(commit) {
                Ok(result) => return Ok(result),
                Err(err) if err.kind() == ErrorKind::Persistence && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        correlation_id = %correlation_id,
                        employee_id = %commit.employee_id,
                        pay_period = %commit.pay_period,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Commit failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::config::{InMemoryTaxConfigSource, TaxConfigSource};
    use crate::engine::{InMemoryEmployeeDirectory, InMemoryPayrollStore};
    use crate::models::{AdvanceState, Subsidiary};
    use crate::test_support::{
        dec, health_welfare_rules, org_funded, period, routing_table, split_funding_snapshot,
        thai_tax_config,
    };

    /// Fails the first `failures` commits with a persistence error.
    struct FlakyStore {
        inner: InMemoryPayrollStore,
        failures: AtomicU32,
        attempts: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryPayrollStore::new(),
                failures: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
            }
        }
    }

    impl PayrollStore for FlakyStore {
        fn commit(&self, commit: &PayrollCommit) -> EngineResult<PayrollResult> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(EngineError::PersistenceFailed {
                    message: "connection reset".to_string(),
                });
            }
            self.inner.commit(commit)
        }
        fn load(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Option<PayrollResult>> {
            self.inner.load(employee_id, pay_period)
        }
        fn advance(&self, advance_id: Uuid) -> EngineResult<Option<InterSubsidiaryAdvance>> {
            self.inner.advance(advance_id)
        }
        fn settle_advance(&self, advance_id: Uuid) -> EngineResult<InterSubsidiaryAdvance> {
            self.inner.settle_advance(advance_id)
        }
        fn current_advance(
            &self,
            payroll_record_id: Uuid,
        ) -> EngineResult<Option<InterSubsidiaryAdvance>> {
            self.inner.current_advance(payroll_record_id)
        }
        fn invalidate(&self, employee_id: &str, pay_period: PayPeriod) -> EngineResult<Invalidation> {
            self.inner.invalidate(employee_id, pay_period)
        }
    }

    fn fast_settings() -> EngineSettings {
        EngineSettings {
            worker_count: 4,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    fn engine_with(store: Arc<dyn PayrollStore>) -> (PayrollEngine, Arc<InMemoryEmployeeDirectory>) {
        let source: Arc<dyn TaxConfigSource> =
            Arc::new(InMemoryTaxConfigSource::new([thai_tax_config(2025)]));
        let config = Arc::new(ConfigStore::new(source, routing_table(), health_welfare_rules()));
        let directory = Arc::new(InMemoryEmployeeDirectory::new([split_funding_snapshot()]));
        let engine = PayrollEngine::new(config, directory.clone(), store, fast_settings());
        (engine, directory)
    }

    fn engine() -> PayrollEngine {
        engine_with(Arc::new(InMemoryPayrollStore::new())).0
    }

    #[tokio::test]
    async fn test_compute_payroll_commits_records_and_advance() {
        let engine = engine();
        let result = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.advances.len(), 1);
        assert_eq!(result.advances[0].amount, result.records[0].net_salary);
        assert_eq!(
            engine.payroll("emp_001", period(2025, 3)).unwrap(),
            Some(result)
        );
    }

    #[tokio::test]
    async fn test_compute_payroll_is_idempotent() {
        let engine = engine();
        let first = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();
        let second = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_employee() {
        let err = engine()
            .compute_payroll("emp_404", period(2025, 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.reason_code(), "EMPLOYEE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_tax_year_is_validation_error() {
        let err = engine()
            .compute_payroll("emp_001", period(2031, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingTaxConfig { year: 2031 }));
    }

    #[tokio::test]
    async fn test_loe_mismatch_persists_nothing() {
        let (engine, directory) = engine_with(Arc::new(InMemoryPayrollStore::new()));
        let mut snapshot = split_funding_snapshot();
        snapshot.allocations[0].level_of_effort = dec("0.1");
        directory.upsert(snapshot);

        let err = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap_err();
        assert_eq!(err.reason_code(), "LOE_SUM_MISMATCH");
        assert!(engine.payroll("emp_001", period(2025, 3)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_retried() {
        let store = Arc::new(FlakyStore::new(2));
        let (engine, _) = engine_with(store.clone());

        let result = engine.compute_payroll("emp_001", period(2025, 3)).await;
        assert!(result.is_ok());
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistence_failure_gives_up_after_max_attempts() {
        let store = Arc::new(FlakyStore::new(5));
        let (engine, _) = engine_with(store.clone());

        let err = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert!(engine.payroll("emp_001", period(2025, 3)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_request_for_same_key_is_rejected() {
        let engine = engine();
        let _held = engine.in_flight.acquire("emp_001", period(2025, 3)).unwrap();

        let err = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);

        // other periods are unaffected
        assert!(engine.compute_payroll("emp_001", period(2025, 4)).await.is_ok());
    }

    #[tokio::test]
    async fn test_in_flight_key_is_released_after_error() {
        let engine = engine();
        assert!(engine.compute_payroll("emp_001", period(2031, 1)).await.is_err());
        assert!(engine.in_flight.acquire("emp_001", period(2031, 1)).is_ok());
    }

    #[tokio::test]
    async fn test_preview_does_not_persist() {
        let engine = engine();
        let previews = engine.preview_advances("emp_001", period(2025, 3)).unwrap();

        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].from_subsidiary, Subsidiary::Bhf);
        assert_eq!(previews[0].existing_state, None);
        assert!(engine.payroll("emp_001", period(2025, 3)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preview_reports_stored_state() {
        let engine = engine();
        let result = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();
        engine.settle_advance(result.advances[0].id).unwrap();

        let previews = engine.preview_advances("emp_001", period(2025, 3)).unwrap();
        assert_eq!(previews[0].existing_state, Some(AdvanceState::Settled));
        assert_eq!(previews[0].amount, result.advances[0].amount);
    }

    #[tokio::test]
    async fn test_regeneration_after_allocation_change_cancels_advance() {
        let (engine, directory) = engine_with(Arc::new(InMemoryPayrollStore::new()));
        let first = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        let mut snapshot = split_funding_snapshot();
        snapshot.allocations = vec![org_funded("alloc_org", Subsidiary::Smru, "1")];
        directory.upsert(snapshot);
        let second = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        assert_eq!(second.records.len(), 1);
        assert!(second.advances.is_empty());
        let cancelled = engine.store.advance(first.advances[0].id).unwrap().unwrap();
        assert_eq!(cancelled.state, AdvanceState::Cancelled);
    }

    #[tokio::test]
    async fn test_restored_allocation_raises_fresh_advance() {
        let (engine, directory) = engine_with(Arc::new(InMemoryPayrollStore::new()));
        let first = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        let mut snapshot = split_funding_snapshot();
        snapshot.allocations = vec![org_funded("alloc_org", Subsidiary::Smru, "1")];
        directory.upsert(snapshot);
        engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        directory.upsert(split_funding_snapshot());
        let third = engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        assert_eq!(third.advances.len(), 1);
        assert_ne!(third.advances[0].id, first.advances[0].id);
        assert_eq!(third.advances[0].state, AdvanceState::Pending);
        assert_eq!(third.advances[0].revision, 1);
        let old = engine.store.advance(first.advances[0].id).unwrap().unwrap();
        assert_eq!(old.state, AdvanceState::Cancelled);

        let previews = engine.preview_advances("emp_001", period(2025, 3)).unwrap();
        assert_eq!(previews[0].existing_state, Some(AdvanceState::Pending));
    }

    #[tokio::test]
    async fn test_invalidate_payroll() {
        let engine = engine();
        engine.compute_payroll("emp_001", period(2025, 3)).await.unwrap();

        let invalidation = engine.invalidate_payroll("emp_001", period(2025, 3)).unwrap();
        assert_eq!(invalidation.records_removed, 2);
        assert_eq!(invalidation.advances_cancelled, 1);
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(50));
        assert_eq!(policy.delay_after(2), Duration::from_millis(100));
    }
}
