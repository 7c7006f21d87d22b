//! Detection of inter-subsidiary advances.

use crate::config::RoutingTable;
use crate::error::EngineResult;
use crate::models::{
    AdvancePreview, AdvanceState, Employee, InterSubsidiaryAdvance, PayPeriod, PayrollRecord,
};

/// Raises a pending advance for every record funded by a subsidiary other
/// than the employee's own.
///
/// The advance moves the record's net salary from the funding subsidiary to
/// the employing one through the funding subsidiary's hub grant. Records
/// funded by the employing subsidiary never produce an advance.
///
/// # Errors
///
/// Returns `MissingHubGrant` if the routing table has no hub grant for a
/// funding subsidiary that needs one.
///
/// # Examples
///
/// ```
/// use payroll_engine::config::RoutingTable;
/// use payroll_engine::engine::detect_advances;
/// use payroll_engine::models::{Employee, FilerProfile, PayPeriod, ResidencyClass, Subsidiary};
///
/// let employee = Employee {
///     id: "emp_001".to_string(),
///     subsidiary: Subsidiary::Smru,
///     residency_class: ResidencyClass::LocalId,
///     filer_profile: FilerProfile::single(),
/// };
/// let advances = detect_advances(
///     &employee,
///     PayPeriod::new(2025, 3).unwrap(),
///     &[],
///     &RoutingTable::default(),
/// )?;
/// assert!(advances.is_empty());
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
pub fn detect_advances(
    employee: &Employee,
    pay_period: PayPeriod,
    records: &[PayrollRecord],
    routing: &RoutingTable,
) -> EngineResult<Vec<InterSubsidiaryAdvance>> {
    records
        .iter()
        .filter(|record| record.funding_subsidiary() != employee.subsidiary)
        .map(|record| {
            let from = record.funding_subsidiary();
            let hub_grant = routing.hub_grant(from)?;
            Ok(InterSubsidiaryAdvance {
                id: InterSubsidiaryAdvance::id_for_record(record.id, 0),
                payroll_record_id: record.id,
                revision: 0,
                employee_id: employee.id.clone(),
                from_subsidiary: from,
                to_subsidiary: employee.subsidiary,
                routing_hub_grant_id: hub_grant.to_string(),
                amount: record.net_salary,
                pay_period,
                state: AdvanceState::Pending,
            })
        })
        .collect()
}

/// Turns detected advances into previews, attaching the state of any stored
/// advance for the same record.
pub fn to_previews(
    records: &[PayrollRecord],
    advances: Vec<InterSubsidiaryAdvance>,
    existing_state: impl Fn(&InterSubsidiaryAdvance) -> Option<AdvanceState>,
) -> Vec<AdvancePreview> {
    advances
        .into_iter()
        .map(|advance| {
            let allocation_id = records
                .iter()
                .find(|r| r.id == advance.payroll_record_id)
                .map(|r| r.allocation_id.clone())
                .unwrap_or_default();
            AdvancePreview {
                allocation_id,
                payroll_record_id: advance.payroll_record_id,
                from_subsidiary: advance.from_subsidiary,
                to_subsidiary: advance.to_subsidiary,
                existing_state: existing_state(&advance),
                routing_hub_grant_id: advance.routing_hub_grant_id,
                amount: advance.amount,
                pay_period: advance.pay_period,
            }
        })
        .collect()
}
