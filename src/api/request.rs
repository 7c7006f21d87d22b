//! Request types for the payroll engine API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PayPeriod;

use super::response::{ApiError, ApiErrorResponse};

/// Request body for the `/payroll/bulk` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPayrollRequest {
    /// Employees to compute, in processing order.
    pub employee_ids: Vec<String>,
    /// The pay period, `YYYY-MM`.
    pub pay_period: PayPeriod,
}

/// Parses a pay period path segment.
pub(crate) fn parse_pay_period(value: &str) -> Result<PayPeriod, ApiErrorResponse> {
    value
        .parse()
        .map_err(|_| ApiErrorResponse::bad_request(ApiError::invalid_pay_period(value)))
}

/// Parses an advance id path segment.
pub(crate) fn parse_advance_id(value: &str) -> Result<Uuid, ApiErrorResponse> {
    Uuid::parse_str(value)
        .map_err(|_| ApiErrorResponse::bad_request(ApiError::invalid_advance_id(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_request_deserializes_period() {
        let json = r#"{ "employee_ids": ["emp_001", "emp_002"], "pay_period": "2025-03" }"#;
        let request: BulkPayrollRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.employee_ids.len(), 2);
        assert_eq!(request.pay_period, PayPeriod::new(2025, 3).unwrap());
    }

    #[test]
    fn test_bulk_request_rejects_bad_period() {
        let json = r#"{ "employee_ids": [], "pay_period": "2025-13" }"#;
        assert!(serde_json::from_str::<BulkPayrollRequest>(json).is_err());
    }

    #[test]
    fn test_parse_pay_period_segment() {
        assert!(parse_pay_period("2025-03").is_ok());
        let err = parse_pay_period("March").unwrap_err();
        assert_eq!(err.error.code, "INVALID_PAY_PERIOD");
    }
}
