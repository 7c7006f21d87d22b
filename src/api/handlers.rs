//! HTTP request handlers for the payroll engine API.
//!
//! This module contains the handler functions for all API endpoints.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TaxConfig;
use crate::engine::{BatchControl, BatchResult, Invalidation};
use crate::error::EngineError;
use crate::models::{AdvancePreview, EmployeeSnapshot, InterSubsidiaryAdvance, PayrollResult};

use super::request::{BulkPayrollRequest, parse_advance_id, parse_pay_period};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

type ApiResult<T> = Result<T, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/payroll/bulk", post(bulk_payroll_handler))
        .route(
            "/payroll/:employee_id/:pay_period",
            post(compute_payroll_handler)
                .get(get_payroll_handler)
                .delete(invalidate_payroll_handler),
        )
        .route(
            "/advances/preview/:employee_id/:pay_period",
            get(preview_advances_handler),
        )
        .route("/advances/:advance_id/settle", post(settle_advance_handler))
        .route("/config/tax/:year", put(update_tax_config_handler))
        .route("/employees/:employee_id", put(upsert_employee_handler))
        .with_state(state)
}

/// Turns a JSON body rejection into a 400 response.
fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> ApiErrorResponse {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    ApiErrorResponse::bad_request(error)
}

fn engine_failure(correlation_id: Uuid, err: EngineError) -> ApiErrorResponse {
    warn!(
        correlation_id = %correlation_id,
        reason_code = err.reason_code(),
        error = %err,
        "Request failed"
    );
    err.into()
}

/// Maps a failed tax configuration update. Broken bracket tables are a 422.
fn config_rejection(correlation_id: Uuid, err: EngineError) -> ApiErrorResponse {
    match err {
        EngineError::MalformedBrackets { .. } => {
            warn!(
                correlation_id = %correlation_id,
                reason_code = err.reason_code(),
                error = %err,
                "Tax configuration rejected"
            );
            ApiErrorResponse::unprocessable(ApiError::with_details(
                err.reason_code(),
                "Tax configuration rejected",
                err.to_string(),
            ))
        }
        err => engine_failure(correlation_id, err),
    }
}

/// Handler for POST /payroll/:employee_id/:pay_period.
async fn compute_payroll_handler(
    State(state): State<AppState>,
    Path((employee_id, pay_period)): Path<(String, String)>,
) -> ApiResult<Json<PayrollResult>> {
    let correlation_id = Uuid::new_v4();
    let pay_period = parse_pay_period(&pay_period)?;
    info!(
        correlation_id = %correlation_id,
        employee_id = %employee_id,
        pay_period = %pay_period,
        "Processing payroll request"
    );

    let result = state
        .engine()
        .compute_payroll(&employee_id, pay_period)
        .await
        .map_err(|err| engine_failure(correlation_id, err))?;
    Ok(Json(result))
}

/// Handler for GET /payroll/:employee_id/:pay_period.
async fn get_payroll_handler(
    State(state): State<AppState>,
    Path((employee_id, pay_period)): Path<(String, String)>,
) -> ApiResult<Json<PayrollResult>> {
    let correlation_id = Uuid::new_v4();
    let pay_period = parse_pay_period(&pay_period)?;

    state
        .engine()
        .payroll(&employee_id, pay_period)
        .map_err(|err| engine_failure(correlation_id, err))?
        .map(Json)
        .ok_or_else(|| {
            ApiErrorResponse::not_found(ApiError::new(
                "PAYROLL_NOT_FOUND",
                format!("No payroll stored for {} in {}", employee_id, pay_period),
            ))
        })
}

/// Handler for DELETE /payroll/:employee_id/:pay_period.
async fn invalidate_payroll_handler(
    State(state): State<AppState>,
    Path((employee_id, pay_period)): Path<(String, String)>,
) -> ApiResult<Json<Invalidation>> {
    let correlation_id = Uuid::new_v4();
    let pay_period = parse_pay_period(&pay_period)?;

    let invalidation = state
        .engine()
        .invalidate_payroll(&employee_id, pay_period)
        .map_err(|err| engine_failure(correlation_id, err))?;
    Ok(Json(invalidation))
}

/// Handler for POST /payroll/bulk.
async fn bulk_payroll_handler(
    State(state): State<AppState>,
    payload: Result<Json<BulkPayrollRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResult>> {
    let correlation_id = Uuid::new_v4();
    let Json(request) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;

    let start_time = Instant::now();
    let employees = request.employee_ids.len();
    let result = state
        .engine()
        .compute_bulk_payroll(request.employee_ids, request.pay_period, &BatchControl::new())
        .await;
    info!(
        correlation_id = %correlation_id,
        employees,
        halted = result.halt.is_some(),
        duration_us = start_time.elapsed().as_micros(),
        "Bulk payroll request completed"
    );
    Ok(Json(result))
}

/// Handler for GET /advances/preview/:employee_id/:pay_period.
async fn preview_advances_handler(
    State(state): State<AppState>,
    Path((employee_id, pay_period)): Path<(String, String)>,
) -> ApiResult<Json<Vec<AdvancePreview>>> {
    let correlation_id = Uuid::new_v4();
    let pay_period = parse_pay_period(&pay_period)?;

    let previews = state
        .engine()
        .preview_advances(&employee_id, pay_period)
        .map_err(|err| engine_failure(correlation_id, err))?;
    Ok(Json(previews))
}

/// Handler for POST /advances/:advance_id/settle.
async fn settle_advance_handler(
    State(state): State<AppState>,
    Path(advance_id): Path<String>,
) -> ApiResult<Json<InterSubsidiaryAdvance>> {
    let correlation_id = Uuid::new_v4();
    let advance_id = parse_advance_id(&advance_id)?;

    let advance = state
        .engine()
        .settle_advance(advance_id)
        .map_err(|err| engine_failure(correlation_id, err))?;
    Ok(Json(advance))
}

/// Handler for PUT /config/tax/:year.
async fn update_tax_config_handler(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    payload: Result<Json<TaxConfig>, JsonRejection>,
) -> ApiResult<Json<TaxConfig>> {
    let correlation_id = Uuid::new_v4();
    let Json(config) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;
    if config.tax_year != year {
        return Err(ApiErrorResponse::unprocessable(ApiError::validation_error(
            format!(
                "Body declares tax year {} but the path names {}",
                config.tax_year, year
            ),
        )));
    }

    let stored = state
        .engine()
        .config()
        .update_tax_config(config)
        .map_err(|err| config_rejection(correlation_id, err))?;
    Ok(Json(TaxConfig::clone(&stored)))
}

/// Handler for PUT /employees/:employee_id.
async fn upsert_employee_handler(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    payload: Result<Json<EmployeeSnapshot>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmployeeSnapshot>)> {
    let correlation_id = Uuid::new_v4();
    let Json(snapshot) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;
    if snapshot.employee.id != employee_id {
        return Err(ApiErrorResponse::unprocessable(ApiError::validation_error(
            format!(
                "Body is for employee '{}' but the path names '{}'",
                snapshot.employee.id, employee_id
            ),
        )));
    }

    let status = match state.directory().upsert(snapshot.clone()) {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    };
    info!(correlation_id = %correlation_id, employee_id = %employee_id, "Employee snapshot stored");
    Ok((status, Json(snapshot)))
}
