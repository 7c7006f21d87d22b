//! HTTP API module for the payroll engine.
//!
//! This module exposes payroll computation, bulk runs, advance previews and
//! settlement, and the tax configuration write path over REST.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::BulkPayrollRequest;
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
