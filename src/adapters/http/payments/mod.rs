//! Payments HTTP adapter - checkout, provider webhooks and queue operations.
//!
//! Provides endpoints for:
//! - Opening checkout sessions with Stripe or Datatrans
//! - Receiving signed provider callbacks
//! - Inspecting and re-arming the side-effect queue

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;

pub use handlers::{PaymentsApiError, PaymentsAppState};
pub use routes::{api_router, app};
