//! HTTP gateway for companion-nlp

pub mod bus;
pub mod error;
pub mod health;
pub mod sse;

pub use bus::{bus_routes, MODE_HTTP_HEADER};
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use sse::sse_routes;
