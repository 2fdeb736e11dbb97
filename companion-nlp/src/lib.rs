//! companion-nlp library - NLP orchestration service
//!
//! Serves tokenization, POS tagging, sentence detection, person name
//! finding and full text analysis on the message bus, plus an HTTP gateway
//! onto that bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use companion_common::events::EventBus;
use companion_common::MessageBus;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod router;
pub mod workflow;

pub use error::{NlpError, NlpResult};
pub use models::{ModelPort, ModelSet};
pub use router::{NlpService, StartOptions};
pub use workflow::{ReferenceWorkflow, WorkflowState};

/// Startup phase reported by /health
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Models loading; bus addresses not registered yet
    Loading,
    Ready,
    /// Model load failed; the process is about to exit
    Failed(String),
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub bus: MessageBus,
    pub events: EventBus,
    pub status: Arc<RwLock<ServiceStatus>>,
    pub startup_time: Instant,
    /// Gateway-side limit on waiting for a bus reply
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(bus: MessageBus, events: EventBus, request_timeout: Duration) -> Self {
        Self {
            bus,
            events,
            status: Arc::new(RwLock::new(ServiceStatus::Loading)),
            startup_time: Instant::now(),
            request_timeout,
        }
    }

    pub async fn status(&self) -> ServiceStatus {
        self.status.read().await.clone()
    }

    pub async fn set_status(&self, status: ServiceStatus) {
        *self.status.write().await = status;
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::bus_routes())
        .merge(api::sse_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
