//! Reference Store Workflow
//!
//! `nlp.analyze` in reference mode receives an identifier instead of text:
//!
//! ```text
//! Received -> Fetching -> Processing -> Persisting -> Replied
//!     \           \            \             \
//!      +-----------+------------+-------------+--> Failed
//! ```
//!
//! The analysis is written back under the `nlp` field of the same entry and
//! the reply echoes the identifier. Writes are last-writer-wins; with
//! [`KeyedLocks`] enabled, runs for the same identifier are serialized so a
//! later request always persists after an earlier one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use companion_common::codec;
use companion_common::events::{CompanionEvent, EventBus};
use companion_common::store::{ReferenceStore, FIELD_NLP};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::error::{NlpError, NlpResult};
use crate::models::{infer, ModelPort};
use crate::pipeline;

/// Workflow state of one reference request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Received,
    Fetching,
    Processing,
    Persisting,
    Replied,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Replied | WorkflowState::Failed)
    }

    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, next) {
            (Received, Fetching)
            | (Fetching, Processing)
            | (Processing, Persisting)
            | (Persisting, Replied) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Received => "received",
            WorkflowState::Fetching => "fetching",
            WorkflowState::Processing => "processing",
            WorkflowState::Persisting => "persisting",
            WorkflowState::Replied => "replied",
            WorkflowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Visited states of one run
struct Trace<'a> {
    reference_id: &'a str,
    states: Vec<WorkflowState>,
}

impl<'a> Trace<'a> {
    fn new(reference_id: &'a str) -> Self {
        Self {
            reference_id,
            states: vec![WorkflowState::Received],
        }
    }

    fn current(&self) -> WorkflowState {
        self.states
            .last()
            .copied()
            .unwrap_or(WorkflowState::Received)
    }

    fn advance(&mut self, next: WorkflowState) -> NlpResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(NlpError::Internal(format!(
                "Invalid workflow transition {} -> {}",
                current, next
            )));
        }
        debug!(reference_id = self.reference_id, from = %current, to = %next, "Workflow transition");
        self.states.push(next);
        Ok(())
    }
}

/// Per-key async mutual exclusion
///
/// Entries are created on first use and removed once no task holds or
/// waits for the key.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held lock on one key, released on drop
pub struct KeyGuard {
    owner: Arc<KeyedLocks>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(self: &Arc<Self>, key: &str) -> KeyGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            owner: Arc::clone(self),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Fetch -> analyze -> persist for reference identifiers
#[derive(Clone)]
pub struct ReferenceWorkflow {
    store: Arc<dyn ReferenceStore>,
    models: Arc<dyn ModelPort>,
    events: EventBus,
    locks: Option<Arc<KeyedLocks>>,
}

impl ReferenceWorkflow {
    pub fn new(store: Arc<dyn ReferenceStore>, models: Arc<dyn ModelPort>, events: EventBus) -> Self {
        Self {
            store,
            models,
            events,
            locks: None,
        }
    }

    /// Serialize runs per identifier
    pub fn with_locking(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(|| Arc::new(KeyedLocks::new()));
        self
    }

    pub fn is_locking(&self) -> bool {
        self.locks.is_some()
    }

    /// Analyze the message stored under `reference_id`; returns the identifier
    pub async fn run(&self, reference_id: &str) -> NlpResult<String> {
        self.run_with_trace(reference_id).await.0
    }

    /// Like [`run`](Self::run), also returning the visited states
    pub async fn run_with_trace(
        &self,
        reference_id: &str,
    ) -> (NlpResult<String>, Vec<WorkflowState>) {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.lock(reference_id).await),
            None => None,
        };

        let mut trace = Trace::new(reference_id);
        let result = self.execute(reference_id, &mut trace).await;

        if let Err(e) = &result {
            warn!(reference_id, state = %trace.current(), "Reference workflow failed: {}", e);
            // Failed is reachable from every non-terminal state
            let _ = trace.advance(WorkflowState::Failed);
        }

        (result, trace.states)
    }

    async fn execute(&self, reference_id: &str, trace: &mut Trace<'_>) -> NlpResult<String> {
        trace.advance(WorkflowState::Fetching)?;
        let entry = self
            .store
            .get(reference_id)
            .await?
            .ok_or_else(|| NlpError::NotFound(format!("No reference entry {}", reference_id)))?;
        let text = entry
            .message()
            .ok_or_else(|| {
                NlpError::NotFound(format!("Reference {} has no readable message", reference_id))
            })?
            .to_string();

        trace.advance(WorkflowState::Processing)?;
        let analyzed = infer(&self.models, move |models| pipeline::analyze(models, &text)).await?;

        trace.advance(WorkflowState::Persisting)?;
        let frame = codec::encode(&analyzed)?;
        self.store.put(reference_id, FIELD_NLP, frame).await?;

        info!(
            reference_id,
            backend = self.store.backend_name(),
            sentence_count = analyzed.sentences.len(),
            "Analysis persisted"
        );
        self.events.emit_lossy(CompanionEvent::AnalysisPersisted {
            reference_id: reference_id.to_string(),
            sentence_count: analyzed.sentences.len(),
            timestamp: chrono::Utc::now(),
        });

        trace.advance(WorkflowState::Replied)?;
        Ok(reference_id.to_string())
    }
}
