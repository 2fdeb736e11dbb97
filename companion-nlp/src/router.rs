//! Request Router: bus addresses -> model operations
//!
//! | address          | request              | reply                          |
//! |------------------|----------------------|--------------------------------|
//! | `nlp.tokens`     | text                 | token array                    |
//! | `nlp.postagging` | token array          | tag array                      |
//! | `nlp.sentences`  | text                 | string array                   |
//! | `nlp.personname` | token array          | PersonName array               |
//! | `nlp.analyze`    | text / reference id  | AnalyzedText / reference id    |
//!
//! Arrays and records travel as wire frames, text as-is. Each address gets
//! one dispatch task that takes messages in delivery order and spawns a task
//! per request, so a slow request never holds up the queue.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use companion_common::bus::Message;
use companion_common::config::AnalyzeMode;
use companion_common::events::{CompanionEvent, EventBus};
use companion_common::store::ReferenceStore;
use companion_common::{Failure, MessageBus, NlpAddress, Payload, Token};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{NlpError, NlpResult};
use crate::models::{infer, ModelPort, ModelSet};
use crate::pipeline;
use crate::workflow::ReferenceWorkflow;

/// Message header selecting how `nlp.analyze` reads its payload
pub const MODE_HEADER: &str = "mode";

/// Settings applied by [`NlpService::start`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Mode used by `nlp.analyze` when a message carries no `mode` header
    pub default_mode: AnalyzeMode,
    /// Serialize reference runs per identifier
    pub reference_locking: bool,
}

/// Handlers for every NLP address
pub struct NlpService {
    models: Arc<dyn ModelPort>,
    workflow: ReferenceWorkflow,
    events: EventBus,
    default_mode: AnalyzeMode,
}

impl NlpService {
    pub fn new(
        models: Arc<dyn ModelPort>,
        store: Arc<dyn ReferenceStore>,
        events: EventBus,
    ) -> Self {
        let workflow = ReferenceWorkflow::new(store, Arc::clone(&models), events.clone());
        Self {
            models,
            workflow,
            events,
            default_mode: AnalyzeMode::default(),
        }
    }

    /// Mode used by `nlp.analyze` when a message carries no `mode` header
    pub fn with_default_mode(mut self, mode: AnalyzeMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Serialize reference runs per identifier
    pub fn with_reference_locking(mut self, enabled: bool) -> Self {
        self.workflow = self.workflow.with_locking(enabled);
        self
    }

    /// Load the models in `models_dir`, then register every address
    ///
    /// Loading runs on the blocking pool. If it fails nothing is registered,
    /// so requesters see no handler rather than a half-ready service.
    pub async fn start(
        models_dir: &Path,
        store: Arc<dyn ReferenceStore>,
        events: EventBus,
        bus: &MessageBus,
        options: StartOptions,
    ) -> NlpResult<Vec<JoinHandle<()>>> {
        let started = Instant::now();
        let dir = models_dir.to_path_buf();
        let models = tokio::task::spawn_blocking(move || ModelSet::load(&dir))
            .await
            .map_err(|e| NlpError::Internal(format!("Model load task failed: {}", e)))??;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let service = Self::new(Arc::new(models), store, events.clone())
            .with_default_mode(options.default_mode)
            .with_reference_locking(options.reference_locking);
        let handles = Arc::new(service).register(bus).await?;

        events.emit_lossy(CompanionEvent::ModelsLoaded {
            models_dir: models_dir.display().to_string(),
            elapsed_ms,
            timestamp: chrono::Utc::now(),
        });
        Ok(handles)
    }

    /// Register a consumer for every address and start dispatching
    ///
    /// All or nothing: if any address is taken, the ones registered so far
    /// are released again.
    pub async fn register(self: Arc<Self>, bus: &MessageBus) -> NlpResult<Vec<JoinHandle<()>>> {
        let mut receivers = Vec::with_capacity(NlpAddress::ALL.len());

        for address in NlpAddress::ALL {
            match bus.consumer(address.address()).await {
                Ok(rx) => receivers.push((address, rx)),
                Err(e) => {
                    for (registered, _) in &receivers {
                        bus.unregister(registered.address()).await;
                    }
                    return Err(e.into());
                }
            }
        }

        let handles: Vec<_> = receivers
            .into_iter()
            .map(|(address, rx)| tokio::spawn(Arc::clone(&self).dispatch_loop(address, rx)))
            .collect();

        info!(
            addresses = NlpAddress::ALL.len(),
            default_mode = ?self.default_mode,
            reference_locking = self.workflow.is_locking(),
            "NLP router registered"
        );
        Ok(handles)
    }

    async fn dispatch_loop(self: Arc<Self>, address: NlpAddress, mut rx: mpsc::Receiver<Message>) {
        debug!(topic = %address, "Dispatch loop started");
        while let Some(message) = rx.recv().await {
            let service = Arc::clone(&self);
            tokio::spawn(async move { service.handle(address, message).await });
        }
        info!(topic = %address, "Dispatch loop stopped");
    }

    /// Answer one message; every message gets exactly one reply
    async fn handle(&self, address: NlpAddress, message: Message) {
        let started = Instant::now();
        let Message {
            id,
            headers,
            body,
            reply_to,
            ..
        } = message;

        let reply = match self.dispatch(address, &headers, body).await {
            Ok(payload) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(topic = %address, request_id = %id, elapsed_ms, "Request completed");
                self.events.emit_lossy(CompanionEvent::RequestCompleted {
                    request_id: id,
                    address: address.address().to_string(),
                    elapsed_ms,
                    timestamp: chrono::Utc::now(),
                });
                Ok(payload)
            }
            Err(e) => {
                let failure = Failure::from(&e);
                warn!(topic = %address, request_id = %id, kind = failure.kind.as_str(), "Request failed: {}", e);
                self.events.emit_lossy(CompanionEvent::RequestFailed {
                    request_id: id,
                    address: address.address().to_string(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                    timestamp: chrono::Utc::now(),
                });
                Err(failure)
            }
        };

        if !reply_to.reply(reply) {
            debug!(topic = %address, request_id = %id, "Requester stopped waiting for the reply");
        }
    }

    /// Run the operation behind `address` on `body`
    pub async fn dispatch(
        &self,
        address: NlpAddress,
        headers: &HashMap<String, String>,
        body: Payload,
    ) -> NlpResult<Payload> {
        match address {
            NlpAddress::Tokens => {
                let text = body.into_text()?;
                let tokens = infer(&self.models, move |m| m.tokenize(&text)).await?;
                Ok(Payload::framed(&tokens)?)
            }
            NlpAddress::PosTagging => {
                let tokens: Vec<Token> = body.decode()?;
                let tags = infer(&self.models, move |m| pipeline::tag_tokens(m, &tokens)).await?;
                Ok(Payload::framed(&tags)?)
            }
            NlpAddress::Sentences => {
                let text = body.into_text()?;
                let sentences = infer(&self.models, move |m| m.detect_sentences(&text)).await?;
                Ok(Payload::framed(&sentences)?)
            }
            NlpAddress::PersonName => {
                let tokens: Vec<Token> = body.decode()?;
                let names =
                    infer(&self.models, move |m| pipeline::find_person_names(m, &tokens)).await?;
                Ok(Payload::framed(&names)?)
            }
            NlpAddress::Analyze => {
                let mode = self.mode_for(headers)?;
                let text = body.into_text()?;
                match mode {
                    AnalyzeMode::Inline => {
                        let analyzed =
                            infer(&self.models, move |m| pipeline::analyze(m, &text)).await?;
                        Ok(Payload::framed(&analyzed)?)
                    }
                    AnalyzeMode::Reference => Ok(Payload::Text(self.workflow.run(&text).await?)),
                }
            }
        }
    }

    fn mode_for(&self, headers: &HashMap<String, String>) -> NlpResult<AnalyzeMode> {
        match headers.get(MODE_HEADER) {
            None => Ok(self.default_mode),
            Some(value) => value
                .parse()
                .map_err(|_| NlpError::Codec(format!("Unknown {} header value: {}", MODE_HEADER, value))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelSet;
    use companion_common::store::InMemoryReferenceStore;
    use companion_common::{AnalyzedText, FailureKind, PersonName};

    fn service() -> NlpService {
        let models: Arc<dyn ModelPort> = Arc::new(ModelSet::load(&ModelSet::bundled_dir()).unwrap());
        NlpService::new(models, Arc::new(InMemoryReferenceStore::new()), EventBus::new(16))
    }

    fn text(s: &str) -> Payload {
        Payload::Text(s.to_string())
    }

    fn tokens(items: &[&str]) -> Payload {
        Payload::framed(&items).unwrap()
    }

    #[tokio::test]
    async fn test_tokens_reply_is_framed_array() {
        let reply = service()
            .dispatch(NlpAddress::Tokens, &HashMap::new(), text("John Smith left."))
            .await
            .unwrap();
        let tokens: Vec<String> = reply.decode().unwrap();
        assert_eq!(tokens, vec!["John", "Smith", "left", "."]);
    }

    #[tokio::test]
    async fn test_postagging_one_tag_per_token() {
        let reply = service()
            .dispatch(NlpAddress::PosTagging, &HashMap::new(), tokens(&["the", "cats", "."]))
            .await
            .unwrap();
        let tags: Vec<String> = reply.decode().unwrap();
        assert_eq!(tags, vec!["DT", "NNS", "."]);
    }

    #[tokio::test]
    async fn test_personname_resolves_spans() {
        let reply = service()
            .dispatch(
                NlpAddress::PersonName,
                &HashMap::new(),
                tokens(&["Yesterday", "Mary", "Jones", "called", "."]),
            )
            .await
            .unwrap();
        let names: Vec<PersonName> = reply.decode().unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].name, "Mary Jones");
    }

    #[tokio::test]
    async fn test_wrong_payload_shape_is_codec_error() {
        let service = service();
        let err = service
            .dispatch(NlpAddress::PosTagging, &HashMap::new(), text("not framed"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Codec);

        let err = service
            .dispatch(NlpAddress::Sentences, &HashMap::new(), tokens(&["a"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Codec);
    }

    #[tokio::test]
    async fn test_analyze_mode_header() {
        let service = service();

        let reply = service
            .dispatch(NlpAddress::Analyze, &HashMap::new(), text("Mary left."))
            .await
            .unwrap();
        let analyzed: AnalyzedText = reply.decode().unwrap();
        assert_eq!(analyzed.sentences.len(), 1);

        let headers = HashMap::from([(MODE_HEADER.to_string(), "reference".to_string())]);
        let err = service
            .dispatch(NlpAddress::Analyze, &headers, text("missing-id"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);

        let headers = HashMap::from([(MODE_HEADER.to_string(), "sideways".to_string())]);
        let err = service
            .dispatch(NlpAddress::Analyze, &headers, text("Mary left."))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Codec);
    }

    #[tokio::test]
    async fn test_register_twice_fails_and_releases() {
        let bus = MessageBus::new(8);
        let service = Arc::new(service());
        Arc::clone(&service).register(&bus).await.unwrap();

        // A second service cannot take any address
        let err = Arc::new(self::service()).register(&bus).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Internal);
        for address in NlpAddress::ALL {
            assert!(bus.is_registered(address.address()).await);
        }
    }
}
