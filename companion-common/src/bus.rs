//! Request/reply message bus
//!
//! Consumers register an address and receive [`Message`]s on an mpsc channel
//! in delivery order. Every message carries a one-shot [`ReplyHandle`]; the
//! requester awaits exactly one [`Reply`] for it.
//!
//! Payloads are either plain text, which passes through untouched, or a
//! length-prefixed frame produced by [`crate::codec`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{codec, Error, Result};

/// Body of a bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Primitive string, carried as-is
    Text(String),
    /// Length-prefixed structured value (see [`crate::codec`])
    Frame(Vec<u8>),
}

impl Payload {
    /// Frame a structured value
    pub fn framed<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        codec::encode(value).map(Payload::Frame)
    }

    /// Take the text body, rejecting framed payloads
    pub fn into_text(self) -> Result<String> {
        match self {
            Payload::Text(text) => Ok(text),
            Payload::Frame(_) => Err(Error::Codec("Expected text payload, got frame".to_string())),
        }
    }

    /// Decode a framed body, rejecting text payloads
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Frame(bytes) => codec::decode(bytes),
            Payload::Text(_) => Err(Error::Codec("Expected framed payload, got text".to_string())),
        }
    }
}

/// Category of an explicit failure reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Analyzer invoked incorrectly or failed
    #[serde(rename = "MODEL_ERROR")]
    Model,
    /// Span outside its token sequence
    #[serde(rename = "INDEX_ERROR")]
    Index,
    /// Reference identifier or its message field absent
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// Payload could not be decoded
    #[serde(rename = "CODEC_ERROR")]
    Codec,
    /// Infrastructure failure (store I/O, task failure)
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Model => "MODEL_ERROR",
            FailureKind::Index => "INDEX_ERROR",
            FailureKind::NotFound => "NOT_FOUND",
            FailureKind::Codec => "CODEC_ERROR",
            FailureKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Explicit failure reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Reply to a single request
pub type Reply = std::result::Result<Payload, Failure>;

/// One-shot reply channel of a message
#[derive(Debug)]
pub struct ReplyHandle(oneshot::Sender<Reply>);

impl ReplyHandle {
    /// Send the reply. Returns false if the requester stopped waiting.
    pub fn reply(self, reply: Reply) -> bool {
        self.0.send(reply).is_ok()
    }
}

/// A request delivered to a consumer
#[derive(Debug)]
pub struct Message {
    /// Correlation id, for logging
    pub id: Uuid,
    pub headers: HashMap<String, String>,
    pub body: Payload,
    pub reply_to: ReplyHandle,
}

impl Message {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Address-based request/reply bus
///
/// Cheap to clone; clones share the consumer table.
#[derive(Clone)]
pub struct MessageBus {
    consumers: Arc<RwLock<HashMap<String, mpsc::Sender<Message>>>>,
    capacity: usize,
}

impl MessageBus {
    /// Creates a bus whose consumer queues hold `capacity` undelivered messages
    pub fn new(capacity: usize) -> Self {
        Self {
            consumers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register the single consumer of `address`
    ///
    /// An address whose previous consumer dropped its receiver can be taken over.
    pub async fn consumer(&self, address: &str) -> Result<mpsc::Receiver<Message>> {
        let mut consumers = self.consumers.write().await;
        if let Some(existing) = consumers.get(address) {
            if !existing.is_closed() {
                return Err(Error::AddressInUse(address.to_string()));
            }
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        consumers.insert(address.to_string(), tx);
        debug!(address, "Registered bus consumer");
        Ok(rx)
    }

    /// Remove the consumer of `address`; its receiver sees the channel close
    pub async fn unregister(&self, address: &str) -> bool {
        self.consumers.write().await.remove(address).is_some()
    }

    pub async fn is_registered(&self, address: &str) -> bool {
        self.consumers
            .read()
            .await
            .get(address)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Send `body` to `address` and wait for its reply
    pub async fn request(&self, address: &str, body: Payload) -> Result<Payload> {
        self.request_with_headers(address, HashMap::new(), body).await
    }

    /// Send `body` with headers to `address` and wait for its reply
    ///
    /// Failure replies surface as [`Error::Failed`]. A consumer that drops the
    /// message without replying surfaces as [`Error::ReplyDropped`].
    pub async fn request_with_headers(
        &self,
        address: &str,
        headers: HashMap<String, String>,
        body: Payload,
    ) -> Result<Payload> {
        let sender = self
            .consumers
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| Error::NoHandler(address.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let message = Message {
            id: Uuid::new_v4(),
            headers,
            body,
            reply_to: ReplyHandle(tx),
        };

        if sender.send(message).await.is_err() {
            warn!(address, "Bus consumer closed its queue");
            return Err(Error::NoHandler(address.to_string()));
        }

        match rx.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(failure)) => Err(Error::Failed(failure)),
            Err(_) => Err(Error::ReplyDropped(address.to_string())),
        }
    }
}
