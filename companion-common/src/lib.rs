//! # Companion Common Library
//!
//! Shared code for Companion NLP services and their clients:
//! - Bus addresses and the request/reply message bus
//! - Length-prefixed wire codec for structured payloads
//! - Analysis result types (AnalyzedText, Sentence, PersonName)
//! - Reference store abstraction and backends
//! - Service events (EventBus)
//! - Configuration loading

pub mod addresses;
pub mod bus;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod store;

pub use addresses::{NlpAddress, BUS_PROTOCOL_VERSION};
pub use bus::{Failure, FailureKind, Message, MessageBus, Payload};
pub use error::{Error, Result};
pub use model::{AnalyzedText, PersonName, PosTag, Sentence, Token};
