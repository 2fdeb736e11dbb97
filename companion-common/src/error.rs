//! Common error types for Companion services

use thiserror::Error;

use crate::bus::Failure;

/// Common result type for Companion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the bus, codec, store and configuration layers
#[derive(Error, Debug)]
pub enum Error {
    /// Reference store backend error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wire frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// No consumer is registered for the requested bus address
    #[error("No handler registered for address: {0}")]
    NoHandler(String),

    /// A consumer is already registered for the bus address
    #[error("Address already has a consumer: {0}")]
    AddressInUse(String),

    /// The consumer dropped the request without replying
    #[error("Request to {0} was dropped without a reply")]
    ReplyDropped(String),

    /// The consumer replied with an explicit failure
    #[error("Request failed: {0}")]
    Failed(Failure),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
