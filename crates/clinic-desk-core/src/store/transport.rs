//! The wire seam between stores and the remote data service.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::EntityId;

/// Transport failures, as reported by whichever backend is plugged in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Four calls against a named remote collection.
///
/// Documents cross this boundary as JSON so the trait stays object safe and
/// one transport instance serves every store. Timeouts and retries are the
/// implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Every record in `collection`, in service order.
    async fn list(&self, collection: &str) -> TransportResult<Vec<Value>>;

    /// Create a record from `draft`; returns it with its assigned id.
    async fn create(&self, collection: &str, draft: Value) -> TransportResult<Value>;

    /// Replace the record `id` with `record`; returns the stored record.
    async fn replace(&self, collection: &str, id: &EntityId, record: Value) -> TransportResult<Value>;

    /// Delete the record `id`.
    async fn delete(&self, collection: &str, id: &EntityId) -> TransportResult<()>;
}
