//! Client-side mirrors of remote collections.
//!
//! One [`EntityStore`] per collection, all talking to the service through a
//! shared [`Transport`].

mod entity_store;
mod transport;

pub use entity_store::*;
pub use transport::*;

use thiserror::Error;

/// Store operation errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transport error on {collection}: {source}")]
    Transport {
        collection: String,
        #[source]
        source: TransportError,
    },

    #[error("Could not decode {collection} record: {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not encode {collection} record: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// The transport failure behind this error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            StoreError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
