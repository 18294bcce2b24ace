use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error payload the service attaches to any non-download response.
///
/// A present `error` field short-circuits the happy path regardless of the
/// HTTP status the transport reported.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ServiceErrorReply {
    pub error: String,
}

impl ServiceErrorReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
