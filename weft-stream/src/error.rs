//! Pipeline error types.

use std::sync::Arc;
use thiserror::Error;
use weft_core::{CoreError, PanicError};

/// Errors recorded into the shared pipeline state.
///
/// `Clone` because the first recorded error is both kept in the write-once
/// slot and returned from [`crate::PipelineState::wait`].
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error(transparent)]
    Panic(#[from] PanicError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Message(String),

    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl StreamError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps an arbitrary error produced by a stage callable or sink flush.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(err))
    }
}
