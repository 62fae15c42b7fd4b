//! Core error types.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error produced when a panic is captured at a recovery boundary.
///
/// Carries the panic payload rendered as a string and the stack trace
/// captured at the recovery point.
#[derive(Debug, Clone, Error)]
#[error("panic: {message}, {stack}")]
pub struct PanicError {
    message: String,
    stack: String,
}

impl PanicError {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Builds a panic error from a caught payload, capturing the stack trace
    /// at the call site.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            message,
            stack: Backtrace::force_capture().to_string(),
        }
    }

    /// The panic payload rendered as a string.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The stack trace captured when the panic was recovered.
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

/// An error carrying a numeric code, a human-readable message, and an
/// optional wrapped cause.
#[derive(Debug, Clone)]
pub struct CodedError {
    code: i32,
    msg: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl CodedError {
    pub fn new(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            cause: None,
        }
    }

    /// Wraps an existing error, using its rendering as the message.
    pub fn wrap<E>(code: i32, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code,
            msg: cause.to_string(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Wraps an existing error under an explicit message.
    pub fn with_cause<E>(code: i32, msg: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            code,
            msg: msg.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Returns the wrapped cause, synthesizing one from the message when the
    /// error was built without a cause.
    pub fn cause(&self) -> Arc<dyn std::error::Error + Send + Sync> {
        match &self.cause {
            Some(cause) => cause.clone(),
            None => Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(
                self.msg.clone(),
            )),
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "code: {}, msg: {}, err: {}", self.code, self.msg, cause),
            None => write!(f, "code: {}, msg: {}", self.code, self.msg),
        }
    }
}

impl std::error::Error for CodedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Errors from the core primitives.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error(transparent)]
    Panic(#[from] PanicError),

    #[error(transparent)]
    Coded(#[from] CodedError),

    #[error("{0}")]
    Message(String),

    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("page token error: {0}")]
    Token(#[from] base64::DecodeError),
}

impl CoreError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}
