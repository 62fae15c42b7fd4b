//! State-machine error types.

use crate::expr::ExprError;
use thiserror::Error;

/// Errors from building and executing state machines.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("state not found: {id}")]
    StateNotFound { id: String },

    #[error("transition source '{id}' is not a declared state")]
    UnknownSource { id: String },

    #[error("transition from '{source_id}' has neither a known target nor any actions")]
    EmptyTarget { source_id: String },

    #[error("no handler registered for state '{id}'")]
    MissingHandler { id: String },

    #[error("state '{state}' has no action named '{action}'")]
    UnboundAction { state: String, action: String },

    #[error("no transition out of state '{state}' is satisfied")]
    AllTransitionsUnsatisfied { state: String },

    #[error("condition expression invalid: {expression}")]
    Condition {
        expression: String,
        #[source]
        source: ExprError,
    },

    #[error("condition result is not a boolean")]
    ResultNotBoolean,

    /// Sentinel returned by an entry hook to immediately transition again
    /// from the newly-entered state.
    #[error("skip: continue transitioning from the entered state")]
    Skip,

    #[error("invalid state machine document: {0}")]
    Dsl(#[from] quick_xml::de::DeError),

    /// A handler-reported failure.
    #[error("{0}")]
    Handler(String),
}

impl MachineError {
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}
