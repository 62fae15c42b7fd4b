//! # weft-machine
//!
//! A declarative finite state machine.
//!
//! This crate provides:
//! - An XML DSL describing states and guarded transitions
//! - An expression evaluator over the event variable pool
//! - Handler binding for entry/exit hooks and transition actions
//! - A runtime executor driving one transition chain per event
//! - A human-readable state-diagram rendering
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use weft_machine::{Definition, Event, StateHandler, StateMachine};
//!
//! struct Quiet;
//! impl StateHandler for Quiet {}
//!
//! let dsl = r#"
//! <stateMachine name="doc" version="1">
//!   <states>
//!     <state id="Draft" isStart="true">draft</state>
//!     <state id="Done" isEnd="true">done</state>
//!   </states>
//!   <transitions>
//!     <transition sourceId="Draft" targetId="Done" condition="op == &quot;finish&quot;"/>
//!   </transitions>
//! </stateMachine>"#;
//!
//! let handler: Arc<dyn StateHandler> = Arc::new(Quiet);
//! let handlers: HashMap<String, Arc<dyn StateHandler>> = [
//!     ("Draft".to_string(), handler.clone()),
//!     ("Done".to_string(), handler),
//! ]
//! .into();
//! let definition = Definition::from_dsl(dsl, handlers).unwrap();
//! let mut machine = StateMachine::new(Arc::new(definition));
//!
//! let event: Event = serde_json::json!({"op": "finish"}).as_object().unwrap().clone();
//! machine
//!     .execute(&CancellationToken::new(), "Draft", &event, &[])
//!     .unwrap();
//! assert_eq!(machine.current_state().unwrap().id, "Done");
//! ```

pub mod definition;
pub mod dsl;
pub mod error;
pub mod expr;
pub mod machine;

pub use definition::{Definition, Event, State, StateHandler, Transition};
pub use error::MachineError;
pub use expr::{Expr, ExprError};
pub use machine::StateMachine;
