//! Injection error types.

use crate::topo::CycleError;
use thiserror::Error;

/// Errors from providing and populating the object graph.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("provided two unnamed instances of type {type_name}")]
    DuplicateType { type_name: &'static str },

    #[error("provided two instances named {name}")]
    DuplicateName { name: String },

    #[error("cannot provide after the graph has been initialized")]
    ProvideAfterInit,

    #[error("did not find an object named {name} required by field {field} in type {type_name}")]
    MissingNamed {
        name: String,
        field: String,
        type_name: &'static str,
    },

    #[error("object named {name} is not assignable to field {field} ({expected}) in type {type_name}")]
    NamedNotAssignable {
        name: String,
        field: String,
        expected: &'static str,
        type_name: &'static str,
    },

    #[error("found no assignable value for field {field} ({port}) in type {type_name}")]
    PortNotFound {
        field: String,
        port: &'static str,
        type_name: &'static str,
    },

    #[error(
        "found two assignable values for field {field} ({port}) in type {type_name}: \
         one of type {first} and another of type {second}"
    )]
    PortAmbiguous {
        field: String,
        port: &'static str,
        type_name: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("object dependency graph is cyclic: {objects}")]
    Cycle {
        objects: String,
        #[source]
        source: CycleError,
    },
}
