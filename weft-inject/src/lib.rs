//! # weft-inject
//!
//! A dependency-injection graph for applications assembled from provided
//! objects.
//!
//! This crate provides:
//! - Provide/populate of unnamed singletons, named and private instances
//! - Port (trait-object) targets resolved by uniqueness
//! - Dependency-cycle detection
//! - Deterministic, priority-biased topological init/close ordering
//!
//! Objects describe their dependencies with a wiring manifest:
//!
//! ```
//! use std::sync::Arc;
//! use weft_inject::{Dep, Graph, Inject, InjectError, Resolver};
//!
//! #[derive(Default)]
//! struct Database;
//! impl Inject for Database {}
//!
//! #[derive(Default)]
//! struct Api {
//!     db: Dep<Database>,
//! }
//!
//! impl Inject for Api {
//!     fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
//!         r.singleton("db", &self.db)
//!     }
//! }
//!
//! let graph = Graph::new();
//! graph.provide_value(Api::default()).unwrap();
//! graph.init().unwrap();
//! let api: Arc<Api> = graph.obtain();
//! api.db.get();
//! ```

pub mod error;
pub mod graph;
pub mod topo;
pub mod wire;

pub use error::InjectError;
pub use graph::{Graph, Provide, Resolver};
pub use topo::{toposort, CycleError, Edge, Node};
pub use wire::{Dep, Inject};
