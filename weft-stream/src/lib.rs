//! # weft-stream
//!
//! A typed, channel-based streaming pipeline.
//!
//! This crate provides:
//! - Sources from channels, slices, and paged cursors
//! - Map / filter / flat-map / reduce transfers with optional parallelism
//! - Split, fan-out, and merge combinators
//! - Bounded ops: head, tail, skip, chunk, buffer
//! - Memory and batched-store sinks
//! - A shared per-pipeline state with a write-once error slot; stage
//!   callables run inside recovery wrappers so panics surface as pipeline
//!   errors
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use tokio_util::sync::CancellationToken;
//! use weft_stream::{Filter, Flow, MemorySink};
//!
//! let flow = Flow::of_slice(CancellationToken::new(), vec![1, 2, 3, 4]);
//! let sink = MemorySink::new();
//! let state = flow.state();
//! flow.via(Filter::new(|_, n: &i32| Ok(n % 2 == 0))).to(&sink);
//! state.wait().await.unwrap();
//! assert_eq!(sink.result(), vec![2, 4]);
//! # }
//! ```

pub mod combine;
pub mod error;
pub mod flow;
pub mod ops;
pub mod sink;
pub mod state;
pub mod transfer;

pub use error::StreamError;
pub use flow::Flow;
pub use sink::{MemorySink, Sink, StoreSink};
pub use state::PipelineState;
pub use transfer::{Filter, FlatMap, Map, PassThrough, Reduce, Stage};
