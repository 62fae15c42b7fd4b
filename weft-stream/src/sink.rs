//! Terminal consumers.

use crate::error::StreamError;
use crate::state::PipelineState;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weft_core::recover_value;

/// A terminal consumer. Attaching increments the pipeline's sink latch;
/// the latch is decremented exactly once when the input channel closes.
pub trait Sink<T>: Send + Sync {
    fn attach(&self, input: mpsc::Receiver<T>, state: Arc<PipelineState>);
}

/// Collects every received element into a shared vector.
pub struct MemorySink<T> {
    collected: Arc<Mutex<Vec<T>>>,
}

impl<T> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            collected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The collected elements. Valid once the pipeline's `wait` has
    /// returned.
    pub fn result(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.collected.lock().clone()
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemorySink<T> {
    fn clone(&self) -> Self {
        Self {
            collected: self.collected.clone(),
        }
    }
}

impl<T: Send + 'static> Sink<T> for MemorySink<T> {
    fn attach(&self, mut input: mpsc::Receiver<T>, state: Arc<PipelineState>) {
        state.attach_sink();
        let collected = self.collected.clone();
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                collected.lock().push(item);
            }
            state.sink_done();
        });
    }
}

type FlushFn<T> = Arc<dyn Fn(&CancellationToken, Vec<T>) -> Result<(), StreamError> + Send + Sync>;

/// Buffers up to `batch` elements and hands each full batch to the flush
/// callable. A tail flush of leftover elements runs before the sink signals
/// done. After any flush error the state records it and later flushes are
/// skipped, but the input is still drained to unblock upstream producers.
pub struct StoreSink<T> {
    batch: usize,
    flush: FlushFn<T>,
}

impl<T> StoreSink<T> {
    /// # Panics
    ///
    /// Panics when `batch` is 0.
    pub fn new<F>(batch: usize, flush: F) -> Self
    where
        F: Fn(&CancellationToken, Vec<T>) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        assert!(batch > 0, "batch must be greater than 0");
        Self {
            batch,
            flush: Arc::new(flush),
        }
    }
}

impl<T: Send + 'static> Sink<T> for StoreSink<T> {
    fn attach(&self, mut input: mpsc::Receiver<T>, state: Arc<PipelineState>) {
        state.attach_sink();
        let flush = self.flush.clone();
        let batch = self.batch;
        tokio::spawn(async move {
            let mut buf: Vec<T> = Vec::with_capacity(batch);
            while let Some(item) = input.recv().await {
                buf.push(item);
                if buf.len() >= batch {
                    let full = std::mem::replace(&mut buf, Vec::with_capacity(batch));
                    run_flush(&state, &flush, full);
                }
            }
            if !buf.is_empty() {
                run_flush(&state, &flush, buf);
            }
            state.sink_done();
        });
    }
}

fn run_flush<T>(state: &PipelineState, flush: &FlushFn<T>, items: Vec<T>) {
    if state.has_err() {
        return;
    }
    if let Err(err) = recover_value(|| flush(state.token(), items)) {
        state.set_err(err);
    }
}
