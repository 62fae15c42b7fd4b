//! Shared per-pipeline state.

use crate::error::StreamError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// State shared by every stage and sink of one pipeline: the caller's
/// cancellation token, the sink latch, and the write-once first-error slot.
///
/// Stages read the token but never cancel it; cancellation stays with the
/// caller. Recording an error does not cancel in-flight work — stages drop
/// later arrivals instead.
pub struct PipelineState {
    token: CancellationToken,
    err: RwLock<Option<StreamError>>,
    sinks: AtomicUsize,
    notify: Notify,
}

impl PipelineState {
    pub(crate) fn new(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            token,
            err: RwLock::new(None),
            sinks: AtomicUsize::new(0),
            notify: Notify::new(),
        })
    }

    /// The pipeline's context handle.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Records `err` unless an error has already been recorded.
    pub fn set_err(&self, err: StreamError) {
        let mut slot = self.err.write();
        if slot.is_none() {
            tracing::debug!("pipeline error recorded: {err}");
            *slot = Some(err);
        }
    }

    pub fn has_err(&self) -> bool {
        self.err.read().is_some()
    }

    /// The first recorded error, if any.
    pub fn first_err(&self) -> Option<StreamError> {
        self.err.read().clone()
    }

    pub(crate) fn attach_sink(&self) {
        self.sinks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn sink_done(&self) {
        if self.sinks.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Blocks until every attached sink has signalled done, then returns the
    /// first recorded error, if any.
    pub async fn wait(&self) -> Result<(), StreamError> {
        loop {
            let notified = self.notify.notified();
            if self.sinks.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
        match self.first_err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
