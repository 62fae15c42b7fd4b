//! Pipeline flows and sources.

use crate::error::StreamError;
use crate::sink::Sink;
use crate::state::PipelineState;
use crate::transfer::Stage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A set of stream-processing steps with one open output.
///
/// Flows are created from a source constructor, extended with
/// [`Flow::via`], and terminated with [`Flow::to`]. Every flow of one
/// pipeline shares the same [`PipelineState`].
pub struct Flow<T> {
    pub(crate) rx: mpsc::Receiver<T>,
    pub(crate) state: Arc<PipelineState>,
}

impl<T: Send + 'static> Flow<T> {
    /// A source reading from an explicit outlet channel.
    pub fn from_channel(token: CancellationToken, rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx,
            state: PipelineState::new(token),
        }
    }

    /// A finite source feeding the given items.
    pub fn of_slice(token: CancellationToken, items: Vec<T>) -> Self {
        let state = PipelineState::new(token);
        let (tx, rx) = mpsc::channel(1);
        let st = state.clone();
        tokio::spawn(async move {
            for item in items {
                if st.has_err() {
                    return;
                }
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Self { rx, state }
    }

    /// A source driven by a paged cursor. The cursor returns one batch at a
    /// time together with a flag indicating whether another page follows.
    /// A cursor error is recorded into the pipeline state and ends the
    /// source.
    pub fn of_cursor<C>(token: CancellationToken, mut cursor: C) -> Self
    where
        C: FnMut(&CancellationToken) -> Result<(Vec<T>, bool), StreamError> + Send + 'static,
    {
        let state = PipelineState::new(token);
        let (tx, rx) = mpsc::channel(1);
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                match cursor(st.token()) {
                    Err(err) => {
                        st.set_err(err);
                        return;
                    }
                    Ok((items, has_next)) => {
                        for item in items {
                            if st.has_err() {
                                return;
                            }
                            if tx.send(item).await.is_err() {
                                return;
                            }
                        }
                        if !has_next {
                            return;
                        }
                    }
                }
            }
        });
        Self { rx, state }
    }

    /// The shared state of this flow's pipeline.
    pub fn state(&self) -> Arc<PipelineState> {
        self.state.clone()
    }

    /// Streams this flow through the given transfer stage.
    pub fn via<R, S>(self, stage: S) -> Flow<R>
    where
        R: Send + 'static,
        S: Stage<T, R>,
    {
        let (tx, rx) = mpsc::channel(1);
        stage.spawn(self.rx, tx, self.state.clone());
        Flow {
            rx,
            state: self.state,
        }
    }

    /// Streams this flow into the given sink, terminating the pipeline.
    pub fn to<S: Sink<T>>(self, sink: &S) {
        sink.attach(self.rx, self.state);
    }
}
