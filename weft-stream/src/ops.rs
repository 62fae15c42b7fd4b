//! Bounded, sequential operators on a flow.

use crate::flow::Flow;
use std::collections::VecDeque;
use tokio::sync::mpsc;

impl<T: Send + 'static> Flow<T> {
    /// Forwards the first `n` elements, then drains the upstream.
    ///
    /// # Panics
    ///
    /// Panics when `n` is 0.
    pub fn head(self, n: usize) -> Flow<T> {
        assert!(n > 0, "n must be greater than 0");
        let (tx, rx) = mpsc::channel(1);
        let state = self.state.clone();
        let mut input = self.rx;
        let st = state.clone();
        tokio::spawn(async move {
            let mut remaining = n;
            while let Some(item) = input.recv().await {
                if st.has_err() {
                    break;
                }
                remaining -= 1;
                if tx.send(item).await.is_err() {
                    break;
                }
                if remaining == 0 {
                    break;
                }
            }
            drop(tx);
            // Keep the upstream unblocked.
            while input.recv().await.is_some() {}
        });
        Flow { rx, state }
    }

    /// Forwards the last `n` elements once the upstream closes.
    ///
    /// # Panics
    ///
    /// Panics when `n` is 0.
    pub fn tail(self, n: usize) -> Flow<T> {
        assert!(n > 0, "n must be greater than 0");
        let (tx, rx) = mpsc::channel(1);
        let state = self.state.clone();
        let mut input = self.rx;
        let st = state.clone();
        tokio::spawn(async move {
            let mut kept: VecDeque<T> = VecDeque::with_capacity(n);
            while let Some(item) = input.recv().await {
                if st.has_err() {
                    while input.recv().await.is_some() {}
                    return;
                }
                if kept.len() == n {
                    kept.pop_front();
                }
                kept.push_back(item);
            }
            for item in kept {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Flow { rx, state }
    }

    /// Skips the first `n` elements.
    ///
    /// # Panics
    ///
    /// Panics when `n` is negative.
    pub fn skip(self, n: i64) -> Flow<T> {
        assert!(n >= 0, "n must not be negative");
        if n == 0 {
            return self;
        }
        let (tx, rx) = mpsc::channel(1);
        let state = self.state.clone();
        let mut input = self.rx;
        let st = state.clone();
        tokio::spawn(async move {
            let mut remaining = n;
            while let Some(item) = input.recv().await {
                if st.has_err() {
                    while input.recv().await.is_some() {}
                    return;
                }
                if remaining > 0 {
                    remaining -= 1;
                    continue;
                }
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Flow { rx, state }
    }

    /// Batches elements into chunks of size up to `n`; the tail chunk may be
    /// shorter.
    ///
    /// # Panics
    ///
    /// Panics when `n` is 0.
    pub fn chunk(self, n: usize) -> Flow<Vec<T>> {
        assert!(n > 0, "n must be greater than 0");
        let (tx, rx) = mpsc::channel(1);
        let state = self.state.clone();
        let mut input = self.rx;
        let st = state.clone();
        tokio::spawn(async move {
            let mut chunk = Vec::with_capacity(n);
            while let Some(item) = input.recv().await {
                if st.has_err() {
                    while input.recv().await.is_some() {}
                    return;
                }
                chunk.push(item);
                if chunk.len() == n {
                    let full = std::mem::replace(&mut chunk, Vec::with_capacity(n));
                    if tx.send(full).await.is_err() {
                        return;
                    }
                }
            }
            if !chunk.is_empty() {
                let _ = tx.send(chunk).await;
            }
        });
        Flow { rx, state }
    }

    /// Interposes a queue of capacity `n` to decouple producer and consumer
    /// rates.
    pub fn buffer(self, n: usize) -> Flow<T> {
        let (tx, rx) = mpsc::channel(n.max(1));
        let state = self.state.clone();
        let mut input = self.rx;
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Flow { rx, state }
    }
}
