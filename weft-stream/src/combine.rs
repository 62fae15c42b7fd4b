//! Split, fan-out, and merge combinators.

use crate::flow::Flow;
use tokio::sync::mpsc;

impl<T: Send + 'static> Flow<T> {
    /// Routes each element to one of two flows according to the predicate:
    /// `(matching, non-matching)`.
    pub fn split<P>(self, predicate: P) -> (Flow<T>, Flow<T>)
    where
        P: Fn(&T) -> bool + Send + 'static,
    {
        let (tx_true, rx_true) = mpsc::channel(1);
        let (tx_false, rx_false) = mpsc::channel(1);
        let state = self.state.clone();
        let mut input = self.rx;
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                let target = if predicate(&item) { &tx_true } else { &tx_false };
                if target.send(item).await.is_err() {
                    return;
                }
            }
        });
        (
            Flow {
                rx: rx_true,
                state: state.clone(),
            },
            Flow {
                rx: rx_false,
                state,
            },
        )
    }

    /// Duplicates each element to `magnitude` identical flows. The element
    /// is pushed to output 0, then 1, and so on before the next element is
    /// read, so a slow consumer applies backpressure to all siblings.
    pub fn fan_out(self, magnitude: usize) -> Vec<Flow<T>>
    where
        T: Clone,
    {
        let state = self.state.clone();
        let mut senders = Vec::with_capacity(magnitude);
        let mut flows = Vec::with_capacity(magnitude);
        for _ in 0..magnitude {
            let (tx, rx) = mpsc::channel(1);
            senders.push(tx);
            flows.push(Flow {
                rx,
                state: state.clone(),
            });
        }
        let mut input = self.rx;
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                for tx in &senders {
                    let _ = tx.send(item.clone()).await;
                }
            }
        });
        flows
    }

    /// Interleaves multiple flows into one. The merged output closes only
    /// after every upstream has closed. Interleaving order is
    /// nondeterministic.
    ///
    /// # Panics
    ///
    /// Panics when `flows` is empty.
    pub fn merge(flows: Vec<Flow<T>>) -> Flow<T> {
        assert!(!flows.is_empty(), "merge requires at least one flow");
        let state = flows[0].state.clone();
        let (tx, rx) = mpsc::channel(1);
        for flow in flows {
            let tx = tx.clone();
            let mut input = flow.rx;
            tokio::spawn(async move {
                while let Some(item) = input.recv().await {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });
        }
        Flow { rx, state }
    }
}
