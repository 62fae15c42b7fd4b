//! Transfer stages: map, filter, flat-map, reduce, pass-through.

use crate::error::StreamError;
use crate::state::PipelineState;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use weft_core::recover_value;

/// A pipeline stage with one open input and one open output.
///
/// `spawn` wires the stage's worker task(s) between the given channels. The
/// output must be closed exactly once, after all workers finish and the
/// input is drained.
pub trait Stage<T, R>: Send + 'static {
    fn spawn(
        self,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<R>,
        state: Arc<PipelineState>,
    );
}

/// Per-element worker contract shared by the parallel stages: skip the
/// callable when an error is already recorded, run it inside a recovery
/// wrapper, record-and-drop on failure, otherwise forward the outputs.
/// On upstream close, all in-flight workers are awaited through the
/// semaphore before the output channel closes.
macro_rules! run_workers {
    ($input:ident, $output:ident, $state:ident, $parallelism:expr, $worker:expr) => {{
        let parallelism = $parallelism;
        tokio::spawn(async move {
            let sem = Arc::new(Semaphore::new(parallelism));
            let mut $input = $input;
            while let Some(item) = $input.recv().await {
                if $state.has_err() {
                    continue;
                }
                let permit = sem
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("stage semaphore closed");
                let out = $output.clone();
                let st = $state.clone();
                let work = $worker;
                tokio::spawn(async move {
                    let _permit = permit;
                    work(st, out, item).await;
                });
            }
            let _all = sem
                .acquire_many(parallelism as u32)
                .await
                .expect("stage semaphore closed");
        });
    }};
}

type MapFn<T, R> = Arc<dyn Fn(&CancellationToken, T) -> Result<R, StreamError> + Send + Sync>;
type FilterFn<T> = Arc<dyn Fn(&CancellationToken, &T) -> Result<bool, StreamError> + Send + Sync>;
type FlatMapFn<T, R> =
    Arc<dyn Fn(&CancellationToken, T) -> Result<Vec<R>, StreamError> + Send + Sync>;
type ReduceFn<T> = Arc<dyn Fn(&CancellationToken, T, T) -> Result<T, StreamError> + Send + Sync>;

/// Takes one element and produces one element.
pub struct Map<T, R> {
    f: MapFn<T, R>,
    parallelism: usize,
}

impl<T, R> Map<T, R> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CancellationToken, T) -> Result<R, StreamError> + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(f),
            parallelism: 1,
        }
    }

    /// Sets the worker count. Output order is only preserved at 1.
    pub fn with_parallelism(mut self, n: usize) -> Self {
        self.parallelism = n.max(1);
        self
    }
}

impl<T: Send + 'static, R: Send + 'static> Stage<T, R> for Map<T, R> {
    fn spawn(
        self,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<R>,
        state: Arc<PipelineState>,
    ) {
        let Map { f, parallelism } = self;
        run_workers!(input, output, state, parallelism, {
            let f = f.clone();
            move |st: Arc<PipelineState>, out: mpsc::Sender<R>, item: T| async move {
                match recover_value(|| f(st.token(), item)) {
                    Ok(value) => {
                        let _ = out.send(value).await;
                    }
                    Err(err) => st.set_err(err),
                }
            }
        });
    }
}

/// Passes an element downstream iff the predicate holds.
pub struct Filter<T> {
    predicate: FilterFn<T>,
    parallelism: usize,
}

impl<T> Filter<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&CancellationToken, &T) -> Result<bool, StreamError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            parallelism: 1,
        }
    }

    /// Sets the worker count. Output order is only preserved at 1.
    pub fn with_parallelism(mut self, n: usize) -> Self {
        self.parallelism = n.max(1);
        self
    }
}

impl<T: Send + 'static> Stage<T, T> for Filter<T> {
    fn spawn(
        self,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<T>,
        state: Arc<PipelineState>,
    ) {
        let Filter {
            predicate,
            parallelism,
        } = self;
        run_workers!(input, output, state, parallelism, {
            let predicate = predicate.clone();
            move |st: Arc<PipelineState>, out: mpsc::Sender<T>, item: T| async move {
                match recover_value(|| predicate(st.token(), &item)) {
                    Ok(true) => {
                        let _ = out.send(item).await;
                    }
                    Ok(false) => {}
                    Err(err) => st.set_err(err),
                }
            }
        });
    }
}

/// Takes one element and produces zero, one, or more elements.
pub struct FlatMap<T, R> {
    f: FlatMapFn<T, R>,
    parallelism: usize,
}

impl<T, R> FlatMap<T, R> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CancellationToken, T) -> Result<Vec<R>, StreamError> + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(f),
            parallelism: 1,
        }
    }

    /// Sets the worker count. Output order is only preserved at 1.
    pub fn with_parallelism(mut self, n: usize) -> Self {
        self.parallelism = n.max(1);
        self
    }
}

impl<T: Send + 'static, R: Send + 'static> Stage<T, R> for FlatMap<T, R> {
    fn spawn(
        self,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<R>,
        state: Arc<PipelineState>,
    ) {
        let FlatMap { f, parallelism } = self;
        run_workers!(input, output, state, parallelism, {
            let f = f.clone();
            move |st: Arc<PipelineState>, out: mpsc::Sender<R>, item: T| async move {
                match recover_value(|| f(st.token(), item)) {
                    Ok(values) => {
                        for value in values {
                            if out.send(value).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => st.set_err(err),
                }
            }
        });
    }
}

/// A rolling reduction: combines each element with the last reduced value
/// and emits every intermediate result. The first element seeds the
/// accumulator and is emitted as-is. Always runs sequentially.
pub struct Reduce<T> {
    f: ReduceFn<T>,
}

impl<T> Reduce<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CancellationToken, T, T) -> Result<T, StreamError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl<T: Clone + Send + 'static> Stage<T, T> for Reduce<T> {
    fn spawn(
        self,
        mut input: mpsc::Receiver<T>,
        output: mpsc::Sender<T>,
        state: Arc<PipelineState>,
    ) {
        let Reduce { f } = self;
        tokio::spawn(async move {
            let mut acc: Option<T> = None;
            while let Some(item) = input.recv().await {
                if state.has_err() {
                    continue;
                }
                let next = match acc.take() {
                    None => item,
                    Some(prev) => match recover_value(|| f(state.token(), prev, item)) {
                        Ok(value) => value,
                        Err(err) => {
                            state.set_err(err);
                            continue;
                        }
                    },
                };
                acc = Some(next.clone());
                if output.send(next).await.is_err() {
                    return;
                }
            }
        });
    }
}

/// Retransmits incoming elements as-is.
pub struct PassThrough<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PassThrough<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PassThrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Stage<T, T> for PassThrough<T> {
    fn spawn(
        self,
        mut input: mpsc::Receiver<T>,
        output: mpsc::Sender<T>,
        _state: Arc<PipelineState>,
    ) {
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                if output.send(item).await.is_err() {
                    return;
                }
            }
        });
    }
}
