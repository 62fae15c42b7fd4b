//! Ordered scatter/gather task group.

use crate::error::{CoreError, PanicError};
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct GroupShared<T> {
    err: Mutex<Option<CoreError>>,
    vals: Mutex<Vec<(u64, T)>>,
    active: AtomicUsize,
}

impl<T> GroupShared<T> {
    fn record_first(&self, err: CoreError, token: &CancellationToken) {
        let mut slot = self.err.lock();
        if slot.is_none() {
            *slot = Some(err);
            token.cancel();
        }
    }
}

/// A collection of tasks working on subtasks of the same overall unit of
/// work. Results are collected in submission order regardless of completion
/// order.
///
/// The first task to fail cancels the group's token and becomes the error
/// returned by [`ValueGroup::wait`].
pub struct ValueGroup<T> {
    token: CancellationToken,
    sem: Option<Arc<Semaphore>>,
    handles: Vec<JoinHandle<()>>,
    shared: Arc<GroupShared<T>>,
    next_order: u64,
}

impl<T: Send + 'static> ValueGroup<T> {
    /// Creates a standalone group with its own cancellation token.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Creates a group bound to a token derived from `parent`. The derived
    /// token is cancelled the first time a task returns an error, or when
    /// [`ValueGroup::wait`] returns, whichever happens first.
    pub fn with_context(parent: &CancellationToken) -> (Self, CancellationToken) {
        let token = parent.child_token();
        (Self::with_token(token.clone()), token)
    }

    fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            sem: None,
            handles: Vec::new(),
            shared: Arc::new(GroupShared {
                err: Mutex::new(None),
                vals: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
            }),
            next_order: 0,
        }
    }

    /// Limits the number of concurrently running tasks to at most `n`.
    /// A negative value removes the limit.
    ///
    /// # Panics
    ///
    /// Panics when called while any tasks are in flight.
    pub fn set_limit(&mut self, n: i64) {
        let active = self.shared.active.load(Ordering::SeqCst);
        if active != 0 {
            panic!("cannot modify the limit while {active} tasks in the group are still active");
        }
        if n < 0 {
            self.sem = None;
        } else {
            self.sem = Some(Arc::new(Semaphore::new(n as usize)));
        }
    }

    /// Schedules `fut` as a new task, assigning it the next submission
    /// ordinal. Blocks while the concurrency limit is saturated.
    pub async fn go<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let permit = match &self.sem {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .expect("group semaphore closed"),
            ),
            None => None,
        };
        self.spawn(fut, permit);
    }

    /// Like [`ValueGroup::go`], but returns `false` without scheduling when
    /// the limit is saturated.
    pub fn try_go<F>(&mut self, fut: F) -> bool
    where
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let permit = match &self.sem {
            Some(sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => return false,
            },
            None => None,
        };
        self.spawn(fut, permit);
        true
    }

    fn spawn<F>(&mut self, fut: F, permit: Option<OwnedSemaphorePermit>)
    where
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        self.next_order += 1;
        let order = self.next_order;
        let shared = self.shared.clone();
        let token = self.token.clone();
        shared.active.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(val)) => shared.vals.lock().push((order, val)),
                Ok(Err(err)) => shared.record_first(err, &token),
                Err(payload) => shared.record_first(
                    PanicError::from_payload(payload.as_ref()).into(),
                    &token,
                ),
            }
            shared.active.fetch_sub(1, Ordering::SeqCst);
        });
        self.handles.push(handle);
    }

    /// Blocks until every scheduled task has returned, then cancels the
    /// group's token. Returns either the first recorded error or the values
    /// sorted by submission ordinal.
    pub async fn wait(self) -> Result<Vec<T>, CoreError> {
        for handle in self.handles {
            let _ = handle.await;
        }
        self.token.cancel();
        if let Some(err) = self.shared.err.lock().take() {
            return Err(err);
        }
        let mut vals = std::mem::take(&mut *self.shared.vals.lock());
        vals.sort_by_key(|(order, _)| *order);
        Ok(vals.into_iter().map(|(_, val)| val).collect())
    }
}

impl<T: Send + 'static> Default for ValueGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}
