//! Recovery wrappers over panicking callables.
//!
//! Each adapter performs exactly one recovery attempt; no panic escapes the
//! wrapper. The spawn variants run the callable on a fresh blocking task and
//! return immediately.

use crate::error::PanicError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::task::JoinHandle;
use tracing::Span;

/// Runs `f`, catching any panic, reporting it at error level, and swallowing
/// it.
pub fn recover<F>(f: F)
where
    F: FnOnce(),
{
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        let err = PanicError::from_payload(payload.as_ref());
        tracing::error!("{err}");
    }
}

/// Runs `f`, converting a panic into an error value.
pub fn recover_err<E, F>(f: F) -> Result<(), E>
where
    F: FnOnce() -> Result<(), E>,
    E: From<PanicError>,
{
    recover_value(f)
}

/// Runs the value-producing `f`, converting a panic into an error value.
pub fn recover_value<T, E, F>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<PanicError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(PanicError::from_payload(payload.as_ref()).into()),
    }
}

/// Spawns `f` on a blocking task under `recover`. Returns immediately.
pub fn spawn_recovered<F>(f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(move || recover(f))
}

/// Spawns `f` under `recover` with the panic report emitted inside the given
/// span.
pub fn spawn_recovered_in<F>(span: Span, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(move || span.in_scope(|| recover(f)))
}
