//! Purpose: Run handler side work off the request path without risking the process.
//! Exports: `background`.
//! Role: Fire-and-forget task launcher for function handlers.
//! Invariants: Returns only after the task thread has started; never waits for completion.
//! Invariants: A panicking task is logged and discarded; it never reaches the caller.
//! Notes: No cancellation or timeout; captured state is the caller's to synchronize.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::core::error::{Error, ErrorKind};

pub fn background<F>(task: F) -> Result<(), Error>
where
    F: FnOnce() + Send + 'static,
{
    let started = Arc::new(Barrier::new(2));
    let signal = Arc::clone(&started);

    thread::Builder::new()
        .name("background".to_string())
        .spawn(move || {
            signal.wait();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                tracing::error!(error = %panic_message(payload.as_ref()), "background task panicked");
            }
        })
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to spawn background task")
                .with_source(err)
        })?;

    started.wait();
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
