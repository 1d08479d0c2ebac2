//! Worker mode: role detection and the handle passed to the worker body.
//!
//! A process spawned by the controller finds [`SLOT_ID_ENV`] in its
//! environment. In that case [`SupervisorBuilder::start`](crate::SupervisorBuilder::start)
//! skips all pool logic, calls the worker body exactly once and exits the
//! process with the code from [`exit_code`]. Returning from `main` instead
//! would leave the runtime waiting on its blocked stdin reader.

mod handle;
mod mode;

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::WorkerError;
use crate::slots::{InstanceId, SlotId};

pub use handle::WorkerHandle;
pub use mode::{INSTANCE_ID_ENV, Mode, SLOT_ID_ENV};

/// Exit status for a panicking worker body, matching Rust's own.
const PANIC_EXIT_CODE: i32 = 101;

/// Runs `body` as the worker occupying `slot` over stdin/stdout and returns
/// the process exit code.
pub(crate) async fn run_stdio<F, Fut>(slot: SlotId, instance: InstanceId, body: F) -> i32
where
    F: FnOnce(WorkerHandle) -> Fut,
    Fut: Future<Output = Result<(), WorkerError>>,
{
    let run = run_with_io(slot, instance, tokio::io::stdin(), tokio::io::stdout(), body);
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(res) => exit_code(&res),
        Err(_panic) => {
            tracing::error!(%slot, %instance, "worker body panicked");
            PANIC_EXIT_CODE
        }
    }
}

/// 0 for `Ok`, 1 for `Err`.
pub(crate) fn exit_code(res: &Result<(), WorkerError>) -> i32 {
    match res {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, kind = err.as_label(), "worker body failed");
            1
        }
    }
}

pub(crate) async fn run_with_io<F, Fut, R, W>(
    slot: SlotId,
    instance: InstanceId,
    reader: R,
    writer: W,
    body: F,
) -> Result<(), WorkerError>
where
    F: FnOnce(WorkerHandle) -> Fut,
    Fut: Future<Output = Result<(), WorkerError>>,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (handle, pipes) = handle::connect(slot, instance, reader, writer);
    tracing::debug!(%slot, %instance, "running worker body");

    let res = body(handle).await;
    pipes.close().await;
    res
}
