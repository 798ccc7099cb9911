/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Auto-fill on a background worker.
//!
//! [`spawn`] moves the scheduler and the item source into a blocking worker,
//! so exactly one task owns the schedule while the run is in flight.  Both
//! come back through [`AutoFillHandle::join`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use super::{run, AutoFillOutcome, AutoFillReport, CancelToken, Progress};
use crate::scheduler::MessageScheduler;
use crate::source::ItemSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AutoFillState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
}

impl AutoFillState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AutoFillState::Running,
            2 => AutoFillState::Completed,
            3 => AutoFillState::Cancelled,
            _ => AutoFillState::Idle,
        }
    }
}

/// What a finished worker hands back.
#[derive(Debug)]
pub struct AutoFillResult<S> {
    pub scheduler: MessageScheduler,
    pub source: S,
    pub report: AutoFillReport,
}

#[derive(Debug, Error)]
pub enum AutoFillError {
    #[error("auto-fill worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Handle to a running auto-fill.
pub struct AutoFillHandle<S> {
    cancel: CancelToken,
    state: Arc<AtomicU8>,
    progress: mpsc::UnboundedReceiver<Progress>,
    worker: JoinHandle<AutoFillResult<S>>,
}

impl<S> AutoFillHandle<S> {
    /// Request cancellation; the worker stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, e.g. for a signal handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> AutoFillState {
        AutoFillState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Next progress event, or `None` once the worker has finished and every
    /// event has been received.
    pub async fn next_progress(&mut self) -> Option<Progress> {
        self.progress.recv().await
    }

    /// Wait for the worker and take back the scheduler and source.
    ///
    /// # Errors
    /// [`AutoFillError::Worker`] if the worker panicked.
    pub async fn join(self) -> Result<AutoFillResult<S>, AutoFillError> {
        Ok(self.worker.await?)
    }
}

/// Start auto-fill on a blocking worker thread.
///
/// Must be called from within a tokio runtime.
pub fn spawn<S>(mut scheduler: MessageScheduler, mut source: S) -> AutoFillHandle<S>
where
    S: ItemSource + Send + 'static,
{
    let cancel = CancelToken::new();
    let state = Arc::new(AtomicU8::new(AutoFillState::Idle as u8));
    let (tx, rx) = mpsc::unbounded_channel();

    let worker_cancel = cancel.clone();
    let worker_state = Arc::clone(&state);

    let worker = tokio::task::spawn_blocking(move || {
        worker_state.store(AutoFillState::Running as u8, Ordering::Release);
        debug!(rate_name = %scheduler.rate_name(), "Auto-fill worker running");

        let report = run(&mut scheduler, &mut source, &worker_cancel, |event| {
            // Receiver dropped means nobody is watching; keep going
            let _ = tx.send(event);
        });

        let done = match report.outcome {
            AutoFillOutcome::Cancelled => AutoFillState::Cancelled,
            AutoFillOutcome::AlreadyAssigned | AutoFillOutcome::Completed => AutoFillState::Completed,
        };
        worker_state.store(done as u8, Ordering::Release);

        AutoFillResult {
            scheduler,
            source,
            report,
        }
    });

    AutoFillHandle {
        cancel,
        state,
        progress: rx,
        worker,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
