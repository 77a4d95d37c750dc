//! State of one in-flight discovery round.
//!
//! A round owns the caller's pong callback and the stop signal the caller is
//! blocked on. Callback invocation and the "finished" decision happen under
//! the same mutex, so once a callback asks to stop, no pong processed
//! concurrently can reach the callback again.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use hive_types::pong::{PingControl, Pong};
use tracing::warn;

use crate::signal::StopSignal;

/// Callback receiving each discovery response of a round.
pub type PongCallback = Box<dyn FnMut(&Pong) -> PingControl + Send>;

pub struct PingRound {
    callback: Mutex<PongCallback>,
    finished: AtomicBool,
    stop: StopSignal,
}

impl PingRound {
    pub fn new(callback: PongCallback) -> Self {
        Self {
            callback: Mutex::new(callback),
            finished: AtomicBool::new(false),
            stop: StopSignal::new(),
        }
    }

    /// Hand a pong to the callback unless the round is already over.
    ///
    /// Returns `true` if the callback was invoked. A panicking callback ends
    /// the round as if it had returned [`PingControl::Stop`].
    pub fn deliver(&self, pong: &Pong) -> bool {
        if self.is_finished() {
            return false;
        }
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_finished() {
            return false;
        }
        let control = match panic::catch_unwind(AssertUnwindSafe(|| (*callback)(pong))) {
            Ok(control) => control,
            Err(_) => {
                warn!(instance_id = pong.instance_id(), "pong callback panicked, ending round");
                PingControl::Stop
            }
        };
        if control == PingControl::Stop {
            self.finish();
        }
        true
    }

    /// Mark the round finished and release the waiting caller.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        self.stop.fire();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Block until the round is stopped or `timeout` elapses.
    ///
    /// Returns `true` if the round was stopped before the timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.stop.wait_timeout(timeout)
    }
}

impl std::fmt::Debug for PingRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PingRound")
            .field("finished", &self.is_finished())
            .finish()
    }
}
