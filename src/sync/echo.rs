//! Echo suppression.
//!
//! Applying a remote snapshot to the local player makes the player emit the
//! very events (play, pause, buffering-seek) that normally signal a local
//! action. Re-emitting those as outgoing writes would ping-pong state
//! between members forever. The suppressor is the single directed gate for
//! "a remote apply is in flight": armed before issuing player commands,
//! decaying after a fixed window rather than being cleared synchronously,
//! since the player reports programmatic commands asynchronously.
//!
//! A genuine local action that lands inside the decay window is silently
//! dropped, not queued. The next snapshot cycle reconciles whatever state
//! results, so the loss is bounded to one user gesture.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct EchoSuppressor {
    window: Duration,
    applying_until: Option<Instant>,
}

impl EchoSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            applying_until: None,
        }
    }

    /// Arm the gate: a remote snapshot is about to be applied to the player.
    pub fn begin_remote_apply(&mut self) {
        self.begin_remote_apply_at(Instant::now());
    }

    pub fn begin_remote_apply_at(&mut self, now: Instant) {
        self.applying_until = Some(now + self.window);
    }

    /// True while player events must be swallowed instead of forwarded.
    pub fn is_applying_remote(&self) -> bool {
        self.is_applying_remote_at(Instant::now())
    }

    pub fn is_applying_remote_at(&self, now: Instant) -> bool {
        self.applying_until.is_some_and(|until| now < until)
    }
}
