//! Local seek classification.
//!
//! Seeks are detected by two racing producers: the player's own state
//! transitions (a buffering transition at an unexpected position) and the
//! short-interval time poll. Both feed this single classifier so the
//! debounce and echo checks live in one place instead of two independent
//! write paths.

use std::time::{Duration, Instant};

use super::echo::EchoSuppressor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekVerdict {
    /// A genuine local seek; forward it as an outgoing write.
    Accept,
    /// Within the debounce window of the previous accepted seek; coalesced.
    Debounced,
    /// Matches the last remote-applied position; one detector racing the
    /// other, not a new local seek.
    RemoteEcho,
    /// A remote apply is in flight; the event is a programmatic echo.
    Suppressed,
}

#[derive(Debug)]
pub struct SeekClassifier {
    debounce: Duration,
    remote_echo_tolerance_secs: f64,
    last_accepted_at: Option<Instant>,
    last_remote_seek_time: Option<f64>,
}

impl SeekClassifier {
    pub fn new(debounce: Duration, remote_echo_tolerance_secs: f64) -> Self {
        Self {
            debounce,
            remote_echo_tolerance_secs,
            last_accepted_at: None,
            last_remote_seek_time: None,
        }
    }

    /// Record the target of a remote-origin seek. The player's own report of
    /// that seek-to must not read as a new local seek, even after the
    /// suppression window has decayed.
    pub fn note_remote_seek(&mut self, time: f64) {
        self.last_remote_seek_time = Some(time);
    }

    /// Forget remote-seek history, e.g. when new media is loaded.
    pub fn reset(&mut self) {
        self.last_accepted_at = None;
        self.last_remote_seek_time = None;
    }

    pub fn classify(
        &mut self,
        time: f64,
        suppressor: &EchoSuppressor,
        now: Instant,
    ) -> SeekVerdict {
        if suppressor.is_applying_remote_at(now) {
            return SeekVerdict::Suppressed;
        }
        if let Some(remote_time) = self.last_remote_seek_time {
            if (time - remote_time).abs() < self.remote_echo_tolerance_secs {
                return SeekVerdict::RemoteEcho;
            }
        }
        if let Some(accepted_at) = self.last_accepted_at {
            if now.duration_since(accepted_at) < self.debounce {
                return SeekVerdict::Debounced;
            }
        }
        self.last_accepted_at = Some(now);
        SeekVerdict::Accept
    }
}
