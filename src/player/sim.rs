//! Simulated media player for tests and the validation CLI.
//!
//! Position advances with the wall clock while playing. Seeks and loads go
//! through a buffering transition before settling, matching how embedded
//! players report programmatic commands asynchronously.

use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;

use super::{MediaPlayer, PlayerEvent, PlayerState};
use crate::error::{Result, SyncError};

struct SimInner {
    initialized: bool,
    video_id: Option<String>,
    state: PlayerState,
    base_time: f64,
    anchor: Instant,
}

impl SimInner {
    fn position(&self) -> f64 {
        if self.state == PlayerState::Playing {
            self.base_time + self.anchor.elapsed().as_secs_f64()
        } else {
            self.base_time
        }
    }

    fn freeze(&mut self) {
        self.base_time = self.position();
        self.anchor = Instant::now();
    }
}

#[derive(Clone)]
pub struct SimPlayer {
    inner: Arc<Mutex<SimInner>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl SimPlayer {
    /// A ready player plus the receiver for its state-transition events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        Self::with_readiness(true)
    }

    /// A player that reports unavailable until [`SimPlayer::initialize`] is
    /// called, for exercising the not-yet-ready paths.
    pub fn uninitialized() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        Self::with_readiness(false)
    }

    fn with_readiness(initialized: bool) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Self {
            inner: Arc::new(Mutex::new(SimInner {
                initialized,
                video_id: None,
                state: PlayerState::Unstarted,
                base_time: 0.0,
                anchor: Instant::now(),
            })),
            events: tx,
        };
        (player, rx)
    }

    pub fn initialize(&self) {
        self.inner.lock().unwrap().initialized = true;
    }

    /// A seek initiated by the local user. Indistinguishable from a
    /// programmatic seek at the player surface; the engine tells them apart
    /// by timing.
    pub fn user_seek(&self, time: f64) {
        let _ = self.seek_to(time);
    }

    fn emit(&self, state: PlayerState, time: f64) {
        let _ = self.events.send(PlayerEvent { state, time });
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, SimInner>> {
        let inner = self.inner.lock().unwrap();
        if !inner.initialized {
            return Err(SyncError::player_unavailable("player not initialized"));
        }
        Ok(inner)
    }
}

impl MediaPlayer for SimPlayer {
    fn load_media(&self, video_id: &str) -> Result<()> {
        let mut inner = self.locked()?;
        inner.video_id = Some(video_id.to_string());
        inner.base_time = 0.0;
        inner.anchor = Instant::now();
        inner.state = PlayerState::Playing;
        drop(inner);
        self.emit(PlayerState::Buffering, 0.0);
        self.emit(PlayerState::Playing, 0.0);
        Ok(())
    }

    fn play(&self) -> Result<()> {
        let mut inner = self.locked()?;
        if inner.state == PlayerState::Playing {
            return Ok(());
        }
        inner.anchor = Instant::now();
        inner.state = PlayerState::Playing;
        let time = inner.position();
        drop(inner);
        self.emit(PlayerState::Playing, time);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut inner = self.locked()?;
        if inner.state != PlayerState::Playing {
            return Ok(());
        }
        inner.freeze();
        inner.state = PlayerState::Paused;
        let time = inner.base_time;
        drop(inner);
        self.emit(PlayerState::Paused, time);
        Ok(())
    }

    fn seek_to(&self, time: f64) -> Result<()> {
        let mut inner = self.locked()?;
        inner.base_time = time.max(0.0);
        inner.anchor = Instant::now();
        let settled = inner.state;
        drop(inner);
        self.emit(PlayerState::Buffering, time);
        if matches!(settled, PlayerState::Playing | PlayerState::Paused) {
            self.emit(settled, time);
        }
        Ok(())
    }

    fn current_time(&self) -> Result<f64> {
        Ok(self.locked()?.position())
    }

    fn state(&self) -> Result<PlayerState> {
        Ok(self.locked()?.state)
    }

    fn loaded_media(&self) -> Result<Option<String>> {
        Ok(self.locked()?.video_id.clone())
    }
}
