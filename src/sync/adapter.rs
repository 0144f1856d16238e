//! Local player adapter: the bidirectional bridge between the external
//! player and the shared playback record.
//!
//! Remote → local: each adjusted snapshot is reconciled against the player
//! (load, play/pause, seek) with every command wrapped by the echo
//! suppressor. Local → remote: player state transitions and the time poll
//! are classified centrally and surfaced as [`PlaybackUpdate`] values; the
//! session forwards accepted ones to the channel. Keeping writes as return
//! values keeps the whole policy testable without a store.

use std::sync::Arc;
use std::time::Instant;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::player::{MediaPlayer, PlayerEvent, PlayerState};
use crate::store::{now_ms, PlaybackUpdate, RoomRecord};

use super::drift::estimate_position;
use super::echo::EchoSuppressor;
use super::seek::{SeekClassifier, SeekVerdict};

pub struct PlayerAdapter {
    player: Arc<dyn MediaPlayer>,
    config: SyncConfig,
    suppressor: EchoSuppressor,
    seeks: SeekClassifier,
    /// `lastUpdate` of the newest snapshot applied so far; stale deliveries
    /// are ignored by this ordering key, never by receipt order.
    last_applied_update: Option<u64>,
    /// Last polled player position and when it was read.
    last_polled: Option<(f64, Instant)>,
    last_steady_state: Option<PlayerState>,
    /// Snapshot received while the player was unavailable, replayed from
    /// the poll loop once the player comes up.
    pending_record: Option<RoomRecord>,
}

impl PlayerAdapter {
    pub fn new(player: Arc<dyn MediaPlayer>, config: SyncConfig) -> Self {
        let suppressor = EchoSuppressor::new(config.echo_window);
        let seeks = SeekClassifier::new(config.seek_debounce, config.remote_echo_tolerance_secs);
        Self {
            player,
            config,
            suppressor,
            seeks,
            last_applied_update: None,
            last_polled: None,
            last_steady_state: None,
            pending_record: None,
        }
    }

    /// Reconcile the local player against a remote snapshot.
    pub fn apply_remote(&mut self, record: &RoomRecord, now_ms: u64, now: Instant) {
        if let (Some(incoming), Some(applied)) = (record.last_update, self.last_applied_update) {
            if incoming < applied {
                tracing::debug!(incoming, applied, "Ignoring stale snapshot");
                return;
            }
        }

        // A player that has not initialized yet cannot take commands; hold
        // the record and replay it from the poll loop once the player is up
        if guard(self.player.state(), "state").is_none() {
            self.pending_record = Some(record.clone());
            return;
        }

        // Load new media when the room points somewhere else
        if let Some(video_id) = &record.video_id {
            let loaded = guard(self.player.loaded_media(), "loaded_media").flatten();
            if loaded.as_deref() != Some(video_id.as_str()) {
                self.suppressor.begin_remote_apply_at(now);
                if guard(self.player.load_media(video_id), "load_media").is_some() {
                    tracing::info!(video_id = %video_id, "Loaded media from remote state");
                }
                self.seeks.reset();
                self.last_polled = None;
            }
        }

        // Reconcile play/pause
        if let Some(state) = guard(self.player.state(), "state") {
            if record.is_playing && !matches!(state, PlayerState::Playing | PlayerState::Buffering)
            {
                self.suppressor.begin_remote_apply_at(now);
                guard(self.player.play(), "play");
            } else if !record.is_playing && state == PlayerState::Playing {
                self.suppressor.begin_remote_apply_at(now);
                guard(self.player.pause(), "pause");
            }
        }

        // Reconcile time against the drift-adjusted position
        let adjusted = estimate_position(record, now_ms, self.config.max_drift_secs);
        if let Some(player_time) = guard(self.player.current_time(), "current_time") {
            if (player_time - adjusted).abs() > self.config.seek_threshold_secs {
                self.suppressor.begin_remote_apply_at(now);
                self.seeks.note_remote_seek(adjusted);
                guard(self.player.seek_to(adjusted), "seek_to");
                self.last_polled = Some((adjusted, now));
                tracing::debug!(
                    player_time,
                    adjusted,
                    "Seeked player to adjusted remote position"
                );
            }
        }

        self.last_applied_update = record.last_update.max(self.last_applied_update);
        self.pending_record = None;
    }

    /// Route a player state-transition event; returns the outgoing write it
    /// amounts to, if any.
    pub fn on_player_event(&mut self, event: &PlayerEvent, now: Instant) -> Option<PlaybackUpdate> {
        match event.state {
            PlayerState::Playing | PlayerState::Paused => {
                let transitioned = self.last_steady_state != Some(event.state);
                self.last_steady_state = Some(event.state);

                // Events swallowed by the gate must not move the poll
                // baseline either, or a seek dropped inside the window
                // could never be recovered by the post-window poll
                if self.suppressor.is_applying_remote_at(now) {
                    if transitioned {
                        tracing::debug!(state = ?event.state, "Swallowed remote-origin transition");
                    }
                    return None;
                }
                self.last_polled = Some((event.time, now));

                if !transitioned {
                    return None;
                }
                Some(match event.state {
                    PlayerState::Playing => PlaybackUpdate::playing(event.time),
                    _ => PlaybackUpdate::paused(event.time),
                })
            }
            // Buffering with a fresh position is how the player reports a
            // seek before settling
            PlayerState::Buffering => {
                let update = self.classify_seek(event.time, now);
                if update.is_some() {
                    self.last_polled = Some((event.time, now));
                }
                update
            }
            _ => None,
        }
    }

    /// Poll-based detector: flag position jumps larger than elapsed wall
    /// clock could explain.
    pub fn poll_tick(&mut self, now: Instant) -> Option<PlaybackUpdate> {
        if let Some(record) = self.pending_record.take() {
            self.apply_remote(&record, now_ms(), now);
        }

        let time = guard(self.player.current_time(), "current_time")?;
        let Some((prev_time, prev_at)) = self.last_polled else {
            self.last_polled = Some((time, now));
            return None;
        };

        let elapsed = now.duration_since(prev_at).as_secs_f64();
        if (time - prev_time).abs() > elapsed + self.config.poll_jump_threshold_secs {
            // Keep the old baseline when the detection is discarded, so the
            // jump is re-flagged once the discarding condition has passed
            let update = self.classify_seek(time, now);
            if update.is_some() {
                self.last_polled = Some((time, now));
            }
            update
        } else {
            self.last_polled = Some((time, now));
            None
        }
    }

    /// A locally initiated media load. Always resets the room to playing
    /// from zero (auto-play-on-load).
    pub fn load_media(&mut self, video_id: &str, now: Instant) -> PlaybackUpdate {
        self.suppressor.begin_remote_apply_at(now);
        guard(self.player.load_media(video_id), "load_media");
        self.seeks.reset();
        self.last_polled = None;
        self.last_steady_state = Some(PlayerState::Playing);
        PlaybackUpdate::load(video_id)
    }

    fn classify_seek(&mut self, time: f64, now: Instant) -> Option<PlaybackUpdate> {
        match self.seeks.classify(time, &self.suppressor, now) {
            SeekVerdict::Accept => {
                tracing::debug!(time, "Accepted local seek");
                Some(PlaybackUpdate::seek(time))
            }
            verdict => {
                tracing::debug!(time, ?verdict, "Discarded seek detection");
                None
            }
        }
    }
}

/// The player initializes asynchronously; unavailable operations are
/// no-ops, never fatal.
fn guard<T>(result: crate::error::Result<T>, op: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(SyncError::PlayerUnavailable(reason)) => {
            tracing::debug!(op = %op, reason = %reason, "Player not ready, skipping");
            None
        }
        Err(error) => {
            tracing::warn!(op = %op, error = %error, "Player call failed");
            None
        }
    }
}
