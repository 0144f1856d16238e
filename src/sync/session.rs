//! The running session: one event loop per joined member.
//!
//! Composes the subscription, the player adapter, and presence evaluation.
//! Everything is single-task and event-driven; remote writes are
//! fire-and-forget (a failed write is logged and healed by the next
//! snapshot cycle, never retried in place).

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::player::{MediaPlayer, PlayerEvent};
use crate::store::{now_ms, PlaybackUpdate, RoomSnapshot, StateChannel};

use super::adapter::PlayerAdapter;
use super::presence::{self, PresenceMonitor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The room record was deleted (explicit close or garbage collection);
    /// the session is over and the caller should exit the room view.
    RoomEnded,
}

enum SessionCommand {
    LoadMedia(String),
}

/// Handle to a member's running sync loop. Dropping the handle aborts the
/// loop and cancels its timers; [`RoomSession::leave`] additionally removes
/// the member record.
pub struct RoomSession {
    room_id: String,
    member_id: String,
    presence: PresenceMonitor,
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    handle: JoinHandle<()>,
}

impl RoomSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        channel: Arc<dyn StateChannel>,
        room_id: String,
        member_id: String,
        presence: PresenceMonitor,
        player: Arc<dyn MediaPlayer>,
        player_events: mpsc::UnboundedReceiver<PlayerEvent>,
        subscription: watch::Receiver<Option<RoomSnapshot>>,
        config: SyncConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let ctx = SessionLoop {
            channel: channel.clone(),
            room_id: room_id.clone(),
            adapter: PlayerAdapter::new(player, config.clone()),
            presence: presence.clone(),
            subscription,
            player_events,
            commands: commands_rx,
            events: events_tx,
            config,
        };
        let handle = tokio::spawn(ctx.run());

        Self {
            room_id,
            member_id,
            presence,
            commands: commands_tx,
            events: events_rx,
            handle,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Load new media into the room (auto-plays from zero for everyone).
    pub fn load_media(&self, video_id: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::LoadMedia(video_id.into()));
    }

    /// Next lifecycle event, `None` once the loop has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Intentional leave: stop the loop and remove the member record. The
    /// store garbage-collects the room if this was the last member.
    pub async fn leave(self) -> Result<()> {
        self.handle.abort();
        self.presence.leave().await
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct SessionLoop {
    channel: Arc<dyn StateChannel>,
    room_id: String,
    adapter: PlayerAdapter,
    presence: PresenceMonitor,
    subscription: watch::Receiver<Option<RoomSnapshot>>,
    player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    config: SyncConfig,
}

impl SessionLoop {
    async fn run(mut self) {
        // The subscription holds the current value immediately
        let initial = self.subscription.borrow_and_update().clone();
        match initial {
            Some(snapshot) => self.handle_snapshot(&snapshot).await,
            None => {
                self.emit_ended();
                return;
            }
        }

        let mut connectivity = self.channel.connectivity();
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = self.subscription.changed() => {
                    if changed.is_err() {
                        self.emit_ended();
                        break;
                    }
                    let snapshot = self.subscription.borrow_and_update().clone();
                    match snapshot {
                        Some(snapshot) => self.handle_snapshot(&snapshot).await,
                        None => {
                            tracing::info!(room_id = %self.room_id, "Room ended");
                            self.emit_ended();
                            break;
                        }
                    }
                }
                Some(event) = self.player_events.recv() => {
                    if let Some(update) = self.adapter.on_player_event(&event, Instant::now()) {
                        self.write(update).await;
                    }
                }
                _ = poll.tick() => {
                    if let Some(update) = self.adapter.poll_tick(Instant::now()) {
                        self.write(update).await;
                    }
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    if *connectivity.borrow_and_update() {
                        // Reconnected: re-announce presence and re-arm the
                        // disconnect hook (registrations are consumed by a drop)
                        if let Err(error) = self.presence.register().await {
                            tracing::warn!(
                                room_id = %self.room_id,
                                error = %error,
                                "Presence re-registration failed"
                            );
                        }
                    }
                }
                Some(command) = self.commands.recv() => {
                    match command {
                        SessionCommand::LoadMedia(video_id) => {
                            let update = self.adapter.load_media(&video_id, Instant::now());
                            self.write(update).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_snapshot(&mut self, snapshot: &RoomSnapshot) {
        self.adapter
            .apply_remote(&snapshot.playback, now_ms(), Instant::now());

        if let Some(action) = presence::evaluate(&snapshot.members, &snapshot.playback) {
            tracing::info!(room_id = %self.room_id, action = ?action, "Presence action");
            self.write(action.to_update()).await;
        }
    }

    async fn write(&self, update: PlaybackUpdate) {
        if let Err(error) = self.channel.write_playback(&self.room_id, update).await {
            tracing::warn!(
                room_id = %self.room_id,
                error = %error,
                "Remote write failed; next snapshot will reconcile"
            );
        }
    }

    fn emit_ended(&self) {
        let _ = self.events.send(SessionEvent::RoomEnded);
    }
}
