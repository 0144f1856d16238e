//! Room lifecycle: create, join, leave, close.

use std::sync::Arc;
use rand::Rng;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::player::{MediaPlayer, PlayerEvent};
use crate::store::{RoomRecord, StateChannel};

use super::presence::PresenceMonitor;
use super::session::RoomSession;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_CODE_LEN: usize = 6;

/// Explicit per-session identity, passed into every lifecycle operation
/// rather than read from ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub member_id: String,
    pub name: String,
}

impl SessionIdentity {
    pub fn new(member_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            name: name.into(),
        }
    }

    /// Fresh random identity for a display name.
    pub fn generate(name: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();
        let member_id: String = (0..13)
            .map(|_| {
                let c = ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char;
                c.to_ascii_lowercase()
            })
            .collect();
        Self {
            member_id,
            name: name.into(),
        }
    }
}

pub struct RoomLifecycle {
    channel: Arc<dyn StateChannel>,
    config: SyncConfig,
}

impl RoomLifecycle {
    pub fn new(channel: Arc<dyn StateChannel>, config: SyncConfig) -> Self {
        Self { channel, config }
    }

    /// Random 6-character room code. Collisions are not checked; the space
    /// is large relative to concurrent room count.
    pub fn generate_room_code() -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Create a new room with the caller as its creator. Returns the room
    /// code. The room starts paused at zero with no media loaded.
    pub async fn create(&self, identity: &SessionIdentity) -> Result<String> {
        let room_id = Self::generate_room_code();
        self.channel
            .create_room(&room_id, RoomRecord::new(&identity.member_id))
            .await?;
        tracing::info!(room_id = %room_id, member_id = %identity.member_id, "Room created");
        Ok(room_id)
    }

    /// Join a room: verify it exists, register presence, and start the sync
    /// loop against the supplied player.
    pub async fn join(
        &self,
        room_id: &str,
        identity: SessionIdentity,
        password: Option<&str>,
        player: Arc<dyn MediaPlayer>,
        player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) -> Result<RoomSession> {
        let room_id = room_id.trim().to_uppercase();
        if self.channel.read_room(&room_id).await?.is_none() {
            return Err(SyncError::RoomNotFound(room_id));
        }
        // Rooms are open; a supplied password is carried but not verified
        let _ = password;

        let presence = PresenceMonitor::new(
            self.channel.clone(),
            room_id.clone(),
            identity.member_id.clone(),
            identity.name.clone(),
        );
        presence.register().await?;

        let subscription = self.channel.subscribe(&room_id).await?;
        tracing::info!(room_id = %room_id, member_id = %identity.member_id, "Joined room");

        Ok(RoomSession::spawn(
            self.channel.clone(),
            room_id,
            identity.member_id,
            presence,
            player,
            player_events,
            subscription,
            self.config.clone(),
        ))
    }

    /// Remove a member without a session handle. The store garbage-collects
    /// the room when the member set empties.
    pub async fn leave(&self, room_id: &str, member_id: &str) -> Result<()> {
        self.channel.remove_member(room_id, member_id).await
    }

    /// Close the room outright. Only the creator may close; the check runs
    /// before any write is attempted.
    pub async fn close(&self, room_id: &str, caller_id: &str) -> Result<()> {
        let snapshot = self
            .channel
            .read_room(room_id)
            .await?
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;

        if snapshot.playback.creator_id != caller_id {
            return Err(SyncError::InvalidState(format!(
                "Member {} is not the creator of room {}",
                caller_id, room_id
            )));
        }

        self.channel.delete_room(room_id).await?;
        tracing::info!(room_id = %room_id, caller_id = %caller_id, "Room closed by creator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::sim::SimPlayer;
    use crate::store::memory::MemoryChannel;
    use crate::sync::session::SessionEvent;

    fn lifecycle(store: &MemoryChannel, client: &str) -> RoomLifecycle {
        RoomLifecycle::new(store.client(client), SyncConfig::default())
    }

    #[test]
    fn test_room_code_shape() {
        for _ in 0..50 {
            let code = RoomLifecycle::generate_room_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_identity_shape() {
        let identity = SessionIdentity::generate("Ada");
        assert_eq!(identity.member_id.len(), 13);
        assert_eq!(identity.name, "Ada");
        assert_ne!(
            identity.member_id,
            SessionIdentity::generate("Ada").member_id
        );
    }

    #[tokio::test]
    async fn test_create_initializes_paused_room() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let ada = SessionIdentity::new("m-ada", "Ada");

        let room_id = rooms.create(&ada).await.unwrap();
        let snapshot = store
            .client("probe")
            .read_room(&room_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.playback.creator_id, "m-ada");
        assert!(!snapshot.playback.is_playing);
        assert_eq!(snapshot.playback.current_time, 0.0);
    }

    #[tokio::test]
    async fn test_join_nonexistent_room_fails() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let (player, events) = SimPlayer::new();

        let result = rooms
            .join(
                "ZZZZZZ",
                SessionIdentity::new("m1", "Ada"),
                None,
                Arc::new(player),
                events,
            )
            .await;
        assert!(matches!(result, Err(SyncError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn test_join_normalizes_room_code() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let ada = SessionIdentity::new("m-ada", "Ada");
        let room_id = rooms.create(&ada).await.unwrap();

        let (player, events) = SimPlayer::new();
        let session = rooms
            .join(
                &format!("  {}  ", room_id.to_lowercase()),
                ada,
                None,
                Arc::new(player),
                events,
            )
            .await
            .unwrap();
        assert_eq!(session.room_id(), room_id);
        session.leave().await.unwrap();
    }

    #[tokio::test]
    async fn test_leave_garbage_collects_empty_room() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let ada = SessionIdentity::new("m-ada", "Ada");
        let bob = SessionIdentity::new("m-bob", "Bob");
        let room_id = rooms.create(&ada).await.unwrap();

        let (ada_player, ada_events) = SimPlayer::new();
        let ada_session = rooms
            .join(&room_id, ada, None, Arc::new(ada_player), ada_events)
            .await
            .unwrap();
        let (bob_player, bob_events) = SimPlayer::new();
        let bob_session = rooms
            .join(&room_id, bob, None, Arc::new(bob_player), bob_events)
            .await
            .unwrap();

        ada_session.leave().await.unwrap();
        let probe = store.client("probe");
        assert!(probe.read_room(&room_id).await.unwrap().is_some());

        bob_session.leave().await.unwrap();
        assert!(probe.read_room(&room_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_requires_creator() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let ada = SessionIdentity::new("m-ada", "Ada");
        let room_id = rooms.create(&ada).await.unwrap();

        let err = rooms.close(&room_id, "m-bob").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidState(_)));
        // The rejected close must not have deleted anything
        assert!(store
            .client("probe")
            .read_room(&room_id)
            .await
            .unwrap()
            .is_some());

        rooms.close(&room_id, "m-ada").await.unwrap();
        assert!(store
            .client("probe")
            .read_room(&room_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_close_unknown_room_is_not_found() {
        let store = MemoryChannel::new();
        let rooms = lifecycle(&store, "c1");
        let err = rooms.close("ZZZZZZ", "m-ada").await.unwrap_err();
        assert!(matches!(err, SyncError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_subscriber_sees_room_ended_on_close() {
        let store = MemoryChannel::new();
        let creator_rooms = lifecycle(&store, "c1");
        let ada = SessionIdentity::new("m-ada", "Ada");
        let bob = SessionIdentity::new("m-bob", "Bob");
        let room_id = creator_rooms.create(&ada).await.unwrap();

        let (player, events) = SimPlayer::new();
        let mut bob_session = lifecycle(&store, "c2")
            .join(&room_id, bob, None, Arc::new(player), events)
            .await
            .unwrap();

        creator_rooms.close(&room_id, "m-ada").await.unwrap();
        assert_eq!(bob_session.next_event().await, Some(SessionEvent::RoomEnded));
    }
}
