//! Shared records and the remote state channel abstraction.
//!
//! The engine never talks to a concrete backend; it reads and writes through
//! [`StateChannel`], whose contract mirrors what realtime document stores
//! provide: merge writes with server-assigned timestamps, live subscriptions
//! that deliver the full current value, atomic removal, a connectivity
//! oracle, and durable on-disconnect instructions.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use crate::error::Result;

/// The authoritative shared playback record for one room.
///
/// Any member may update the playback fields; concurrent writes are resolved
/// by the store's last-write-wins semantics on `lastUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub video_id: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    /// Server-assigned write time in Unix milliseconds, strictly increasing
    /// per store. Not required to match any member's local clock.
    pub last_update: Option<u64>,
    pub creator_id: String,
    pub is_paused_by_disconnect: bool,
    pub offline_member_name: Option<String>,
}

impl RoomRecord {
    pub fn new(creator_id: impl Into<String>) -> Self {
        Self {
            video_id: None,
            is_playing: false,
            current_time: 0.0,
            last_update: None,
            creator_id: creator_id.into(),
            is_paused_by_disconnect: false,
            offline_member_name: None,
        }
    }

    /// Merge a partial playback write into this record, stamping it with the
    /// server-assigned timestamp. Invariant: `isPlaying` and
    /// `isPausedByDisconnect` are never both true after a merge.
    pub fn apply(&mut self, update: &PlaybackUpdate, server_ts: u64) {
        if let Some(video_id) = &update.video_id {
            self.video_id = video_id.clone();
        }
        if let Some(is_playing) = update.is_playing {
            self.is_playing = is_playing;
        }
        if let Some(current_time) = update.current_time {
            self.current_time = current_time;
        }
        if let Some(flag) = update.is_paused_by_disconnect {
            self.is_paused_by_disconnect = flag;
        }
        if let Some(name) = &update.offline_member_name {
            self.offline_member_name = name.clone();
        }
        if self.is_playing && self.is_paused_by_disconnect {
            tracing::warn!("Conflicting playing/paused-by-disconnect write, clearing pause flag");
            self.is_paused_by_disconnect = false;
            self.offline_member_name = None;
        }
        self.last_update = Some(server_ts);
    }
}

/// Shared presence record for one participant, owned by that participant
/// while connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub last_seen: u64,
}

/// A partial merge write of the playback fields. `None` leaves a field
/// untouched; the outer `Option` on nullable fields distinguishes "unset"
/// from "set to null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackUpdate {
    pub video_id: Option<Option<String>>,
    pub is_playing: Option<bool>,
    pub current_time: Option<f64>,
    pub is_paused_by_disconnect: Option<bool>,
    pub offline_member_name: Option<Option<String>>,
}

impl PlaybackUpdate {
    /// A member started playback at `time`.
    pub fn playing(time: f64) -> Self {
        Self {
            is_playing: Some(true),
            current_time: Some(time),
            ..Default::default()
        }
    }

    /// A member paused playback at `time`.
    pub fn paused(time: f64) -> Self {
        Self {
            is_playing: Some(false),
            current_time: Some(time),
            ..Default::default()
        }
    }

    /// A member seeked to `time`; play/pause state is untouched.
    pub fn seek(time: f64) -> Self {
        Self {
            current_time: Some(time),
            ..Default::default()
        }
    }

    /// A member loaded new media. Loading always resets the room to playing
    /// from the start (auto-play-on-load).
    pub fn load(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(Some(video_id.into())),
            is_playing: Some(true),
            current_time: Some(0.0),
            ..Default::default()
        }
    }

    /// Room-wide involuntary pause because `offline_member_name` dropped.
    pub fn pause_for_disconnect(offline_member_name: impl Into<String>) -> Self {
        Self {
            is_playing: Some(false),
            is_paused_by_disconnect: Some(true),
            offline_member_name: Some(Some(offline_member_name.into())),
            ..Default::default()
        }
    }

    /// Auto-resume once every member is connected again.
    pub fn resume_after_reconnect() -> Self {
        Self {
            is_playing: Some(true),
            is_paused_by_disconnect: Some(false),
            offline_member_name: Some(None),
            ..Default::default()
        }
    }
}

/// Full room value delivered on every subscription tick. Members are ordered
/// by join time (`lastSeen`, then id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub playback: RoomRecord,
    pub members: Vec<MemberRecord>,
}

/// Durable instruction the store runs when the registering client drops
/// without an explicit disconnect.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectOp {
    /// Flip the member's `connected` flag, keeping the record (transient
    /// drop, distinct from an intentional leave).
    MarkDisconnected { room_id: String, member_id: String },
    /// Remove the member record entirely.
    RemoveMember { room_id: String, member_id: String },
}

/// The remote shared store, seen from one client.
///
/// Deleting a room (explicitly or by garbage collection when its member set
/// empties) is observed by subscribers as a `None` snapshot, which they must
/// treat as "room ended".
#[async_trait]
pub trait StateChannel: Send + Sync {
    /// Create the room record. Fails if the id is already taken.
    async fn create_room(&self, room_id: &str, record: RoomRecord) -> Result<()>;

    /// Read the current room value, `None` if the room does not exist.
    async fn read_room(&self, room_id: &str) -> Result<Option<RoomSnapshot>>;

    /// Merge-update the playback fields. The store assigns `lastUpdate`.
    async fn write_playback(&self, room_id: &str, update: PlaybackUpdate) -> Result<()>;

    /// Create or replace a member record; `lastSeen` is server-assigned.
    async fn put_member(&self, room_id: &str, member: MemberRecord) -> Result<()>;

    /// Atomically remove a member record. An emptied room is garbage
    /// collected by the store.
    async fn remove_member(&self, room_id: &str, member_id: &str) -> Result<()>;

    /// Delete the room outright, propagating "room ended" to subscribers.
    async fn delete_room(&self, room_id: &str) -> Result<()>;

    /// Live subscription: the receiver holds the current value immediately
    /// and observes every subsequent change.
    async fn subscribe(&self, room_id: &str) -> Result<watch::Receiver<Option<RoomSnapshot>>>;

    /// Connectivity oracle for this client.
    fn connectivity(&self) -> watch::Receiver<bool>;

    /// Register durable instructions run if this client drops ungracefully.
    /// Replaces any previously registered set.
    async fn register_on_disconnect(&self, ops: Vec<DisconnectOp>) -> Result<()>;
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_is_paused_at_zero() {
        let record = RoomRecord::new("creator-1");
        assert!(!record.is_playing);
        assert_eq!(record.current_time, 0.0);
        assert!(record.video_id.is_none());
        assert!(record.last_update.is_none());
        assert_eq!(record.creator_id, "creator-1");
    }

    #[test]
    fn test_apply_merges_and_stamps() {
        let mut record = RoomRecord::new("creator-1");
        record.apply(&PlaybackUpdate::playing(42.0), 1000);
        assert!(record.is_playing);
        assert_eq!(record.current_time, 42.0);
        assert_eq!(record.last_update, Some(1000));

        // Seek leaves play state untouched
        record.apply(&PlaybackUpdate::seek(90.0), 1001);
        assert!(record.is_playing);
        assert_eq!(record.current_time, 90.0);
        assert_eq!(record.last_update, Some(1001));
    }

    #[test]
    fn test_playing_and_paused_by_disconnect_never_both() {
        let mut record = RoomRecord::new("creator-1");
        record.apply(&PlaybackUpdate::pause_for_disconnect("Bob"), 1);
        assert!(!record.is_playing);
        assert!(record.is_paused_by_disconnect);
        assert_eq!(record.offline_member_name.as_deref(), Some("Bob"));

        record.apply(&PlaybackUpdate::resume_after_reconnect(), 2);
        assert!(record.is_playing);
        assert!(!record.is_paused_by_disconnect);
        assert!(record.offline_member_name.is_none());

        // A conflicting merge is normalized rather than left inconsistent
        let conflicting = PlaybackUpdate {
            is_playing: Some(true),
            is_paused_by_disconnect: Some(true),
            ..Default::default()
        };
        record.apply(&conflicting, 3);
        assert!(!(record.is_playing && record.is_paused_by_disconnect));
    }

    #[test]
    fn test_load_resets_to_autoplay() {
        let mut record = RoomRecord::new("creator-1");
        record.apply(&PlaybackUpdate::paused(120.0), 1);
        record.apply(&PlaybackUpdate::load("dQw4w9WgXcQ"), 2);
        assert_eq!(record.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert!(record.is_playing);
        assert_eq!(record.current_time, 0.0);
    }

    #[test]
    fn test_record_field_contract() {
        let mut record = RoomRecord::new("c1");
        record.apply(&PlaybackUpdate::load("abc"), 7);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["videoId"], "abc");
        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["currentTime"], 0.0);
        assert_eq!(json["lastUpdate"], 7);
        assert_eq!(json["creatorId"], "c1");
        assert_eq!(json["isPausedByDisconnect"], false);

        let member = MemberRecord {
            id: "m1".to_string(),
            name: "Ada".to_string(),
            connected: true,
            last_seen: 9,
        };
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["lastSeen"], 9);
        assert_eq!(json["connected"], true);
    }
}
