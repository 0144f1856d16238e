//! Presence monitoring and room-wide auto-pause/auto-resume.
//!
//! Rule evaluation is a pure function of the member set and the playback
//! record, and is idempotent: once its write lands, re-evaluating the
//! resulting snapshot yields no further action. Every member runs the same
//! rules, so duplicate concurrent writes collapse under last-write-wins.

use std::sync::Arc;

use crate::error::Result;
use crate::store::{now_ms, DisconnectOp, MemberRecord, PlaybackUpdate, RoomRecord, StateChannel};

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceAction {
    /// A member dropped while the room was playing: involuntary room-wide
    /// pause naming the offline member.
    PauseForDisconnect { offline_member_name: String },
    /// Everyone is back: lift a disconnect-induced pause.
    ResumeAfterReconnect,
}

impl PresenceAction {
    pub fn to_update(&self) -> PlaybackUpdate {
        match self {
            PresenceAction::PauseForDisconnect {
                offline_member_name,
            } => PlaybackUpdate::pause_for_disconnect(offline_member_name.clone()),
            PresenceAction::ResumeAfterReconnect => PlaybackUpdate::resume_after_reconnect(),
        }
    }
}

/// Evaluate the auto-pause/auto-resume rules for one snapshot.
pub fn evaluate(members: &[MemberRecord], playback: &RoomRecord) -> Option<PresenceAction> {
    let offline = members.iter().find(|m| !m.connected);

    match offline {
        Some(member) if playback.is_playing && !playback.is_paused_by_disconnect => {
            Some(PresenceAction::PauseForDisconnect {
                offline_member_name: member.name.clone(),
            })
        }
        None if playback.is_paused_by_disconnect && !members.is_empty() => {
            Some(PresenceAction::ResumeAfterReconnect)
        }
        _ => None,
    }
}

/// Per-member presence registration against the remote channel: an
/// immediate connected write plus a durable mark-disconnected instruction,
/// re-run on every reconnect.
#[derive(Clone)]
pub struct PresenceMonitor {
    channel: Arc<dyn StateChannel>,
    room_id: String,
    member_id: String,
    member_name: String,
}

impl PresenceMonitor {
    pub fn new(
        channel: Arc<dyn StateChannel>,
        room_id: impl Into<String>,
        member_id: impl Into<String>,
        member_name: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            room_id: room_id.into(),
            member_id: member_id.into(),
            member_name: member_name.into(),
        }
    }

    /// Announce this member as connected and arm the disconnect hook.
    pub async fn register(&self) -> Result<()> {
        self.channel
            .put_member(
                &self.room_id,
                MemberRecord {
                    id: self.member_id.clone(),
                    name: self.member_name.clone(),
                    connected: true,
                    last_seen: now_ms(),
                },
            )
            .await?;
        self.channel
            .register_on_disconnect(vec![DisconnectOp::MarkDisconnected {
                room_id: self.room_id.clone(),
                member_id: self.member_id.clone(),
            }])
            .await?;
        tracing::debug!(
            room_id = %self.room_id,
            member_id = %self.member_id,
            "Presence registered"
        );
        Ok(())
    }

    /// Intentional leave: remove the member record entirely, distinct from
    /// a transient disconnect mark.
    pub async fn leave(&self) -> Result<()> {
        self.channel
            .remove_member(&self.room_id, &self.member_id)
            .await?;
        tracing::info!(
            room_id = %self.room_id,
            member_id = %self.member_id,
            "Member left room"
        );
        Ok(())
    }
}
