//! watchsync: collaborative playback synchronization engine.
//!
//! Keeps one canonical playback position and play/pause state consistent
//! across independent clients of a shared last-writer-wins record, despite
//! clock drift, network jitter, and members joining, leaving, or dropping
//! mid-session. The remote store and the embedded media player are external
//! collaborators behind the [`store::StateChannel`] and
//! [`player::MediaPlayer`] seams.

pub mod config;
pub mod error;
pub mod player;
pub mod store;
pub mod sync;

pub use config::{Config, SyncConfig};
pub use error::{Result, SyncError};
pub use player::{MediaPlayer, PlayerEvent, PlayerState};
pub use store::{
    DisconnectOp, MemberRecord, PlaybackUpdate, RoomRecord, RoomSnapshot, StateChannel,
};
pub use sync::{RoomLifecycle, RoomSession, SessionEvent, SessionIdentity};
