//! External media player abstraction.
//!
//! The engine only issues control commands to the embedded player and reads
//! its reported state; decoding and rendering are someone else's problem.
//! Players initialize asynchronously, so every method is fallible and a
//! [`SyncError::PlayerUnavailable`](crate::error::SyncError::PlayerUnavailable)
//! is expected and swallowed by callers.

pub mod sim;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Player state vocabulary, with the conventional numeric codes
/// (1 = playing, 2 = paused, 3 = buffering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    pub fn code(self) -> i8 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(PlayerState::Unstarted),
            0 => Some(PlayerState::Ended),
            1 => Some(PlayerState::Playing),
            2 => Some(PlayerState::Paused),
            3 => Some(PlayerState::Buffering),
            5 => Some(PlayerState::Cued),
            _ => None,
        }
    }
}

/// A state-transition event reported by the player, with the playback
/// position at the moment of the transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub state: PlayerState,
    pub time: f64,
}

/// Control and read surface of the embedded player.
pub trait MediaPlayer: Send + Sync {
    fn load_media(&self, video_id: &str) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn seek_to(&self, time: f64) -> Result<()>;
    fn current_time(&self) -> Result<f64>;
    fn state(&self) -> Result<PlayerState>;
    /// Identifier of the currently loaded media, if any.
    fn loaded_media(&self) -> Result<Option<String>>;
}
