use thiserror::Error;

/// Custom error types for the synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Room and member management errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Member {0} not found in room")]
    MemberNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Remote store errors
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External player errors
    #[error("Player unavailable: {0}")]
    PlayerUnavailable(String),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        SyncError::Internal(msg.into())
    }

    /// Helper to create Connection errors
    pub fn connection(msg: impl Into<String>) -> Self {
        SyncError::Connection(msg.into())
    }

    /// Helper to create PlayerUnavailable errors
    pub fn player_unavailable(msg: impl Into<String>) -> Self {
        SyncError::PlayerUnavailable(msg.into())
    }
}
