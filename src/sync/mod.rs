//! The synchronization core: drift compensation, echo suppression, seek
//! classification, player reconciliation, presence rules, and the session
//! and lifecycle layers that compose them.

pub mod adapter;
pub mod drift;
pub mod echo;
pub mod presence;
pub mod room;
pub mod seek;
pub mod session;

pub use adapter::PlayerAdapter;
pub use echo::EchoSuppressor;
pub use presence::{PresenceAction, PresenceMonitor};
pub use room::{RoomLifecycle, SessionIdentity};
pub use seek::{SeekClassifier, SeekVerdict};
pub use session::{RoomSession, SessionEvent};
