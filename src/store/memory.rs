//! In-memory [`StateChannel`] with realtime-database semantics, used by the
//! test suites and the validation CLI. Each simulated client gets its own
//! handle with an independent connectivity oracle and on-disconnect registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};

use async_trait::async_trait;

use super::{now_ms, DisconnectOp, MemberRecord, PlaybackUpdate, RoomRecord, RoomSnapshot, StateChannel};
use crate::error::{Result, SyncError};

struct RoomEntry {
    playback: RoomRecord,
    members: HashMap<String, MemberRecord>,
    tx: watch::Sender<Option<RoomSnapshot>>,
}

impl RoomEntry {
    fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<MemberRecord> = self.members.values().cloned().collect();
        members.sort_by(|a, b| a.last_seen.cmp(&b.last_seen).then(a.id.cmp(&b.id)));
        RoomSnapshot {
            playback: self.playback.clone(),
            members,
        }
    }

    fn broadcast(&self) {
        self.tx.send_replace(Some(self.snapshot()));
    }
}

struct StoreInner {
    rooms: RwLock<HashMap<String, RoomEntry>>,
    last_ts: Mutex<u64>,
}

impl StoreInner {
    /// Server timestamps are strictly increasing even when two writes land
    /// within the same millisecond.
    fn next_ts(&self) -> u64 {
        let mut last = self.last_ts.lock().unwrap();
        let ts = now_ms().max(*last + 1);
        *last = ts;
        ts
    }
}

/// The shared store. Clone handles are cheap; use [`MemoryChannel::client`]
/// to obtain per-client views.
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<StoreInner>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                rooms: RwLock::new(HashMap::new()),
                last_ts: Mutex::new(0),
            }),
        }
    }

    /// A per-client view of the store with its own connectivity state.
    pub fn client(&self, client_id: impl Into<String>) -> Arc<MemoryClient> {
        Arc::new(MemoryClient {
            inner: self.inner.clone(),
            client_id: client_id.into(),
            connected: watch::Sender::new(true),
            disconnect_ops: Mutex::new(Vec::new()),
        })
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryClient {
    inner: Arc<StoreInner>,
    client_id: String,
    connected: watch::Sender<bool>,
    disconnect_ops: Mutex<Vec<DisconnectOp>>,
}

impl MemoryClient {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Simulate an ungraceful network drop: connectivity flips false and the
    /// registered on-disconnect instructions run server-side, exactly once.
    pub async fn simulate_drop(&self) {
        self.connected.send_replace(false);
        let ops: Vec<DisconnectOp> = self.disconnect_ops.lock().unwrap().drain(..).collect();

        let mut rooms = self.inner.rooms.write().await;
        for op in ops {
            match op {
                DisconnectOp::MarkDisconnected { room_id, member_id } => {
                    if let Some(entry) = rooms.get_mut(&room_id) {
                        if let Some(member) = entry.members.get_mut(&member_id) {
                            member.connected = false;
                            tracing::debug!(
                                room_id = %room_id,
                                member_id = %member_id,
                                "Marked member disconnected"
                            );
                        }
                        entry.broadcast();
                    }
                }
                DisconnectOp::RemoveMember { room_id, member_id } => {
                    remove_member_locked(&mut rooms, &room_id, &member_id);
                }
            }
        }
    }

    /// Simulate connectivity coming back. On-disconnect instructions are not
    /// restored; the client re-registers them, as a real client would.
    pub fn simulate_reconnect(&self) {
        self.connected.send_replace(true);
    }
}

fn remove_member_locked(
    rooms: &mut HashMap<String, RoomEntry>,
    room_id: &str,
    member_id: &str,
) {
    let Some(entry) = rooms.get_mut(room_id) else {
        return;
    };
    entry.members.remove(member_id);

    if entry.members.is_empty() {
        // Garbage collection: an emptied room is deleted outright
        entry.tx.send_replace(None);
        rooms.remove(room_id);
        tracing::info!(room_id = %room_id, "Room emptied, deleting record");
    } else {
        entry.broadcast();
    }
}

#[async_trait]
impl StateChannel for MemoryClient {
    async fn create_room(&self, room_id: &str, record: RoomRecord) -> Result<()> {
        let mut rooms = self.inner.rooms.write().await;
        if rooms.contains_key(room_id) {
            return Err(SyncError::InvalidState(format!(
                "Room {} already exists",
                room_id
            )));
        }
        let entry = RoomEntry {
            playback: record,
            members: HashMap::new(),
            tx: watch::Sender::new(None),
        };
        entry.broadcast();
        rooms.insert(room_id.to_string(), entry);
        tracing::info!(room_id = %room_id, client_id = %self.client_id, "Room created");
        Ok(())
    }

    async fn read_room(&self, room_id: &str) -> Result<Option<RoomSnapshot>> {
        let rooms = self.inner.rooms.read().await;
        Ok(rooms.get(room_id).map(RoomEntry::snapshot))
    }

    async fn write_playback(&self, room_id: &str, update: PlaybackUpdate) -> Result<()> {
        let mut rooms = self.inner.rooms.write().await;
        let entry = rooms
            .get_mut(room_id)
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;
        // Timestamp assigned under the write lock, so assignment order and
        // apply order cannot diverge between concurrent writers
        let ts = self.inner.next_ts();
        entry.playback.apply(&update, ts);
        entry.broadcast();
        Ok(())
    }

    async fn put_member(&self, room_id: &str, mut member: MemberRecord) -> Result<()> {
        let mut rooms = self.inner.rooms.write().await;
        let entry = rooms
            .get_mut(room_id)
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;
        let ts = self.inner.next_ts();
        // Keep the original join time on re-puts so member ordering is stable
        member.last_seen = entry
            .members
            .get(&member.id)
            .map(|existing| existing.last_seen)
            .unwrap_or(ts);
        entry.members.insert(member.id.clone(), member);
        entry.broadcast();
        Ok(())
    }

    async fn remove_member(&self, room_id: &str, member_id: &str) -> Result<()> {
        let mut rooms = self.inner.rooms.write().await;
        remove_member_locked(&mut rooms, room_id, member_id);
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(entry) = rooms.remove(room_id) {
            entry.tx.send_replace(None);
            tracing::info!(room_id = %room_id, "Room deleted");
        }
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> Result<watch::Receiver<Option<RoomSnapshot>>> {
        let rooms = self.inner.rooms.read().await;
        let entry = rooms
            .get(room_id)
            .ok_or_else(|| SyncError::RoomNotFound(room_id.to_string()))?;
        Ok(entry.tx.subscribe())
    }

    fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn register_on_disconnect(&self, ops: Vec<DisconnectOp>) -> Result<()> {
        *self.disconnect_ops.lock().unwrap() = ops;
        Ok(())
    }
}
