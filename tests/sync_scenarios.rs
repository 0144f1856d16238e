// End-to-end scenarios: multiple clients of one in-memory store, each with
// its own simulated player and running session loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use watchsync::player::sim::SimPlayer;
use watchsync::player::MediaPlayer;
use watchsync::store::memory::{MemoryChannel, MemoryClient};
use watchsync::store::StateChannel;
use watchsync::{RoomLifecycle, RoomSession, SessionEvent, SessionIdentity, SyncConfig};

struct Participant {
    session: RoomSession,
    player: SimPlayer,
    client: Arc<MemoryClient>,
}

async fn join(
    store: &MemoryChannel,
    room_id: &str,
    client_id: &str,
    member_id: &str,
    name: &str,
) -> Participant {
    let client = store.client(client_id);
    let rooms = RoomLifecycle::new(client.clone(), SyncConfig::default());
    let (player, events) = SimPlayer::new();
    let session = rooms
        .join(
            room_id,
            SessionIdentity::new(member_id, name),
            None,
            Arc::new(player.clone()),
            events,
        )
        .await
        .expect("join should succeed");
    Participant {
        session,
        player,
        client,
    }
}

async fn create_room(store: &MemoryChannel, creator_member_id: &str) -> String {
    let rooms = RoomLifecycle::new(store.client("creator"), SyncConfig::default());
    rooms
        .create(&SessionIdentity::new(creator_member_id, "creator"))
        .await
        .expect("create should succeed")
}

#[tokio::test]
async fn test_media_load_propagates_and_autoplays() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(
        bob.player.loaded_media().unwrap().as_deref(),
        Some("dQw4w9WgXcQ")
    );
    let snap = ada.client.read_room(&room_id).await.unwrap().unwrap();
    assert!(snap.playback.is_playing);

    ada.session.leave().await.unwrap();
    bob.session.leave().await.unwrap();
}

#[tokio::test]
async fn test_local_seek_converges_on_all_players() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    ada.player.user_seek(120.0);
    sleep(Duration::from_millis(800)).await;

    let ada_time = ada.player.current_time().unwrap();
    let bob_time = bob.player.current_time().unwrap();
    assert!(
        (ada_time - bob_time).abs() < 2.0,
        "players diverged: ada={:.2} bob={:.2}",
        ada_time,
        bob_time
    );
    assert!(ada_time >= 120.0);

    ada.session.leave().await.unwrap();
    bob.session.leave().await.unwrap();
}

#[tokio::test]
async fn test_converged_room_stops_writing() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(500)).await;

    // Once settled, no feedback loop: the record must go quiet
    let before = ada
        .client
        .read_room(&room_id)
        .await
        .unwrap()
        .unwrap()
        .playback
        .last_update;
    sleep(Duration::from_millis(700)).await;
    let after = ada
        .client
        .read_room(&room_id)
        .await
        .unwrap()
        .unwrap()
        .playback
        .last_update;
    assert_eq!(before, after, "steady-state room kept writing");

    ada.session.leave().await.unwrap();
    bob.session.leave().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_auto_pauses_and_reconnect_resumes() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    bob.client.simulate_drop().await;
    sleep(Duration::from_millis(400)).await;

    let snap = ada.client.read_room(&room_id).await.unwrap().unwrap();
    assert!(!snap.playback.is_playing);
    assert!(snap.playback.is_paused_by_disconnect);
    assert_eq!(snap.playback.offline_member_name.as_deref(), Some("Bob"));
    // Transient drop marks the member, it does not remove them
    assert!(snap.members.iter().any(|m| m.id == "m-bob" && !m.connected));
    // Local players follow the involuntary pause
    assert_eq!(
        ada.player.state().unwrap(),
        watchsync::PlayerState::Paused
    );

    bob.client.simulate_reconnect();
    sleep(Duration::from_millis(400)).await;

    let snap = ada.client.read_room(&room_id).await.unwrap().unwrap();
    assert!(snap.playback.is_playing);
    assert!(!snap.playback.is_paused_by_disconnect);
    assert!(snap.playback.offline_member_name.is_none());
    assert!(snap.members.iter().all(|m| m.connected));

    ada.session.leave().await.unwrap();
    bob.session.leave().await.unwrap();
}

#[tokio::test]
async fn test_leave_and_garbage_collection() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    let probe = store.client("probe");
    ada.session.leave().await.unwrap();
    let snap = probe.read_room(&room_id).await.unwrap();
    assert!(snap.is_some(), "room must persist while a member remains");
    assert!(!snap.unwrap().members.iter().any(|m| m.id == "m-ada"));

    bob.session.leave().await.unwrap();
    assert!(probe.read_room(&room_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_room_close_ends_every_session() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let mut ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;
    let mut bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;

    let rooms = RoomLifecycle::new(store.client("c-ada"), SyncConfig::default());
    rooms.close(&room_id, "m-ada").await.unwrap();

    assert_eq!(ada.session.next_event().await, Some(SessionEvent::RoomEnded));
    assert_eq!(bob.session.next_event().await, Some(SessionEvent::RoomEnded));
}

#[tokio::test]
async fn test_player_initializing_after_join_catches_up() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    // Bob's player only comes up after he has joined; the room is quiet by
    // then, so no further snapshot will arrive to nudge him
    let rooms = RoomLifecycle::new(store.client("c-bob"), SyncConfig::default());
    let (player, events) = SimPlayer::uninitialized();
    let bob_session = rooms
        .join(
            &room_id,
            SessionIdentity::new("m-bob", "Bob"),
            None,
            Arc::new(player.clone()),
            events,
        )
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;
    player.initialize();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(player.loaded_media().unwrap().as_deref(), Some("dQw4w9WgXcQ"));
    let ada_time = ada.player.current_time().unwrap();
    let bob_time = player.current_time().unwrap();
    assert!(
        (ada_time - bob_time).abs() < 2.0,
        "late-initializing player diverged: ada={:.2} bob={:.2}",
        ada_time,
        bob_time
    );

    ada.session.leave().await.unwrap();
    bob_session.leave().await.unwrap();
}

#[tokio::test]
async fn test_late_joiner_catches_up_with_drift() {
    let store = MemoryChannel::new();
    let room_id = create_room(&store, "m-ada").await;
    let ada = join(&store, &room_id, "c-ada", "m-ada", "Ada").await;

    ada.session.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(200)).await;
    ada.player.user_seek(60.0);
    sleep(Duration::from_millis(600)).await;

    // Bob joins well after the seek write; drift compensation must land him
    // near Ada, not at the raw written position
    let bob = join(&store, &room_id, "c-bob", "m-bob", "Bob").await;
    sleep(Duration::from_millis(400)).await;

    let ada_time = ada.player.current_time().unwrap();
    let bob_time = bob.player.current_time().unwrap();
    assert!(
        (ada_time - bob_time).abs() < 2.0,
        "late joiner diverged: ada={:.2} bob={:.2}",
        ada_time,
        bob_time
    );

    ada.session.leave().await.unwrap();
    bob.session.leave().await.unwrap();
}
