// watchsync CLI validation tool
// Runs scripted multi-client scenarios against the in-memory channel with
// simulated players and reports pass/fail per scenario.

use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use watchsync::player::sim::SimPlayer;
use watchsync::player::MediaPlayer;
use watchsync::store::memory::MemoryChannel;
use watchsync::store::{PlaybackUpdate, RoomRecord, StateChannel};
use watchsync::sync::drift::estimate_position;
use watchsync::{Config, RoomLifecycle, SessionEvent, SessionIdentity, SyncError};

#[derive(Parser)]
#[command(name = "watchsync-cli")]
#[command(about = "watchsync validation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run validation scenarios
    Validate {
        /// Run all scenarios
        #[arg(short, long)]
        all: bool,

        /// Run a specific scenario
        #[arg(short, long)]
        scenario: Option<String>,
    },

    /// Run a short two-member demo session with progress output
    Demo,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Validate { all, scenario } => {
            if *all {
                run_all_scenarios().await;
            } else if let Some(name) = scenario {
                run_scenario(name).await;
            } else {
                println!("{}", "Use --all or --scenario <name>".yellow());
                list_scenarios();
            }
        }
        Commands::Demo => demo().await,
    }
}

const SCENARIOS: &[&str] = &["drift", "seek", "autopause", "gc", "close"];

fn list_scenarios() {
    println!("Available scenarios:");
    for name in SCENARIOS {
        println!("  - {}", name);
    }
}

async fn run_all_scenarios() {
    let mut failed = 0;
    for name in SCENARIOS {
        if !run_scenario(name).await {
            failed += 1;
        }
    }
    if failed == 0 {
        println!("{}", "All scenarios passed".green().bold());
    } else {
        println!("{}", format!("{} scenario(s) failed", failed).red().bold());
        std::process::exit(1);
    }
}

async fn run_scenario(name: &str) -> bool {
    println!("{}", format!("Running scenario: {}", name).cyan());
    let result = match name {
        "drift" => scenario_drift().await,
        "seek" => scenario_seek().await,
        "autopause" => scenario_autopause().await,
        "gc" => scenario_gc().await,
        "close" => scenario_close().await,
        other => Err(format!("Unknown scenario: {}", other)),
    };
    match result {
        Ok(()) => {
            println!("{}", format!("  PASS {}", name).green());
            true
        }
        Err(reason) => {
            println!("{}", format!("  FAIL {}: {}", name, reason).red());
            false
        }
    }
}

fn check(condition: bool, reason: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

async fn scenario_drift() -> Result<(), String> {
    let max_drift = Config::from_env().sync.max_drift_secs;
    let mut record = RoomRecord::new("creator");
    record.apply(&PlaybackUpdate::playing(10.0), 1_000_000);

    let adjusted = estimate_position(&record, 1_002_500, max_drift);
    check(adjusted == 12.5, &format!("expected 12.5, got {}", adjusted))?;

    let stale = estimate_position(&record, 1_000_000 + 7_200_000, max_drift);
    check(stale == 10.0, "stale write must not be compensated")?;

    record.apply(&PlaybackUpdate::paused(10.0), 1_003_000);
    let paused = estimate_position(&record, 1_005_000, max_drift);
    check(paused == 10.0, "paused room must not drift")
}

struct TwoMemberRoom {
    store: MemoryChannel,
    room_id: String,
    ada: watchsync::RoomSession,
    ada_player: SimPlayer,
    bob: watchsync::RoomSession,
    bob_player: SimPlayer,
    bob_client: Arc<watchsync::store::memory::MemoryClient>,
}

async fn two_member_room() -> Result<TwoMemberRoom, String> {
    let config = Config::from_env().sync;
    let store = MemoryChannel::new();
    let ada_client = store.client("ada");
    let bob_client = store.client("bob");
    let ada_rooms = RoomLifecycle::new(ada_client, config.clone());
    let bob_rooms = RoomLifecycle::new(bob_client.clone(), config);

    let ada_id = SessionIdentity::new("m-ada", "Ada");
    let room_id = ada_rooms.create(&ada_id).await.map_err(err_string)?;

    let (ada_player, ada_events) = SimPlayer::new();
    let ada = ada_rooms
        .join(&room_id, ada_id, None, Arc::new(ada_player.clone()), ada_events)
        .await
        .map_err(err_string)?;

    let (bob_player, bob_events) = SimPlayer::new();
    let bob = bob_rooms
        .join(
            &room_id,
            SessionIdentity::new("m-bob", "Bob"),
            None,
            Arc::new(bob_player.clone()),
            bob_events,
        )
        .await
        .map_err(err_string)?;

    Ok(TwoMemberRoom {
        store,
        room_id,
        ada,
        ada_player,
        bob,
        bob_player,
        bob_client,
    })
}

async fn scenario_seek() -> Result<(), String> {
    let room = two_member_room().await?;
    room.ada.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    check(
        room.bob_player.loaded_media().map_err(err_string)?.as_deref() == Some("dQw4w9WgXcQ"),
        "Bob's player should load Ada's media",
    )?;

    room.ada_player.user_seek(120.0);
    sleep(Duration::from_millis(800)).await;

    let ada_time = room.ada_player.current_time().map_err(err_string)?;
    let bob_time = room.bob_player.current_time().map_err(err_string)?;
    check(
        (ada_time - bob_time).abs() < 2.0,
        &format!("players diverged: ada={:.2} bob={:.2}", ada_time, bob_time),
    )
}

async fn scenario_autopause() -> Result<(), String> {
    let room = two_member_room().await?;
    room.ada.load_media("dQw4w9WgXcQ");
    sleep(Duration::from_millis(300)).await;

    room.bob_client.simulate_drop().await;
    sleep(Duration::from_millis(400)).await;

    let probe = room.store.client("probe");
    let snap = probe
        .read_room(&room.room_id)
        .await
        .map_err(err_string)?
        .ok_or("room vanished")?;
    check(!snap.playback.is_playing, "room should be auto-paused")?;
    check(
        snap.playback.is_paused_by_disconnect,
        "pause should be flagged as disconnect-induced",
    )?;
    check(
        snap.playback.offline_member_name.as_deref() == Some("Bob"),
        "offline member should be named",
    )?;

    room.bob_client.simulate_reconnect();
    sleep(Duration::from_millis(400)).await;
    let snap = probe
        .read_room(&room.room_id)
        .await
        .map_err(err_string)?
        .ok_or("room vanished")?;
    check(snap.playback.is_playing, "room should auto-resume")?;
    check(
        !snap.playback.is_paused_by_disconnect,
        "disconnect flag should clear",
    )
}

async fn scenario_gc() -> Result<(), String> {
    let room = two_member_room().await?;
    let probe = room.store.client("probe");

    room.ada.leave().await.map_err(err_string)?;
    check(
        probe
            .read_room(&room.room_id)
            .await
            .map_err(err_string)?
            .is_some(),
        "room must persist while Bob remains",
    )?;

    room.bob.leave().await.map_err(err_string)?;
    check(
        probe
            .read_room(&room.room_id)
            .await
            .map_err(err_string)?
            .is_none(),
        "emptied room must be garbage collected",
    )
}

async fn scenario_close() -> Result<(), String> {
    let mut room = two_member_room().await?;
    let ada_rooms = RoomLifecycle::new(room.store.client("ada"), Config::from_env().sync);

    match ada_rooms.close(&room.room_id, "m-bob").await {
        Err(SyncError::InvalidState(_)) => {}
        other => return Err(format!("non-creator close should be rejected, got {:?}", other.err())),
    }

    ada_rooms
        .close(&room.room_id, "m-ada")
        .await
        .map_err(err_string)?;
    match room.bob.next_event().await {
        Some(SessionEvent::RoomEnded) => Ok(()),
        other => Err(format!("expected RoomEnded, got {:?}", other)),
    }
}

async fn demo() {
    println!("{}", "Starting two-member demo room".cyan().bold());
    let room = match two_member_room().await {
        Ok(room) => room,
        Err(reason) => {
            println!("{}", format!("setup failed: {}", reason).red());
            return;
        }
    };
    println!("Room code: {}", room.room_id.yellow().bold());

    room.ada.load_media("dQw4w9WgXcQ");
    for step in 0..5u32 {
        sleep(Duration::from_millis(500)).await;
        let ada = room.ada_player.current_time().unwrap_or(0.0);
        let bob = room.bob_player.current_time().unwrap_or(0.0);
        println!("t+{:>4}ms  ada={:6.2}s  bob={:6.2}s", (step + 1) * 500, ada, bob);
        if step == 2 {
            println!("{}", "Ada seeks to 90s".cyan());
            room.ada_player.user_seek(90.0);
        }
    }

    println!("{}", "Bob drops".cyan());
    room.bob_client.simulate_drop().await;
    sleep(Duration::from_millis(400)).await;
    if let Ok(Some(snap)) = room.store.client("probe").read_room(&room.room_id).await {
        println!(
            "Room paused: {} (offline: {:?})",
            (!snap.playback.is_playing).to_string().yellow(),
            snap.playback.offline_member_name
        );
    }

    println!("{}", "Bob reconnects".cyan());
    room.bob_client.simulate_reconnect();
    sleep(Duration::from_millis(400)).await;
    if let Ok(Some(snap)) = room.store.client("probe").read_room(&room.room_id).await {
        println!(
            "Room playing again: {}",
            snap.playback.is_playing.to_string().green()
        );
    }

    let _ = room.ada.leave().await;
    let _ = room.bob.leave().await;
    println!("{}", "Demo complete".green().bold());
}

fn err_string(error: impl std::fmt::Display) -> String {
    error.to_string()
}
