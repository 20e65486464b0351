//! Headless VestLink simulation.
//!
//! Runs the full coordinator against the debug loopback device and a
//! scripted in-process "server": a short game is announced, the roster is
//! filled, and synthetic hardware events are driven through the loopback
//! pipe via mock server events. Useful for exercising the stack without a
//! vest or a game server on the air.

use std::{net::SocketAddr, sync::Arc, thread, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;
use parking_lot::Mutex;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use vestlink_core::{
    FeedbackCue, FeedbackSink, GameConfig, GameService, LifecycleSignal, PairedDevices,
    ServerLink, UiMessage, UiSink,
};
use vestlink_proto::{
    messages::{EventMessage, EventToServer, GameStart, RosterSnapshot, ServerMessage},
    opcode::Opcode,
    player::Player,
    status::GameStatus,
};

/// VestLink simulation driver
#[derive(Parser, Debug)]
#[command(name = "vestlink-sim")]
#[command(about = "Drive the VestLink coordinator with scripted events", long_about = None)]
struct Args {
    /// This device's player id
    #[arg(long, default_value_t = 1)]
    player_id: u8,

    /// This device's team id
    #[arg(long, default_value_t = 0)]
    team_id: u8,

    /// Radio peer name of the vest
    #[arg(long, default_value = "LaserVest")]
    vest_peer: String,

    /// Paired radio peer, as name=host:port (repeatable). Without a pairing
    /// for the vest peer the radio transport keeps retrying, which is fine
    /// for a loopback-only run.
    #[arg(long = "pair")]
    pairs: Vec<String>,

    /// Scripted game length in seconds
    #[arg(long, default_value_t = 10)]
    game_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

fn parse_pair(spec: &str) -> anyhow::Result<(String, SocketAddr)> {
    let Some((name, addr)) = spec.split_once('=') else {
        bail!("expected name=host:port, got {spec:?}");
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("bad address in pairing {spec:?}"))?;
    Ok((name.to_string(), addr))
}

/// Scripted server: always online, records what the device reports.
#[derive(Default)]
struct ScriptedServer {
    reported: Mutex<Vec<EventToServer>>,
}

impl ServerLink for ScriptedServer {
    fn is_online(&self) -> bool {
        true
    }

    fn send_event(&self, event: EventToServer) {
        info!(
            opcode = event.opcode,
            value = event.value,
            health = event.health,
            "device -> server"
        );
        self.reported.lock().push(event);
    }
}

/// UI that narrates everything to the log.
struct ConsoleUi;

impl UiSink for ConsoleUi {
    fn game_message(&self, message: &UiMessage, player: &Player) {
        match message {
            UiMessage::Clock(clock) => info!(
                "clock {:02}:{:02} (health {}, magazine {})",
                clock.minutes, clock.seconds, player.health, player.bullets_in_magazine
            ),
            UiMessage::Snapshot(snapshot) => {
                let names: Vec<&str> = snapshot
                    .players
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect();
                info!(players = ?names, "roster update");
            }
            other => info!(message = ?other, health = player.health, "ui message"),
        }
    }

    fn status_changed(&self, status: GameStatus, team_play: bool) {
        info!(?status, team_play, "status changed");
    }
}

struct ConsoleFeedback;

impl FeedbackSink for ConsoleFeedback {
    fn play(&self, cue: FeedbackCue) {
        info!(?cue, "feedback");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut paired = PairedDevices::new();
    for spec in &args.pairs {
        let (name, addr) = parse_pair(spec)?;
        paired.insert(name, addr);
    }

    let config = GameConfig {
        player_id: args.player_id,
        team_id: args.team_id,
        vest_peer: args.vest_peer.clone(),
        paired,
        ..GameConfig::default()
    };

    let server = Arc::new(ScriptedServer::default());
    let mut service = GameService::start(
        config,
        Arc::clone(&server) as Arc<dyn ServerLink>,
        Arc::new(ConsoleUi),
        Arc::new(ConsoleFeedback),
    );
    let handle = service.handle();

    handle.submit_lifecycle_signal(LifecycleSignal::Activated);

    // Announce a game and fill the roster: this player plus one rival.
    handle.submit_server_event(ServerMessage::GameStart(GameStart {
        team_play: false,
        duration_minutes: 1,
    }));
    let mut me = Player::new(args.player_id, args.team_id, 100);
    me.name = "you".to_string();
    me.bullets_max = 120;
    me.assigned_respawn_point = Some(1);
    let mut rival = Player::new(args.player_id.wrapping_add(1), 1, 100);
    rival.name = "rival".to_string();
    rival.damage = 35;
    handle.submit_server_event(ServerMessage::Snapshot(RosterSnapshot {
        game_running: true,
        team_play: false,
        timer_seconds: args.game_seconds as u16,
        players: vec![me, rival],
    }));

    // Respawn at the assigned point, then play: the gun and vest are
    // simulated by raw frames pushed through the debug loopback.
    let script = vec![
        vec![Opcode::Respawn as u8, 1],
        vec![Opcode::GunShot as u8, 0],
        vec![Opcode::GunShot as u8, 0],
        vec![Opcode::GotHit as u8, args.player_id.wrapping_add(1)],
        vec![Opcode::GunReload as u8, 0],
        vec![Opcode::GunShot as u8, 0],
    ];
    for frame in script {
        handle.submit_server_event(ServerMessage::MockDeviceEvent(frame));
        thread::sleep(Duration::from_millis(400));
    }

    // Let the countdown tick for a bit, then call it.
    thread::sleep(Duration::from_secs(args.game_seconds.min(5)));
    handle.submit_server_event(ServerMessage::Event(EventMessage::new(Opcode::GameOver, 0)));
    thread::sleep(Duration::from_millis(300));

    let reported = server.reported.lock().len();
    info!(reported, "simulation finished, stopping service");
    service.stop();
    Ok(())
}
