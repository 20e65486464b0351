//! State reconciliation.
//!
//! [`GameSession`] is the event loop's consumer: it owns the player, the
//! roster, the game flags, and the countdown, and decides per event what to
//! mutate locally, what to forward to the server, and what to forward to the
//! UI. Every entry point finishes by recomputing the derived status; when
//! the status did not change, the current state is still re-pushed to the
//! vest so its local indicator stays consistent.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use vestlink_proto::{
    messages::{
        ClockMessage, EventMessage, EventToServer, PlayerStateMessage, RosterSnapshot,
        ServerMessage,
    },
    opcode::Opcode,
    player::Player,
    status::GameStatus,
};

use crate::{
    config::GameConfig,
    event_loop::{EventConsumer, LifecycleSignal},
    feedback::{FeedbackCue, FeedbackSink},
    link::{TransportHandle, loopback::LoopbackInjector},
    server::ServerLink,
    ui::{UiMessage, UiSink},
};

pub struct GameSession {
    config: GameConfig,
    player: Player,
    /// All known players' public stats, merged from server snapshots and
    /// kept in display order.
    roster: Vec<Player>,

    game_running: bool,
    team_play: bool,
    /// Seconds remaining in the current game; floors at zero.
    game_seconds: u16,
    /// Last derived status; `None` until the first evaluation.
    status: Option<GameStatus>,

    ui_active: bool,
    /// Depth-one retention while the UI is inactive.
    pending_snapshot: Option<UiMessage>,
    pending_event: Option<UiMessage>,

    vest: TransportHandle,
    debug: LoopbackInjector,
    server: Arc<dyn ServerLink>,
    ui: Arc<dyn UiSink>,
    feedback: Arc<dyn FeedbackSink>,
}

impl GameSession {
    pub fn new(
        config: GameConfig,
        vest: TransportHandle,
        debug: LoopbackInjector,
        server: Arc<dyn ServerLink>,
        ui: Arc<dyn UiSink>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let mut player = Player::new(config.player_id, config.team_id, config.max_health);
        player.bullets_max = config.max_bullets;
        Self {
            config,
            player,
            roster: Vec::new(),
            game_running: false,
            team_play: false,
            game_seconds: 0,
            status: None,
            ui_active: true,
            pending_snapshot: None,
            pending_event: None,
            vest,
            debug,
            server,
            ui,
            feedback,
        }
    }

    /// Recompute the derived status. On a change, store it and push it to
    /// both the UI and the vest; returns whether it changed.
    pub(crate) fn evaluate_status(&mut self) -> bool {
        let next = GameStatus::derive(
            self.server.is_online(),
            self.game_running,
            self.player.is_alive(),
        );
        if self.status == Some(next) {
            debug!(status = ?next, "status unchanged");
            return false;
        }
        self.status = Some(next);
        info!(status = ?next, "new game status");
        self.ui.status_changed(next, self.team_play);
        self.send_state_to_device();
        true
    }

    fn send_state_to_device(&self) {
        let Some(status) = self.status else {
            return;
        };
        self.vest.send_to_device(&PlayerStateMessage {
            player_id: self.player.id,
            team_id: self.player.team_id,
            status,
            bullets_in_magazine: self.player.bullets_in_magazine,
        });
    }

    /// Deliver a message to the UI, or retain it (depth one per category)
    /// while the UI is inactive. Snapshots always carry the full merged
    /// roster.
    fn send_to_ui(&mut self, message: UiMessage) {
        if self.ui_active {
            let message = match message {
                UiMessage::Snapshot(mut snapshot) => {
                    snapshot.players = self.roster.clone();
                    UiMessage::Snapshot(snapshot)
                }
                other => other,
            };
            self.ui.game_message(&message, &self.player);
        } else {
            match message {
                snapshot @ UiMessage::Snapshot(_) => self.pending_snapshot = Some(snapshot),
                event @ UiMessage::Event(_) => self.pending_event = Some(event),
                _ => {}
            }
        }
    }

    /// Apply a hit from the given attacker. Returns the opcode to forward,
    /// or `None` when the event must be suppressed entirely (unknown
    /// attacker, friendly fire).
    fn handle_got_hit(&mut self, attacker_id: u8) -> Option<u8> {
        // The shooter is assumed to have had bullets and a running game;
        // the server arbitrates conflicting reports.
        let Some(attacker) = self.roster.iter().find(|p| p.id == attacker_id) else {
            warn!(attacker = attacker_id, "hit by unknown player, ignoring");
            return None;
        };
        if self.team_play && attacker.team_id == self.player.team_id {
            debug!(attacker = attacker_id, "friendly fire, ignoring");
            return None;
        }
        let damage = attacker.damage;
        self.player.decrease_health(damage);
        if self.player.is_alive() {
            self.feedback.play(FeedbackCue::GotHit);
            Some(Opcode::GotHit as u8)
        } else {
            self.feedback.play(FeedbackCue::YouKilled);
            self.evaluate_status();
            Some(Opcode::YouKilled as u8)
        }
    }

    fn apply_server_event(&mut self, event: &EventMessage) {
        match event.opcode() {
            Some(Opcode::YouHitSomeone) => self.feedback.play(FeedbackCue::YouHitSomeone),
            Some(Opcode::GameOver) => {
                self.feedback.play(FeedbackCue::GameOver);
                self.game_running = false;
            }
            Some(Opcode::YouScored) => {
                self.player.score = self.player.score.saturating_add(1);
                self.feedback.play(FeedbackCue::YouScored);
            }
            Some(Opcode::GiveHealth) => {
                self.player
                    .increase_health(event.value, self.config.max_health);
                // Echo the pickup so the server sees the post-heal snapshot.
                self.server
                    .send_event(EventToServer::new(Opcode::GiveHealth as u8, &self.player, 0));
                self.feedback.play(FeedbackCue::GotHealth);
            }
            Some(Opcode::GiveAmmo) => {
                self.player.increase_bullets(u16::from(event.value));
                self.feedback.play(FeedbackCue::GotAmmo);
            }
            _ => {}
        }
    }

    fn apply_snapshot(&mut self, snapshot: &RosterSnapshot) {
        self.game_running = snapshot.game_running;
        self.team_play = snapshot.team_play;
        self.game_seconds = snapshot.timer_seconds;
        for update in &snapshot.players {
            match self.roster.iter_mut().find(|p| p.id == update.id) {
                Some(existing) => existing.merge_public_stats(update),
                None => self.roster.push(update.clone()),
            }
        }
        self.roster.sort_by(Player::display_order);
        if let Some(me) = self.roster.iter().find(|p| p.id == self.player.id) {
            let me = me.clone();
            self.player.merge_public_stats(&me);
        }
    }
}

impl EventConsumer for GameSession {
    fn on_device_event(&mut self, message: EventMessage) {
        let value = message.value;
        let mut opcode = message.opcode;
        let mut to_server = true;
        let mut to_ui = true;

        match message.opcode() {
            Some(Opcode::DeviceConnected) => {
                // Not an app event; the device just needs its state.
                to_server = false;
                to_ui = false;
                self.send_state_to_device();
            }
            Some(Opcode::DeviceDisconnected) => {}
            Some(Opcode::GunShot) => {
                to_server = false;
                if self.player.bullets_in_magazine > 0
                    && self.player.is_alive()
                    && self.game_running
                {
                    self.feedback.play(FeedbackCue::GunShot);
                    self.player.decrease_bullets();
                } else {
                    self.feedback.play(FeedbackCue::NoBullets);
                    opcode = Opcode::GunNoBullets as u8;
                }
            }
            Some(Opcode::GunReload) => {
                to_server = false;
                self.feedback.play(FeedbackCue::Reload);
                self.player.reload(self.config.magazine_size);
            }
            Some(Opcode::GotHit) => {
                if self.player.is_alive() {
                    match self.handle_got_hit(value) {
                        Some(remapped) => opcode = remapped,
                        // Unknown attacker or friendly fire: as if the event
                        // never arrived.
                        None => return,
                    }
                } else {
                    to_server = false;
                    to_ui = false;
                }
            }
            Some(Opcode::GotHealth) => {
                to_ui = false;
                if self.player.health >= self.config.max_health || !self.player.is_alive() {
                    to_server = false;
                }
            }
            Some(Opcode::GotAmmo) => {
                to_ui = false;
                if self.player.bullets_total >= self.player.bullets_max
                    || !self.player.is_alive()
                {
                    to_server = false;
                }
            }
            Some(Opcode::Respawn) => {
                if self.player.assigned_respawn_point == Some(value) {
                    self.feedback.play(FeedbackCue::Respawn);
                    self.game_running = true;
                    self.player
                        .respawn(self.config.max_health, self.config.magazine_size);
                    self.evaluate_status();
                } else {
                    to_server = false;
                    opcode = Opcode::RespawnPointWrong as u8;
                }
            }
            // Unknown but well-formed: no local effect, default forwarding.
            _ => {}
        }

        if to_server {
            self.server
                .send_event(EventToServer::new(opcode, &self.player, value));
        }
        if to_ui {
            self.send_to_ui(UiMessage::Event(EventMessage { opcode, value }));
        }
        if !self.evaluate_status() {
            self.send_state_to_device();
        }
    }

    fn on_server_event(&mut self, message: ServerMessage) {
        let forward = match message {
            ServerMessage::Heartbeat => None,
            ServerMessage::MockDeviceEvent(bytes) => {
                if let Err(e) = self.debug.inject_bytes(&bytes) {
                    error!(error = %e, "failed to write to loopback pipe");
                }
                Some(UiMessage::MockDeviceEvent(bytes))
            }
            ServerMessage::Event(event) => {
                self.apply_server_event(&event);
                Some(UiMessage::Event(event))
            }
            ServerMessage::GameStart(start) => {
                // Health stays at zero until the server fills it back in.
                self.player.health = 0;
                self.feedback.play(FeedbackCue::GameStart);
                self.team_play = start.team_play;
                self.game_seconds = u16::from(start.duration_minutes) * 60;
                Some(UiMessage::GameStart(start))
            }
            ServerMessage::Snapshot(snapshot) => {
                self.apply_snapshot(&snapshot);
                Some(UiMessage::Snapshot(snapshot))
            }
        };

        if let Some(message) = forward {
            self.send_to_ui(message);
        }
        if !self.evaluate_status() {
            self.send_state_to_device();
        }
    }

    fn on_timer_tick(&mut self) {
        if !self.game_running {
            return;
        }
        self.game_seconds = self.game_seconds.saturating_sub(1);
        let clock = ClockMessage {
            minutes: (self.game_seconds / 60) as u8,
            seconds: (self.game_seconds % 60) as u8,
        };
        self.send_to_ui(UiMessage::Clock(clock));
    }

    fn on_lifecycle(&mut self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Deactivated => self.ui_active = false,
            LifecycleSignal::Activated => {
                self.ui_active = true;
                if let Some(status) = self.status {
                    self.ui.status_changed(status, self.team_play);
                }
                if let Some(snapshot) = self.pending_snapshot.take() {
                    self.send_to_ui(snapshot);
                }
                if let Some(event) = self.pending_event.take() {
                    self.send_to_ui(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use parking_lot::Mutex;
    use vestlink_proto::{
        messages::{
            ClockMessage, EventMessage, EventToServer, GameStart, RosterSnapshot, ServerMessage,
        },
        opcode::Opcode,
        player::Player,
        status::GameStatus,
        wire::STOP_BYTE,
    };

    use super::GameSession;
    use crate::{
        config::GameConfig,
        event_loop::{EventConsumer, LifecycleSignal},
        feedback::{FeedbackCue, FeedbackSink},
        link::{DeviceLink, loopback::LoopbackLink, testing::capture_handle},
        server::ServerLink,
        ui::{UiMessage, UiSink},
    };

    #[derive(Default)]
    struct RecordingServer {
        offline: AtomicBool,
        events: Mutex<Vec<EventToServer>>,
    }

    impl ServerLink for RecordingServer {
        fn is_online(&self) -> bool {
            !self.offline.load(Ordering::Acquire)
        }

        fn send_event(&self, event: EventToServer) {
            self.events.lock().push(event);
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        messages: Mutex<Vec<(UiMessage, Player)>>,
        statuses: Mutex<Vec<(GameStatus, bool)>>,
    }

    impl UiSink for RecordingUi {
        fn game_message(&self, message: &UiMessage, player: &Player) {
            self.messages.lock().push((message.clone(), player.clone()));
        }

        fn status_changed(&self, status: GameStatus, team_play: bool) {
            self.statuses.lock().push((status, team_play));
        }
    }

    #[derive(Default)]
    struct RecordingFeedback {
        cues: Mutex<Vec<FeedbackCue>>,
    }

    impl FeedbackSink for RecordingFeedback {
        fn play(&self, cue: FeedbackCue) {
            self.cues.lock().push(cue);
        }
    }

    struct Fixture {
        session: GameSession,
        server: Arc<RecordingServer>,
        ui: Arc<RecordingUi>,
        feedback: Arc<RecordingFeedback>,
        vest_bytes: Arc<Mutex<Vec<u8>>>,
        debug_link: LoopbackLink,
    }

    fn fixture() -> Fixture {
        let config = GameConfig {
            player_id: 1,
            team_id: 0,
            max_health: 100,
            magazine_size: 12,
            max_bullets: 120,
            ..GameConfig::default()
        };
        let (vest, vest_bytes) = capture_handle();
        let (debug_link, injector) = LoopbackLink::new();
        let server = Arc::new(RecordingServer::default());
        let ui = Arc::new(RecordingUi::default());
        let feedback = Arc::new(RecordingFeedback::default());
        let session = GameSession::new(
            config,
            vest,
            injector,
            Arc::clone(&server) as Arc<dyn ServerLink>,
            Arc::clone(&ui) as Arc<dyn UiSink>,
            Arc::clone(&feedback) as Arc<dyn FeedbackSink>,
        );
        Fixture {
            session,
            server,
            ui,
            feedback,
            vest_bytes,
            debug_link,
        }
    }

    impl Fixture {
        /// Snapshot with this player ready to fight: full health, loaded
        /// magazine, a rival with known damage.
        fn start_running_game(&mut self) {
            let mut me = Player::new(1, 0, 100);
            me.bullets_max = 120;
            me.assigned_respawn_point = Some(7);
            let mut rival = Player::new(2, 1, 100);
            rival.damage = 40;
            rival.name = "rival".to_string();
            self.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
                game_running: true,
                team_play: false,
                timer_seconds: 300,
                players: vec![me, rival],
            }));
            self.session.player.bullets_in_magazine = 12;
            self.session.player.bullets_total = 60;
            self.ui.messages.lock().clear();
            self.ui.statuses.lock().clear();
            self.server.events.lock().clear();
            self.feedback.cues.lock().clear();
            self.vest_bytes.lock().clear();
        }

        fn ui_events(&self) -> Vec<EventMessage> {
            self.ui
                .messages
                .lock()
                .iter()
                .filter_map(|(message, _)| match message {
                    UiMessage::Event(event) => Some(*event),
                    _ => None,
                })
                .collect()
        }

        fn vest_frames(&self) -> Vec<Vec<u8>> {
            let bytes = self.vest_bytes.lock();
            bytes
                .split(|&b| b == STOP_BYTE)
                .filter(|frame| !frame.is_empty())
                .map(<[u8]>::to_vec)
                .collect()
        }
    }

    #[test]
    fn gun_shot_consumes_a_round_and_stays_local() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session
            .on_device_event(EventMessage::new(Opcode::GunShot, 0));

        assert_eq!(fx.session.player.bullets_in_magazine, 11);
        assert!(fx.server.events.lock().is_empty());
        assert_eq!(fx.ui_events(), vec![EventMessage::new(Opcode::GunShot, 0)]);
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::GunShot]);
    }

    #[test]
    fn empty_magazine_remaps_to_no_bullets() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.bullets_in_magazine = 0;

        fx.session
            .on_device_event(EventMessage::new(Opcode::GunShot, 0));

        assert!(fx.server.events.lock().is_empty());
        assert_eq!(
            fx.ui_events(),
            vec![EventMessage::new(Opcode::GunNoBullets, 0)]
        );
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::NoBullets]);
    }

    #[test]
    fn gun_shot_outside_a_running_game_remaps_too() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.game_running = false;

        fx.session
            .on_device_event(EventMessage::new(Opcode::GunShot, 0));

        assert_eq!(fx.session.player.bullets_in_magazine, 12);
        assert_eq!(
            fx.ui_events(),
            vec![EventMessage::new(Opcode::GunNoBullets, 0)]
        );
    }

    #[test]
    fn reload_refills_from_reserve() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.bullets_in_magazine = 2;

        fx.session
            .on_device_event(EventMessage::new(Opcode::GunReload, 0));

        assert_eq!(fx.session.player.bullets_in_magazine, 12);
        assert_eq!(fx.session.player.bullets_total, 50);
        assert!(fx.server.events.lock().is_empty());
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::Reload]);
    }

    #[test]
    fn got_hit_applies_attacker_damage_and_forwards() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHit, 2));

        assert_eq!(fx.session.player.health, 60);
        let sent = fx.server.events.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].opcode, Opcode::GotHit as u8);
        assert_eq!(sent[0].health, 60);
        drop(sent);
        assert_eq!(fx.ui_events(), vec![EventMessage::new(Opcode::GotHit, 2)]);
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::GotHit]);
    }

    #[test]
    fn lethal_hit_remaps_to_killed_and_changes_status() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.health = 30;

        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHit, 2));

        assert_eq!(fx.session.player.health, 0);
        assert_eq!(fx.session.status, Some(GameStatus::Dead));
        assert_eq!(fx.ui_events(), vec![EventMessage::new(Opcode::YouKilled, 2)]);
        assert_eq!(
            fx.server.events.lock()[0].opcode,
            Opcode::YouKilled as u8
        );
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::YouKilled]);
        assert!(fx.ui.statuses.lock().contains(&(GameStatus::Dead, false)));
    }

    #[test]
    fn dead_player_hits_are_suppressed_entirely() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.health = 0;
        fx.session.evaluate_status();
        fx.ui.statuses.lock().clear();

        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHit, 2));

        assert!(fx.server.events.lock().is_empty());
        assert!(fx.ui_events().is_empty());
        assert!(fx.feedback.cues.lock().is_empty());
    }

    #[test]
    fn unknown_attacker_and_friendly_fire_are_ignored() {
        let mut fx = fixture();
        fx.start_running_game();

        // Unknown id.
        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHit, 77));
        assert_eq!(fx.session.player.health, 100);

        // Same team with team play on.
        fx.session.team_play = true;
        if let Some(rival) = fx.session.roster.iter_mut().find(|p| p.id == 2) {
            rival.team_id = 0;
        }
        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHit, 2));

        assert_eq!(fx.session.player.health, 100);
        assert!(fx.server.events.lock().is_empty());
        assert!(fx.ui_events().is_empty());
    }

    #[test]
    fn got_health_forwarding_depends_on_need() {
        let mut fx = fixture();
        fx.start_running_game();

        // Full health: nothing to claim.
        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHealth, 0));
        assert!(fx.server.events.lock().is_empty());

        // Wounded: claim it; still never surfaces in the UI.
        fx.session.player.health = 50;
        fx.session
            .on_device_event(EventMessage::new(Opcode::GotHealth, 0));
        assert_eq!(fx.server.events.lock().len(), 1);
        assert!(fx.ui_events().is_empty());
    }

    #[test]
    fn got_ammo_forwarding_depends_on_reserve_space() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.bullets_total = 120;

        fx.session
            .on_device_event(EventMessage::new(Opcode::GotAmmo, 0));
        assert!(fx.server.events.lock().is_empty());

        fx.session.player.bullets_total = 10;
        fx.session
            .on_device_event(EventMessage::new(Opcode::GotAmmo, 0));
        assert_eq!(fx.server.events.lock().len(), 1);
        assert!(fx.ui_events().is_empty());
    }

    #[test]
    fn matching_respawn_restores_and_resumes() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.health = 0;
        fx.session.game_running = false;
        fx.session.evaluate_status();
        fx.ui.statuses.lock().clear();

        fx.session
            .on_device_event(EventMessage::new(Opcode::Respawn, 7));

        assert!(fx.session.game_running);
        assert_eq!(fx.session.player.health, 100);
        assert_eq!(fx.session.player.bullets_in_magazine, 12);
        assert_eq!(fx.session.player.assigned_respawn_point, None);
        assert_eq!(fx.server.events.lock().len(), 1);
        assert!(
            fx.ui
                .statuses
                .lock()
                .contains(&(GameStatus::Running, false))
        );
    }

    #[test]
    fn wrong_respawn_point_goes_to_ui_only() {
        let mut fx = fixture();
        fx.start_running_game();
        let health_before = fx.session.player.health;

        fx.session
            .on_device_event(EventMessage::new(Opcode::Respawn, 9));

        assert_eq!(fx.session.player.health, health_before);
        assert!(fx.server.events.lock().is_empty());
        assert_eq!(
            fx.ui_events(),
            vec![EventMessage::new(Opcode::RespawnPointWrong, 9)]
        );
    }

    #[test]
    fn respawn_point_is_consumed_by_use() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session
            .on_device_event(EventMessage::new(Opcode::Respawn, 7));
        fx.ui.messages.lock().clear();
        fx.session
            .on_device_event(EventMessage::new(Opcode::Respawn, 7));

        assert_eq!(
            fx.ui_events(),
            vec![EventMessage::new(Opcode::RespawnPointWrong, 7)]
        );
    }

    #[test]
    fn unknown_opcode_takes_the_default_forwarding_path() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session.on_device_event(EventMessage {
            opcode: 200,
            value: 3,
        });

        let sent = fx.server.events.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].opcode, 200);
        drop(sent);
        assert_eq!(
            fx.ui_events(),
            vec![EventMessage {
                opcode: 200,
                value: 3
            }]
        );
    }

    #[test]
    fn device_connected_pushes_state_without_forwarding() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.evaluate_status();
        fx.vest_bytes.lock().clear();

        fx.session
            .on_device_event(EventMessage::new(Opcode::DeviceConnected, 2));

        assert!(fx.server.events.lock().is_empty());
        assert!(fx.ui_events().is_empty());
        let frames = fx.vest_frames();
        assert!(!frames.is_empty());
        assert_eq!(frames[0][0], Opcode::PlayerState as u8);
    }

    #[test]
    fn unchanged_status_still_repushes_state_to_device() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.evaluate_status();
        fx.vest_bytes.lock().clear();

        // Reload does not change the derived status.
        fx.session
            .on_device_event(EventMessage::new(Opcode::GunReload, 0));

        let frames = fx.vest_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], Opcode::PlayerState as u8);
    }

    #[test]
    fn server_game_start_zeroes_health_and_arms_the_clock() {
        let mut fx = fixture();

        fx.session.on_server_event(ServerMessage::GameStart(GameStart {
            team_play: true,
            duration_minutes: 5,
        }));

        assert_eq!(fx.session.player.health, 0);
        assert!(fx.session.team_play);
        assert_eq!(fx.session.game_seconds, 300);
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::GameStart]);
        assert!(matches!(
            fx.ui.messages.lock()[0].0,
            UiMessage::GameStart(_)
        ));
    }

    #[test]
    fn give_health_caps_and_echoes_to_server() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.health = 90;

        fx.session.on_server_event(ServerMessage::Event(EventMessage::new(
            Opcode::GiveHealth,
            30,
        )));

        assert_eq!(fx.session.player.health, 100);
        let sent = fx.server.events.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].opcode, Opcode::GiveHealth as u8);
        assert_eq!(sent[0].player_id, 1);
        assert_eq!(sent[0].health, 100);
    }

    #[test]
    fn give_ammo_caps_at_reserve_maximum() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.player.bullets_total = 110;

        fx.session.on_server_event(ServerMessage::Event(EventMessage::new(
            Opcode::GiveAmmo,
            50,
        )));

        assert_eq!(fx.session.player.bullets_total, 120);
        assert_eq!(*fx.feedback.cues.lock(), vec![FeedbackCue::GotAmmo]);
    }

    #[test]
    fn game_over_stops_the_game() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session.on_server_event(ServerMessage::Event(EventMessage::new(
            Opcode::GameOver,
            0,
        )));

        assert!(!fx.session.game_running);
        assert_eq!(fx.session.status, Some(GameStatus::Idle));
    }

    #[test]
    fn you_scored_increments_the_counter() {
        let mut fx = fixture();
        fx.start_running_game();

        fx.session.on_server_event(ServerMessage::Event(EventMessage::new(
            Opcode::YouScored,
            0,
        )));

        assert_eq!(fx.session.player.score, 1);
    }

    #[test]
    fn snapshot_merge_is_idempotent_and_grows_by_new_ids() {
        let mut fx = fixture();
        let mut rival = Player::new(2, 1, 80);
        rival.score = 4;
        let snapshot = RosterSnapshot {
            game_running: true,
            team_play: false,
            timer_seconds: 120,
            players: vec![rival],
        };

        fx.session
            .on_server_event(ServerMessage::Snapshot(snapshot.clone()));
        let after_once = fx.session.roster.clone();
        fx.session
            .on_server_event(ServerMessage::Snapshot(snapshot.clone()));
        assert_eq!(fx.session.roster, after_once);
        assert_eq!(fx.session.roster.len(), 1);

        let mut snapshot = snapshot;
        snapshot.players.push(Player::new(3, 0, 100));
        fx.session.on_server_event(ServerMessage::Snapshot(snapshot));
        assert_eq!(fx.session.roster.len(), 2);
    }

    #[test]
    fn snapshot_copies_own_entry_onto_local_player() {
        let mut fx = fixture();
        let mut me = Player::new(1, 2, 75);
        me.score = 6;
        me.assigned_respawn_point = Some(3);

        fx.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
            game_running: true,
            team_play: true,
            timer_seconds: 60,
            players: vec![me],
        }));

        assert_eq!(fx.session.player.health, 75);
        assert_eq!(fx.session.player.score, 6);
        assert_eq!(fx.session.player.team_id, 2);
        assert_eq!(fx.session.player.assigned_respawn_point, Some(3));
        assert_eq!(fx.session.game_seconds, 60);
        assert!(fx.session.team_play);
    }

    #[test]
    fn roster_is_sorted_by_display_order() {
        let mut fx = fixture();
        let mut low = Player::new(5, 0, 100);
        low.score = 1;
        let mut high = Player::new(9, 0, 100);
        high.score = 8;

        fx.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
            game_running: false,
            team_play: false,
            timer_seconds: 0,
            players: vec![low, high],
        }));

        let ids: Vec<u8> = fx.session.roster.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![9, 5]);
    }

    #[test]
    fn mock_event_is_reinjected_into_the_loopback() {
        let mut fx = fixture();
        let streams = fx.debug_link.connect().expect("pipe");

        fx.session.on_server_event(ServerMessage::MockDeviceEvent(vec![
            Opcode::GunShot as u8,
            0,
        ]));

        let mut reader = streams.reader;
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).expect("injected frame");
        assert_eq!(buf, [Opcode::GunShot as u8, 0, STOP_BYTE]);
    }

    #[test]
    fn timer_tick_is_a_noop_while_idle() {
        let mut fx = fixture();
        fx.session.game_seconds = 10;

        fx.session.on_timer_tick();

        assert_eq!(fx.session.game_seconds, 10);
        assert!(fx.ui.messages.lock().is_empty());
    }

    #[test]
    fn countdown_floors_at_zero() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.game_seconds = 1;

        fx.session.on_timer_tick();
        fx.session.on_timer_tick();

        assert_eq!(fx.session.game_seconds, 0);
        let clocks: Vec<ClockMessage> = fx
            .ui
            .messages
            .lock()
            .iter()
            .filter_map(|(message, _)| match message {
                UiMessage::Clock(clock) => Some(*clock),
                _ => None,
            })
            .collect();
        assert_eq!(
            clocks,
            vec![
                ClockMessage {
                    minutes: 0,
                    seconds: 0
                };
                2
            ]
        );
    }

    #[test]
    fn inactive_ui_retains_latest_snapshot_and_event_only() {
        let mut fx = fixture();
        fx.start_running_game();
        fx.session.on_lifecycle(LifecycleSignal::Deactivated);
        fx.ui.messages.lock().clear();
        fx.ui.statuses.lock().clear();

        fx.session
            .on_device_event(EventMessage::new(Opcode::GunShot, 0));
        fx.session
            .on_device_event(EventMessage::new(Opcode::GunShot, 1));
        fx.session.on_timer_tick();
        fx.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
            game_running: true,
            team_play: false,
            timer_seconds: 30,
            players: Vec::new(),
        }));

        // Nothing delivered while inactive.
        assert!(fx.ui.messages.lock().is_empty());

        fx.session.on_lifecycle(LifecycleSignal::Activated);

        let messages = fx.ui.messages.lock();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0].0, UiMessage::Snapshot(_)));
        // Only the most recent event survived; the clock tick was never
        // retained.
        assert_eq!(
            messages[1].0,
            UiMessage::Event(EventMessage::new(Opcode::GunShot, 1))
        );
        drop(messages);
        assert_eq!(fx.ui.statuses.lock().len(), 1);
    }

    #[test]
    fn status_reflects_server_reachability() {
        let mut fx = fixture();
        fx.server.offline.store(true, Ordering::Release);

        fx.session.evaluate_status();
        assert_eq!(fx.session.status, Some(GameStatus::Offline));

        fx.server.offline.store(false, Ordering::Release);
        fx.session.evaluate_status();
        assert_eq!(fx.session.status, Some(GameStatus::Idle));
    }

    #[test]
    fn ui_snapshot_carries_the_merged_roster() {
        let mut fx = fixture();
        let mut rival = Player::new(2, 1, 90);
        rival.name = "rival".to_string();
        fx.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
            game_running: false,
            team_play: false,
            timer_seconds: 0,
            players: vec![rival],
        }));

        // A later sparse snapshot still shows the full roster to the UI.
        fx.ui.messages.lock().clear();
        fx.session.on_server_event(ServerMessage::Snapshot(RosterSnapshot {
            game_running: false,
            team_play: false,
            timer_seconds: 0,
            players: Vec::new(),
        }));

        let messages = fx.ui.messages.lock();
        let UiMessage::Snapshot(snapshot) = &messages[0].0 else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].name, "rival");
    }
}
