use vestlink_proto::{
    messages::{ClockMessage, EventMessage, GameStart, RosterSnapshot},
    player::Player,
    status::GameStatus,
};

/// Everything that crosses the UI boundary, always accompanied by the
/// current player snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    Event(EventMessage),
    GameStart(GameStart),
    /// Carries the full merged roster, not just the raw snapshot contents.
    Snapshot(RosterSnapshot),
    MockDeviceEvent(Vec<u8>),
    Clock(ClockMessage),
}

/// One-way notifier into the UI layer. The concrete delivery mechanism (OS
/// broadcast, local channel, push) is an external collaborator.
pub trait UiSink: Send + Sync {
    fn game_message(&self, message: &UiMessage, player: &Player);

    fn status_changed(&self, status: GameStatus, team_play: bool);
}
