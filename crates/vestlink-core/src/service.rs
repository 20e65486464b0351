//! Wiring of the event loop, the transports, and the session.

use std::sync::Arc;

use tracing::info;
use vestlink_proto::messages::DeviceKind;

use crate::{
    config::GameConfig,
    event_loop::{EventLoop, EventLoopHandle},
    feedback::FeedbackSink,
    link::{FramedTransport, loopback::LoopbackLink, radio::RadioLink},
    server::ServerLink,
    session::GameSession,
    ui::UiSink,
};

/// The assembled coordinator: vest radio transport, debug loopback
/// transport, and the serialized session behind one event loop.
pub struct GameService {
    event_loop: EventLoop<GameSession>,
    vest: FramedTransport,
    debug: FramedTransport,
    stopped: bool,
}

impl GameService {
    /// Build and start everything. The returned handle accepts events from
    /// the embedding layer (server transport callback, lifecycle bridge).
    pub fn start(
        config: GameConfig,
        server: Arc<dyn ServerLink>,
        ui: Arc<dyn UiSink>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();

        let radio = RadioLink::new(config.vest_peer.clone(), config.paired.clone());
        let vest = FramedTransport::spawn(radio, DeviceKind::Vest, handle.clone());

        let (loopback, injector) = LoopbackLink::new();
        let debug = FramedTransport::spawn(loopback, DeviceKind::Debug, handle.clone());

        let session = GameSession::new(config, vest.handle(), injector, server, ui, feedback);
        event_loop.start(session);

        // First status evaluation happens on the loop, like everything else.
        handle.run_on_loop(|session| {
            session.evaluate_status();
        });

        info!("game service started");
        Self {
            event_loop,
            vest,
            debug,
            stopped: false,
        }
    }

    pub fn handle(&self) -> EventLoopHandle<GameSession> {
        self.event_loop.handle()
    }

    /// Immediate, non-graceful shutdown: transports first so their readers
    /// unblock, then the loop; events still queued are discarded.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.vest.stop();
        self.debug.stop();
        self.event_loop.stop();
        info!("game service stopped");
    }
}

impl Drop for GameService {
    fn drop(&mut self) {
        self.stop();
    }
}
