use vestlink_proto::messages::EventToServer;

/// The network transport to the game server, consumed as a two-method
/// contract. Messages received from the server come back through
/// [`crate::event_loop::EventLoopHandle::submit_server_event`].
pub trait ServerLink: Send + Sync {
    /// Whether the server is currently reachable. Drives the derived status.
    fn is_online(&self) -> bool;

    /// Fire-and-forget; delivery guarantees are the transport's business.
    fn send_event(&self, event: EventToServer);
}
