//! VestLink core.
//!
//! Coordinates a wearable combat-simulation vest, its paired gun, and a
//! debug loopback device with a remote game server. All state mutation is
//! funneled through one serialized consumer context, so handlers never need
//! locks.
//!
//! # Architecture
//!
//! - [`event_loop`]: single-consumer event serialization over an unbounded
//!   queue, plus the 1 Hz countdown producer
//! - [`link`]: framed device transports; one generic reconnect/framing
//!   driver over the radio and loopback links
//! - [`session`]: state reconciliation; owns the player, roster, and game
//!   flags
//! - [`service`]: wiring of loop, transports, and session
//! - [`server`], [`ui`], [`feedback`]: boundary traits toward the external
//!   collaborators

pub mod config;
pub mod event_loop;
pub mod feedback;
pub mod link;
pub mod server;
pub mod service;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use config::GameConfig;
pub use event_loop::{EventConsumer, EventLoop, EventLoopHandle, LifecycleSignal};
pub use feedback::{FeedbackCue, FeedbackSink};
pub use link::loopback::{LoopbackInjector, LoopbackLink};
pub use link::radio::{PairedDevices, RadioLink};
pub use link::{DeviceLink, FramedTransport, LinkStreams, TransportHandle, WirelessHandler};
pub use server::ServerLink;
pub use service::GameService;
pub use session::GameSession;
pub use ui::{UiMessage, UiSink};
