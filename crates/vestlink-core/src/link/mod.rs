//! Framed device transports.
//!
//! One generic driver owns the connect/reconnect loop, the sentinel framing,
//! and the heartbeat reply; concrete links only know how to open and close
//! their byte streams. The radio link talks to the vest over a socket-backed
//! stream pair, the loopback link feeds synthetic input through an
//! in-process pipe.

use std::{
    fmt, io,
    io::{Read, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use vestlink_proto::{
    messages::{DeviceKind, EventMessage, Heartbeat},
    opcode::Opcode,
    wire::{self, DeviceWire},
};

pub mod loopback;
pub mod radio;

/// Callback a transport delivers parsed device events into.
///
/// Synthesized connect/disconnect events take the same path as hardware
/// frames, so the consumer observes one ordered stream per transport.
pub trait WirelessHandler: Send + Sync + 'static {
    fn handle_wireless_event(&self, message: EventMessage);
}

/// The byte streams of one live connection.
pub struct LinkStreams {
    pub reader: Box<dyn Read + Send>,
    /// `None` for links with no physical outbound path (loopback).
    pub writer: Option<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for LinkStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStreams")
            .field("writer", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

/// One connect/read/write/reconnect-capable byte-stream endpoint.
pub trait DeviceLink: Send + 'static {
    /// Peer name, for logs.
    fn label(&self) -> &str;

    /// Open a stream pair. Blocking; a failure is retried by the driver on
    /// its next loop iteration.
    fn connect(&mut self) -> io::Result<LinkStreams>;

    /// Tear down the current connection. Must unblock a pending read.
    fn close(&mut self);
}

struct TransportShared {
    kind: DeviceKind,
    label: String,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    running: AtomicBool,
}

impl TransportShared {
    /// One blocking write of the framed wire form, from the caller's
    /// context. Failures are logged and the frame is dropped; there is no
    /// retry or queueing.
    fn send<M: DeviceWire + fmt::Debug>(&self, message: &M) {
        let frame = match wire::encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(device = %self.label, error = %e, "refusing to send unframeable message");
                return;
            }
        };
        let mut writer = self.writer.lock();
        let Some(writer) = writer.as_mut() else {
            debug!(device = %self.label, "not connected, dropping outbound message");
            return;
        };
        if let Err(e) = writer.write_all(&frame).and_then(|()| writer.flush()) {
            warn!(device = %self.label, error = %e, "failed to send message to device");
        } else if message.opcode_byte() == Opcode::Ping as u8 {
            trace!(device = %self.label, "heartbeat reply sent");
        } else {
            info!(device = %self.label, ?message, "sent to device");
        }
    }
}

/// Outbound half of a transport, shared with the consumer context.
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<TransportShared>,
}

impl TransportHandle {
    pub fn send_to_device<M: DeviceWire + fmt::Debug>(&self, message: &M) {
        self.shared.send(message);
    }
}

/// A running transport: the reconnect/framing driver on its own thread plus
/// the shared outbound writer slot.
pub struct FramedTransport {
    shared: Arc<TransportShared>,
    link: Arc<Mutex<Box<dyn DeviceLink>>>,
}

impl FramedTransport {
    pub fn spawn(
        link: impl DeviceLink,
        kind: DeviceKind,
        handler: impl WirelessHandler,
    ) -> Self {
        let shared = Arc::new(TransportShared {
            kind,
            label: link.label().to_string(),
            writer: Mutex::new(None),
            running: AtomicBool::new(true),
        });
        let link: Arc<Mutex<Box<dyn DeviceLink>>> = Arc::new(Mutex::new(Box::new(link)));
        {
            let shared = Arc::clone(&shared);
            let link = Arc::clone(&link);
            thread::spawn(move || run_driver(&shared, &link, &handler));
        }
        Self { shared, link }
    }

    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Mark the transport stopped and close the live connection so a blocked
    /// read unblocks through the disconnect path. A driver stuck inside a
    /// connect attempt observes the cleared running flag once the attempt
    /// returns and tears down on its own.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(mut link) = self.link.try_lock() {
            link.close();
        }
        *self.shared.writer.lock() = None;
    }
}

fn run_driver(
    shared: &Arc<TransportShared>,
    link: &Arc<Mutex<Box<dyn DeviceLink>>>,
    handler: &impl WirelessHandler,
) {
    while shared.running.load(Ordering::Acquire) {
        let streams = {
            let mut link = link.lock();
            match link.connect() {
                Ok(streams) => Some(streams),
                Err(e) => {
                    debug!(device = %shared.label, error = %e, "connect attempt failed");
                    None
                }
            }
        };
        if let Some(streams) = streams {
            if !shared.running.load(Ordering::Acquire) {
                link.lock().close();
                break;
            }
            info!(device = %shared.label, "connected");
            *shared.writer.lock() = streams.writer;
            handler.handle_wireless_event(EventMessage::new(
                Opcode::DeviceConnected,
                shared.kind as u8,
            ));

            let error = read_frames(shared, streams.reader, handler);
            warn!(device = %shared.label, error = %error, "connection lost");
            handler.handle_wireless_event(EventMessage::new(
                Opcode::DeviceDisconnected,
                shared.kind as u8,
            ));
            *shared.writer.lock() = None;
            link.lock().close();
        }
        thread::yield_now();
    }
    debug!(device = %shared.label, "transport stopped");
}

/// Blocking frame loop. Returns the error that terminated the connection;
/// EOF counts as a lost connection.
fn read_frames(
    shared: &TransportShared,
    reader: Box<dyn Read + Send>,
    handler: &impl WirelessHandler,
) -> io::Error {
    debug!(device = %shared.label, "listening");
    let mut frame = Vec::with_capacity(16);
    let mut bytes = io::BufReader::new(reader).bytes();
    loop {
        frame.clear();
        loop {
            match bytes.next() {
                Some(Ok(wire::STOP_BYTE)) => break,
                Some(Ok(byte)) => frame.push(byte),
                Some(Err(e)) => return e,
                None => return io::ErrorKind::UnexpectedEof.into(),
            }
        }
        if frame.is_empty() {
            continue;
        }
        match wire::parse_device_frame(&frame) {
            Err(e) => {
                warn!(device = %shared.label, frame = ?frame, error = %e, "discarding malformed frame");
            }
            Ok(message) if message.opcode == Opcode::Ping as u8 => {
                // Pure keepalive: answer in-kind, never surface it.
                trace!(device = %shared.label, "ping");
                shared.send(&Heartbeat);
            }
            Ok(message) => {
                debug!(device = %shared.label, ?message, "handling device frame");
                handler.handle_wireless_event(message);
            }
        }
    }
}
