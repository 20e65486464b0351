//! In-process loopback device for synthetic and debug input.

use std::io::{self, PipeWriter, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use vestlink_proto::wire::STOP_BYTE;

use super::{DeviceLink, LinkStreams};

/// Debug device backed by an OS pipe. Each connection opens a fresh pipe;
/// closing the writer side makes the blocked reader observe EOF, which
/// routes through the driver's disconnect/reconnect path.
pub struct LoopbackLink {
    injector: Arc<Mutex<Option<PipeWriter>>>,
}

/// Producer half handed to the reconciliation layer. Feeds raw frame bytes
/// into the current pipe, as if a physical device had sent them.
#[derive(Clone)]
pub struct LoopbackInjector {
    inner: Arc<Mutex<Option<PipeWriter>>>,
}

impl LoopbackLink {
    pub fn new() -> (LoopbackLink, LoopbackInjector) {
        let slot = Arc::new(Mutex::new(None));
        (
            LoopbackLink {
                injector: Arc::clone(&slot),
            },
            LoopbackInjector { inner: slot },
        )
    }
}

impl DeviceLink for LoopbackLink {
    fn label(&self) -> &str {
        "debug-loopback"
    }

    fn connect(&mut self) -> io::Result<LinkStreams> {
        let (reader, writer) = io::pipe()?;
        *self.injector.lock() = Some(writer);
        // There is no physical device behind the pipe, so no outbound path.
        Ok(LinkStreams {
            reader: Box::new(reader),
            writer: None,
        })
    }

    fn close(&mut self) {
        if self.injector.lock().take().is_some() {
            debug!("closing loopback pipe");
        }
    }
}

impl LoopbackInjector {
    /// Write one frame payload plus the sentinel into the pipe.
    pub fn inject_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock();
        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "loopback pipe not open",
            ));
        };
        writer.write_all(bytes)?;
        writer.write_all(&[STOP_BYTE])?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use vestlink_proto::wire::STOP_BYTE;

    use super::{DeviceLink, LoopbackLink};

    #[test]
    fn injects_frames_into_the_current_pipe() {
        let (mut link, injector) = LoopbackLink::new();

        // No pipe yet.
        assert!(injector.inject_bytes(&[1, 2]).is_err());

        let streams = link.connect().expect("pipe");
        assert!(streams.writer.is_none());
        injector.inject_bytes(&[10, 0]).expect("inject");

        let mut reader = streams.reader;
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).expect("read");
        assert_eq!(buf, [10, 0, STOP_BYTE]);

        // Closing drops the writer; the reader observes EOF.
        link.close();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).expect("eof");
        assert!(rest.is_empty());
    }
}
