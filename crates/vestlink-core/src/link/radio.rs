//! Socket-backed radio link to a previously paired peer.

use std::{
    collections::HashMap,
    io,
    net::{Shutdown, SocketAddr, TcpStream},
};

use tracing::{debug, info};

use super::{DeviceLink, LinkStreams};

/// Registry of previously paired radio peers, name to socket address. The
/// analogue of the platform's bonded-device table; pairing itself happens
/// outside the core.
#[derive(Debug, Clone, Default)]
pub struct PairedDevices {
    entries: HashMap<String, SocketAddr>,
}

impl PairedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, addr: SocketAddr) {
        self.entries.insert(name.into(), addr);
    }

    pub fn resolve(&self, name: &str) -> Option<SocketAddr> {
        self.entries.get(name).copied()
    }
}

impl FromIterator<(String, SocketAddr)> for PairedDevices {
    fn from_iter<I: IntoIterator<Item = (String, SocketAddr)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Persistent link to the vest's radio bridge.
///
/// The peer is looked up in the paired-device registry on the first
/// connect attempt that finds it; the resolution is cached for reconnects.
/// An unresolved or unreachable peer is retried by the driver without
/// delay.
pub struct RadioLink {
    peer_name: String,
    paired: PairedDevices,
    resolved: Option<SocketAddr>,
    stream: Option<TcpStream>,
}

impl RadioLink {
    pub fn new(peer_name: impl Into<String>, paired: PairedDevices) -> Self {
        Self {
            peer_name: peer_name.into(),
            paired,
            resolved: None,
            stream: None,
        }
    }
}

impl DeviceLink for RadioLink {
    fn label(&self) -> &str {
        &self.peer_name
    }

    fn connect(&mut self) -> io::Result<LinkStreams> {
        if self.resolved.is_none() {
            self.resolved = self.paired.resolve(&self.peer_name);
            if let Some(addr) = self.resolved {
                info!(peer = %self.peer_name, %addr, "found paired device");
            }
        }
        let Some(addr) = self.resolved else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "device not paired"));
        };

        let stream = TcpStream::connect(addr)?;
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;
        // Keep a handle so close() can shut the socket down and unblock a
        // pending read.
        self.stream = Some(stream);
        Ok(LinkStreams {
            reader: Box::new(reader),
            writer: Some(Box::new(writer)),
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(peer = %self.peer_name, "closing radio link");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}
