use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::packet::PacketParser;

/// Registry of local receive ports, keyed by socket address.
///
/// Each binding pairs a local address with the wire parser for datagrams
/// received on it. Bindings are added before the pipeline runs and never
/// change afterwards; lookup is linear because deployments use a handful of
/// ports at most.
pub struct PortTable {
    ports: Vec<(SocketAddr, Arc<dyn PacketParser>)>,
}

impl PortTable {
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    /// Register a parser for a local address.
    ///
    /// A second registration for the same address is a caller error and is
    /// rejected.
    pub fn add(&mut self, addr: SocketAddr, parser: Arc<dyn PacketParser>) -> Result<()> {
        if self.ports.iter().any(|(bound, _)| *bound == addr) {
            return Err(Error::DuplicatePort(addr));
        }
        self.ports.push((addr, parser));
        tracing::info!(%addr, "port registered");
        Ok(())
    }

    /// Parser bound to `addr`, if any.
    pub fn lookup(&self, addr: SocketAddr) -> Option<&Arc<dyn PacketParser>> {
        self.ports
            .iter()
            .find(|(bound, _)| *bound == addr)
            .map(|(_, parser)| parser)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new()
    }
}
