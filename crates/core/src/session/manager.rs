use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::audio::muxer::ChannelMuxer;
use crate::datagram::Datagram;
use crate::error::Result;
use crate::packet::PacketParser;
use crate::port::PortTable;
use crate::session::pool::SessionPool;
use crate::session::{Session, SessionConfig};

/// Counters for datagrams the router absorbed without propagating an error.
///
/// Transient input faults are dropped by design; the counters make the
/// drops observable for monitoring and tests.
#[derive(Debug, Default, Clone)]
pub struct RouteStats {
    /// Datagrams parsed and handed to a session.
    pub routed: u64,
    /// Dropped: no parser registered for the destination address.
    pub no_port: u64,
    /// Dropped: the parser rejected the payload.
    pub parse_failed: u64,
    /// Dropped: session table full or session pool exhausted.
    pub sessions_rejected: u64,
}

/// Routes datagrams to sessions and drives the session lifecycle.
///
/// Sessions are keyed by remote address. The source-stream id inside the
/// packets is pinned by each session's first packet; a datagram from a
/// known remote address carrying a different source id replaces that
/// session rather than multiplexing alongside it.
pub struct SessionManager {
    ports: PortTable,
    sessions: HashMap<SocketAddr, Arc<Session>>,
    pool: Arc<dyn SessionPool>,
    muxer: Arc<ChannelMuxer>,
    session_cfg: SessionConfig,
    max_sessions: usize,
    samples_per_tick: usize,
    stats: RouteStats,
}

impl SessionManager {
    pub fn new(
        session_cfg: SessionConfig,
        max_sessions: usize,
        samples_per_tick: usize,
        pool: Arc<dyn SessionPool>,
        muxer: Arc<ChannelMuxer>,
    ) -> Self {
        Self {
            ports: PortTable::new(),
            sessions: HashMap::new(),
            pool,
            muxer,
            session_cfg,
            max_sessions,
            samples_per_tick,
            stats: RouteStats::default(),
        }
    }

    /// Register a parser for a local receive address.
    pub fn add_port(&mut self, addr: SocketAddr, parser: Arc<dyn PacketParser>) -> Result<()> {
        self.ports.add(addr, parser)
    }

    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> RouteStats {
        self.stats.clone()
    }

    /// Route one datagram to its session, creating the session on demand.
    ///
    /// All failure modes here are transient: the datagram is dropped, a
    /// counter is bumped, and the pipeline carries on.
    pub fn route(&mut self, dgm: Datagram) {
        let Some(parser) = self.ports.lookup(dgm.dst) else {
            self.stats.no_port += 1;
            tracing::trace!(dst = %dgm.dst, "route: no port for destination, dropping");
            return;
        };

        let Some(packet) = parser.parse(&dgm.payload) else {
            self.stats.parse_failed += 1;
            tracing::debug!(src = %dgm.src, dst = %dgm.dst, "route: malformed datagram, dropping");
            return;
        };

        if let Some(session) = self.sessions.get(&dgm.src) {
            if session.source() == Some(packet.source()) {
                self.stats.routed += 1;
                session.store(packet);
                return;
            }

            // Same remote address, new source id: the remote restarted its
            // stream. Tear the old session down and start over.
            if let Some(old) = self.sessions.remove(&dgm.src) {
                self.muxer.detach(&old);
                self.pool.release(old);
                tracing::debug!(
                    remote = %dgm.src,
                    source = packet.source(),
                    "route: source id changed, replacing session"
                );
            }
        }

        if self.sessions.len() >= self.max_sessions {
            self.stats.sessions_rejected += 1;
            tracing::debug!(remote = %dgm.src, "route: session limit reached, dropping");
            return;
        }

        let Some(session) = self.pool.acquire() else {
            self.stats.sessions_rejected += 1;
            tracing::debug!(remote = %dgm.src, "route: session pool exhausted, dropping");
            return;
        };

        session.activate(self.session_cfg);
        self.muxer.attach(session.clone());
        self.sessions.insert(dgm.src, session.clone());
        tracing::debug!(
            remote = %dgm.src,
            total_sessions = self.sessions.len(),
            "session created"
        );

        self.stats.routed += 1;
        session.store(packet);
    }

    /// Advance every session by one tick and reap the dead ones.
    ///
    /// Returns `false` only when the renderer set has diverged from the
    /// session table, which means the pipeline's bookkeeping can no longer
    /// be trusted.
    pub fn update(&mut self) -> bool {
        for session in self.sessions.values() {
            session.advance(self.samples_per_tick);
        }

        let dead: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_broken() || s.is_idle())
            .map(|(addr, _)| *addr)
            .collect();

        for addr in dead {
            let Some(session) = self.sessions.remove(&addr) else {
                continue;
            };
            let reason = if session.is_broken() { "broken" } else { "idle" };

            if !self.muxer.detach(&session) {
                tracing::error!(remote = %addr, "update: session missing from muxer");
                return false;
            }
            self.pool.release(session);
            tracing::debug!(
                remote = %addr,
                reason,
                total_sessions = self.sessions.len(),
                "session removed"
            );
        }

        true
    }
}
