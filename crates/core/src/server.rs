use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::audio::delayed::DelayedWriter;
use crate::audio::muxer::ChannelMuxer;
use crate::audio::timed::TimedWriter;
use crate::audio::{Frame, FrameSink, SampleBufferComposer};
use crate::config::{ENABLE_TIMING, ServerConfig};
use crate::datagram::{DatagramSource, TryRead};
use crate::error::{Error, Result};
use crate::packet::{PacketParser, num_channels};
use crate::session::manager::{RouteStats, SessionManager};

/// Cloneable handle that requests run-loop termination.
///
/// Safe to trigger from any thread; the server observes the request at the
/// next tick boundary.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Receive-side pipeline orchestrator.
///
/// Fetches datagrams from the input queue, manages active sessions and
/// their packet stores, and generates the mixed output stream — one frame
/// per [`tick`](Self::tick).
///
/// ## Invocation
///
/// Either move the server onto its own thread and call [`run`](Self::run),
/// stopping it through a [`StopHandle`], or drive [`tick`](Self::tick)
/// from an existing loop.
///
/// ## Pipeline
///
/// Each tick performs, in order:
///
/// 1. Drain pending datagrams (bounded, non-blocking) and route each one:
///    look up the destination port's parser, parse, find or create the
///    session for the remote address, store the packet.
/// 2. Update every session: advance its playout cursor, reap broken and
///    idle sessions.
/// 3. Compose an output frame and let the channel muxer fill it from the
///    attached session renderers.
/// 4. Write the frame down the sink chain
///    (optional [`TimedWriter`] → [`DelayedWriter`] → sink).
pub struct Server {
    source: Box<dyn DatagramSource>,
    writer: Box<dyn FrameSink>,
    muxer: Arc<ChannelMuxer>,
    manager: SessionManager,
    composer: Arc<dyn SampleBufferComposer>,
    stop: Arc<AtomicBool>,
    frame_len: usize,
    /// Most datagrams routed per tick; caps time spent draining a flooded
    /// queue so the output cadence never starves. Sized for the worst-case
    /// steady-state arrival between two ticks.
    drain_limit: usize,
    output_latency: u32,
    session_latency: u32,
    failed: bool,
}

impl Server {
    /// Build the pipeline around a datagram source and a frame sink.
    ///
    /// Fails fast on an unusable configuration: empty channel mask, zero
    /// tick or rate, or a missing collaborator.
    pub fn new(
        source: Box<dyn DatagramSource>,
        sink: Box<dyn FrameSink>,
        config: ServerConfig,
    ) -> Result<Server> {
        let n_channels = num_channels(config.channels);
        if n_channels == 0 {
            return Err(Error::Config("channel mask is empty"));
        }
        if config.samples_per_tick == 0 {
            return Err(Error::Config("samples per tick is zero"));
        }
        if config.sample_rate == 0 {
            return Err(Error::Config("sample rate is zero"));
        }
        let pool = config
            .session_pool
            .clone()
            .ok_or(Error::Config("session pool is missing"))?;
        if config.byte_buffer_composer.is_none() {
            return Err(Error::Config("byte buffer composer is missing"));
        }
        let composer = config
            .sample_buffer_composer
            .clone()
            .ok_or(Error::Config("sample buffer composer is missing"))?;

        let muxer = Arc::new(ChannelMuxer::new(config.channels));

        let delayed = DelayedWriter::new(sink, n_channels, config.output_latency);
        let writer: Box<dyn FrameSink> = if config.options & ENABLE_TIMING != 0 {
            Box::new(TimedWriter::new(
                Box::new(delayed),
                n_channels,
                config.sample_rate,
            ))
        } else {
            Box::new(delayed)
        };

        let manager = SessionManager::new(
            config.session_config(),
            config.max_sessions,
            config.samples_per_tick,
            pool,
            muxer.clone(),
        );

        Ok(Server {
            source,
            writer,
            muxer,
            manager,
            composer,
            stop: Arc::new(AtomicBool::new(false)),
            frame_len: config.samples_per_tick * n_channels,
            drain_limit: config.max_sessions * config.max_session_packets,
            output_latency: config.output_latency,
            session_latency: config.session_latency,
            failed: false,
        })
    }

    /// Register a parser for datagrams received on a local address.
    ///
    /// Must be called before a datagram with that destination is routed;
    /// datagrams to unregistered addresses are dropped.
    pub fn add_port(&mut self, addr: SocketAddr, parser: Arc<dyn PacketParser>) -> Result<()> {
        self.manager.add_port(addr, parser)
    }

    /// Number of active sessions. Advisory.
    pub fn num_sessions(&self) -> usize {
        self.manager.num_sessions()
    }

    /// Counters of absorbed routing drops.
    pub fn route_stats(&self) -> RouteStats {
        self.manager.stats()
    }

    /// Handle for requesting termination from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Execute one pipeline step, emitting exactly one frame on success.
    ///
    /// Returns `false` on terminal failure: the input closed, a session
    /// bookkeeping invariant broke, the frame allocator gave out, or the
    /// sink closed. Once it has returned `false`, every later call returns
    /// `false` as well.
    pub fn tick(&mut self) -> bool {
        if self.failed {
            return false;
        }

        for _ in 0..self.drain_limit {
            match self.source.try_read() {
                TryRead::Datagram(dgm) => self.manager.route(dgm),
                TryRead::Empty => break,
                TryRead::Closed => {
                    tracing::debug!("server: datagram source closed");
                    self.failed = true;
                    return false;
                }
            }
        }

        if !self.manager.update() {
            self.failed = true;
            return false;
        }

        let Some(mut frame) = self.composer.compose(self.frame_len) else {
            tracing::error!("server: can't compose sample buffer");
            self.failed = true;
            return false;
        };

        self.muxer.read(&mut frame);

        if !self.writer.write(frame) {
            tracing::debug!("server: sink closed");
            self.failed = true;
            return false;
        }

        true
    }

    /// Tick until stopped or broken, then write the end-of-stream frame.
    pub fn run(&mut self) {
        tracing::debug!(
            output_latency = self.output_latency,
            session_latency = self.session_latency,
            "server: starting pipeline loop"
        );

        while !self.stop.load(Ordering::SeqCst) {
            if !self.tick() {
                break;
            }
        }

        tracing::debug!("server: finishing pipeline loop");
        self.writer.write(Frame::new());
    }
}
