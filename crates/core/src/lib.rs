//! # netaudio — receive-side pipeline for real-time network audio
//!
//! A Rust library implementing the receive half of a network audio
//! transport: it ingests UDP-style datagrams carrying timestamped audio
//! packets from one or more remote clients, reconstructs each stream
//! through a jitter buffer, mixes the streams into a single multi-channel
//! signal, and emits a continuous cadence of fixed-size sample frames to a
//! playback sink.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Receiver thread  →  DatagramQueue             │
//! ├───────────────────────────────────────────────┤
//! │  Server         — tick loop, orchestrator      │
//! │  SessionManager — routing, session lifecycle   │
//! │  Session        — jitter buffer + renderer     │
//! ├───────────────────────────────────────────────┤
//! │  ChannelMuxer   — mixes renderers per tick     │
//! │  DelayedWriter  — startup silence              │
//! │  TimedWriter    — optional real-time pacing    │
//! ├───────────────────────────────────────────────┤
//! │  FrameQueue  →  playback thread (sound card)   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Three threads cooperate: a receiver thread fills the bounded
//! [`DatagramQueue`](datagram::queue::DatagramQueue), the server thread
//! runs [`Server::run`], and a playback thread drains the
//! [`FrameQueue`](audio::queue::FrameQueue). The server never blocks on
//! input; back-pressure comes only from the bounded output queue.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use netaudio::audio::queue::FrameQueue;
//! use netaudio::audio::{HeapByteBufferComposer, HeapSampleBufferComposer};
//! use netaudio::datagram::queue::DatagramQueue;
//! use netaudio::packet::rtp::RtpParser;
//! use netaudio::session::pool::FixedSessionPool;
//! use netaudio::{Server, ServerConfig};
//!
//! let (dgm_tx, dgm_rx) = DatagramQueue::bounded(1024);
//! let (frame_tx, frame_rx) = FrameQueue::bounded(64);
//!
//! let byte_composer = Arc::new(HeapByteBufferComposer);
//! let config = ServerConfig {
//!     channels: 0b11,
//!     session_pool: Some(Arc::new(FixedSessionPool::new(32))),
//!     byte_buffer_composer: Some(byte_composer.clone()),
//!     sample_buffer_composer: Some(Arc::new(HeapSampleBufferComposer)),
//!     ..ServerConfig::default()
//! };
//!
//! let mut server = Server::new(Box::new(dgm_rx), Box::new(frame_tx), config).unwrap();
//! server.add_port(
//!     "0.0.0.0:10001".parse().unwrap(),
//!     Arc::new(RtpParser::new(0b11, 44100, byte_composer).unwrap()),
//! ).unwrap();
//!
//! let stop = server.stop_handle();
//! std::thread::spawn(move || server.run());
//! // ... feed dgm_tx from a socket, drain frame_rx into a sound card ...
//! stop.stop();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — High-level [`Server`] orchestrator and [`StopHandle`].
//! - [`config`] — [`ServerConfig`] and option flags.
//! - [`session`] — Per-stream jitter buffer, session manager, session pool.
//! - [`port`] — [`PortTable`](port::PortTable): local address → parser.
//! - [`packet`] — Packet/parser traits, modular units, RTP/L16 parser.
//! - [`datagram`] — [`Datagram`](datagram::Datagram) and its bounded queue.
//! - [`audio`] — Frames, sinks, muxer, delayed/timed writers, composers.
//! - [`error`] — [`Error`] enum and [`Result`] alias.

pub mod audio;
pub mod config;
pub mod datagram;
pub mod error;
pub mod packet;
pub mod port;
pub mod server;
pub mod session;

pub use config::{ENABLE_TIMING, ServerConfig};
pub use error::{Error, Result};
pub use server::{Server, StopHandle};
