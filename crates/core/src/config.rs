use std::sync::Arc;

use crate::audio::{ByteBufferComposer, SampleBufferComposer};
use crate::packet::ChannelMask;
use crate::session::SessionConfig;
use crate::session::pool::SessionPool;

/// Option bit: wrap the sink in a [`TimedWriter`](crate::audio::timed::TimedWriter)
/// so output is paced to real time.
pub const ENABLE_TIMING: u32 = 1 << 0;

/// Server pipeline configuration.
///
/// All latency and timeout quantities are in sample-units of the stream
/// clock. The collaborator slots (`session_pool`,
/// `byte_buffer_composer`, `sample_buffer_composer`) must be filled in —
/// [`Server::new`](crate::Server::new) treats a missing collaborator as a
/// fatal config error. `Default` supplies sensible numeric values for a
/// 44.1 kHz stereo stream and leaves the collaborators empty.
#[derive(Clone)]
pub struct ServerConfig {
    /// Channel bitmask of the output frames.
    pub channels: ChannelMask,
    /// Output samples per second per channel.
    pub sample_rate: u32,
    /// Frame size per channel; one frame is produced per tick.
    pub samples_per_tick: usize,
    /// Startup silence prepended to the output (sample-units).
    pub output_latency: u32,
    /// Target per-session jitter-buffer depth (sample-units).
    pub session_latency: u32,
    /// Idle duration after which a session is reaped (sample-units).
    pub session_timeout: u32,
    /// Hard cap on concurrently active sessions.
    pub max_sessions: usize,
    /// Capacity of each session's packet store.
    pub max_session_packets: usize,
    /// Bitmask of [`ENABLE_TIMING`]-style option flags.
    pub options: u32,
    /// Supplier of session objects; bounds total session allocation.
    pub session_pool: Option<Arc<dyn SessionPool>>,
    /// Allocator for packet payload copies, used by parsers.
    pub byte_buffer_composer: Option<Arc<dyn ByteBufferComposer>>,
    /// Allocator for output frames.
    pub sample_buffer_composer: Option<Arc<dyn SampleBufferComposer>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            channels: 0b11,
            sample_rate: 44100,
            samples_per_tick: 441,
            output_latency: 4410,
            session_latency: 8820,
            session_timeout: 441_000,
            max_sessions: 32,
            max_session_packets: 256,
            options: 0,
            session_pool: None,
            byte_buffer_composer: None,
            sample_buffer_composer: None,
        }
    }
}

impl ServerConfig {
    /// The per-session slice of this configuration.
    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            session_latency: self.session_latency,
            session_timeout: self.session_timeout,
            max_session_packets: self.max_session_packets,
        }
    }
}
