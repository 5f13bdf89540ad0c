use std::sync::Arc;

use parking_lot::Mutex;

use crate::packet::{ChannelMask, Sample};
use crate::session::Session;

/// Mixes the attached session renderers into one interleaved frame.
///
/// The renderer set lives behind a mutex: attaches (from routing) and
/// detaches (from session reaping) happen on the server thread between
/// `read` calls, so the lock is uncontended in practice, but it keeps the
/// muxer correct if an embedder ever drives attachment from elsewhere.
///
/// Mixing is equal-weight per-sample summation with no automatic gain
/// reduction. Frames carry `f32` samples, so headroom is effectively
/// unbounded here; saturation happens where samples meet an integer
/// representation (the packet decoder on the way in, the playback sink on
/// the way out).
pub struct ChannelMuxer {
    channels: ChannelMask,
    renderers: Mutex<Vec<Arc<Session>>>,
    scratch: Mutex<Vec<Sample>>,
}

impl ChannelMuxer {
    pub fn new(channels: ChannelMask) -> Self {
        Self {
            channels,
            renderers: Mutex::new(Vec::new()),
            scratch: Mutex::new(Vec::new()),
        }
    }

    /// Output channel mask; every frame is interleaved over these channels.
    pub fn channels(&self) -> ChannelMask {
        self.channels
    }

    /// Number of attached renderers.
    pub fn num_renderers(&self) -> usize {
        self.renderers.lock().len()
    }

    /// Add a session's renderer to the mix. Idempotent.
    pub fn attach(&self, session: Arc<Session>) {
        let mut renderers = self.renderers.lock();
        if !renderers.iter().any(|r| Arc::ptr_eq(r, &session)) {
            renderers.push(session);
            tracing::debug!(renderers = renderers.len(), "muxer: renderer attached");
        }
    }

    /// Remove a session's renderer from the mix.
    ///
    /// Returns `false` when the session was not attached.
    pub fn detach(&self, session: &Arc<Session>) -> bool {
        let mut renderers = self.renderers.lock();
        match renderers.iter().position(|r| Arc::ptr_eq(r, session)) {
            Some(at) => {
                renderers.remove(at);
                tracing::debug!(renderers = renderers.len(), "muxer: renderer detached");
                true
            }
            None => false,
        }
    }

    /// Fill `out` with one tick of mixed audio.
    ///
    /// Each renderer renders into a zeroed scratch frame over the output
    /// channel mask, and the scratch is summed into `out`.
    pub fn read(&self, out: &mut [Sample]) {
        out.fill(0.0);

        let renderers = self.renderers.lock();
        if renderers.is_empty() {
            return;
        }

        let mut scratch = self.scratch.lock();
        scratch.resize(out.len(), 0.0);

        for renderer in renderers.iter() {
            scratch.fill(0.0);
            renderer.render(self.channels, scratch.as_mut_slice());
            for (acc, s) in out.iter_mut().zip(scratch.iter()) {
                *acc += *s;
            }
        }
    }
}
