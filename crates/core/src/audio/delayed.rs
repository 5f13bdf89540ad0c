use crate::audio::{Frame, FrameSink};

/// Pass-through sink that starts the stream with silence.
///
/// Before forwarding the first real frame, writes `output_latency`
/// sample-units of zeros, rounded up to whole frames. This shifts the whole
/// stream forward in time, giving the session jitter buffers that much
/// headroom to fill before the sound card needs their audio. The prologue
/// is synthesized lazily on the first write, when the frame size is known.
pub struct DelayedWriter {
    inner: Box<dyn FrameSink>,
    n_channels: usize,
    output_latency: u32,
    started: bool,
}

impl DelayedWriter {
    pub fn new(inner: Box<dyn FrameSink>, n_channels: usize, output_latency: u32) -> Self {
        Self {
            inner,
            n_channels,
            output_latency,
            started: false,
        }
    }
}

impl FrameSink for DelayedWriter {
    fn write(&mut self, frame: Frame) -> bool {
        if frame.is_empty() {
            // End-of-stream passes straight through; a stream that never
            // carried audio gets no silence prologue either.
            return self.inner.write(frame);
        }

        if !self.started {
            self.started = true;

            let samples_per_tick = frame.len() / self.n_channels;
            let frames = (self.output_latency as usize).div_ceil(samples_per_tick);
            tracing::debug!(
                output_latency = self.output_latency,
                frames,
                "delayed writer: writing startup silence"
            );
            for _ in 0..frames {
                if !self.inner.write(vec![0.0; frame.len()]) {
                    return false;
                }
            }
        }

        self.inner.write(frame)
    }
}
