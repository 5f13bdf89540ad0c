use std::time::{Duration, Instant};

use crate::audio::{Frame, FrameSink};

/// Pass-through sink that paces writes to real time.
///
/// The first write starts the clock; each later write is held back until
/// the samples already forwarded have "played out" at the configured rate.
/// A lagging stream passes through immediately and frames are never
/// dropped, so a sink that consumes in real time (a sound card) sees a
/// steady cadence while a faster-than-real-time producer is throttled.
pub struct TimedWriter {
    inner: Box<dyn FrameSink>,
    n_channels: usize,
    sample_rate: u32,
    start: Option<Instant>,
    samples_written: u64,
}

impl TimedWriter {
    pub fn new(inner: Box<dyn FrameSink>, n_channels: usize, sample_rate: u32) -> Self {
        Self {
            inner,
            n_channels,
            sample_rate,
            start: None,
            samples_written: 0,
        }
    }
}

impl FrameSink for TimedWriter {
    fn write(&mut self, frame: Frame) -> bool {
        if frame.is_empty() {
            return self.inner.write(frame);
        }

        let start = *self.start.get_or_insert_with(Instant::now);

        let due = start
            + Duration::from_secs_f64(self.samples_written as f64 / self.sample_rate as f64);
        if let Some(lead) = due.checked_duration_since(Instant::now()) {
            std::thread::sleep(lead);
        }

        self.samples_written += (frame.len() / self.n_channels) as u64;
        self.inner.write(frame)
    }
}
