use crossbeam_channel::{Receiver, Sender, bounded};

use crate::audio::{Frame, FrameSink};

/// Bounded frame queue between the server thread and the playback thread.
///
/// The producer ([`FrameWriter`]) blocks while the queue is full, which is
/// the pipeline's natural back-pressure: the server cannot outrun a sink
/// that consumes in real time by more than the queue capacity.
pub struct FrameQueue {
    rx: Receiver<Frame>,
}

/// Producer handle implementing [`FrameSink`].
pub struct FrameWriter {
    tx: Sender<Frame>,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    pub fn bounded(capacity: usize) -> (FrameWriter, FrameQueue) {
        let (tx, rx) = bounded(capacity);
        (FrameWriter { tx }, FrameQueue { rx })
    }

    /// Take the next frame, blocking until one is available.
    ///
    /// Returns `None` once the producer is gone and the queue is drained.
    /// An empty frame is the end-of-stream marker; the producer writes
    /// nothing after it.
    pub fn recv(&self) -> Option<Frame> {
        self.rx.recv().ok()
    }
}

impl FrameSink for FrameWriter {
    fn write(&mut self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }
}
