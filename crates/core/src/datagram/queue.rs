use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::datagram::{Datagram, DatagramSource, TryRead};

/// Bounded multi-producer queue feeding the server thread.
///
/// The producer side never blocks: when the queue is full the datagram is
/// dropped, which is the correct behavior for a real-time receive path —
/// stale input is worth less than a steady output cadence. The consumer
/// side is the pipeline's [`DatagramSource`].
pub struct DatagramQueue {
    rx: Receiver<Datagram>,
}

/// Producer handle for a [`DatagramQueue`]. Cloneable across threads.
#[derive(Clone)]
pub struct DatagramSender {
    tx: Sender<Datagram>,
}

impl DatagramQueue {
    /// Create a queue holding at most `capacity` datagrams.
    pub fn bounded(capacity: usize) -> (DatagramSender, DatagramQueue) {
        let (tx, rx) = bounded(capacity);
        (DatagramSender { tx }, DatagramQueue { rx })
    }
}

impl DatagramSender {
    /// Enqueue a datagram without blocking.
    ///
    /// Returns `false` when the datagram was dropped (queue full or
    /// consumer gone).
    pub fn send(&self, dgm: Datagram) -> bool {
        match self.tx.try_send(dgm) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("datagram queue full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl DatagramSource for DatagramQueue {
    fn try_read(&mut self) -> TryRead {
        match self.rx.try_recv() {
            Ok(dgm) => TryRead::Datagram(dgm),
            Err(TryRecvError::Empty) => TryRead::Empty,
            Err(TryRecvError::Disconnected) => TryRead::Closed,
        }
    }
}
