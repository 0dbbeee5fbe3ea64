//! Delivery channel for change signals
//!
//! This module pairs the filesystem layer (producer) with the signal
//! consumer over an unbounded flume channel. Sends never block and carry
//! no acknowledgment: a signal not yet received when the process ends is
//! lost, and the filesystem call that produced it is never failed on the
//! channel's account.

use tracing::debug;

use crate::signal::Signal;

/// Sending half of the signal channel
///
/// A lightweight handle that can be cloned freely; every filesystem
/// operation that mutates the tree dispatches through one of these.
#[derive(Debug, Clone)]
pub struct SignalDispatcher {
    tx: flume::Sender<Signal>,
}

impl SignalDispatcher {
    /// Create a connected dispatcher/receiver pair
    ///
    /// The dispatcher can be cloned and shared; the receiver should be
    /// handed to the consumer.
    pub fn new() -> (Self, SignalReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, SignalReceiver { rx })
    }

    /// Dispatch a signal to the consumer
    ///
    /// Non-blocking and fire-and-forget: if the consumer has already gone
    /// away the signal is discarded, never surfaced to the caller.
    pub fn dispatch(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            debug!("signal receiver dropped, discarding signal");
        }
    }
}

/// Receiving half of the signal channel, owned by the consumer
#[derive(Debug)]
pub struct SignalReceiver {
    rx: flume::Receiver<Signal>,
}

impl SignalReceiver {
    /// Receive the next signal (blocking)
    ///
    /// Returns None once every dispatcher has been dropped and the
    /// channel is drained (graceful shutdown).
    pub fn recv(&self) -> Option<Signal> {
        self.rx.recv().ok()
    }

    /// Try to receive a signal without blocking
    pub fn try_recv(&self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::NodeType;

    #[test]
    fn test_signals_arrive_in_dispatch_order() {
        let (tx, rx) = SignalDispatcher::new();

        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
        tx.dispatch(Signal::new("/data/sub", NodeType::Directory));
        tx.dispatch(Signal::new("/data/b.txt", NodeType::Unknown));

        assert_eq!(rx.recv().unwrap().path, "/data/a.txt");
        assert_eq!(rx.recv().unwrap().path, "/data/sub");
        assert_eq!(rx.recv().unwrap().kind, NodeType::Unknown);
    }

    #[test]
    fn test_recv_drains_then_disconnects() {
        let (tx, rx) = SignalDispatcher::new();
        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
        drop(tx);

        // Buffered signal survives the dispatcher drop
        assert!(rx.recv().is_some());
        assert!(rx.recv().is_none());
    }

    #[test]
    fn test_dispatch_after_receiver_dropped_is_silent() {
        let (tx, rx) = SignalDispatcher::new();
        drop(rx);

        // Fire-and-forget: no panic, no error to observe
        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
    }

    #[test]
    fn test_cloned_dispatchers_feed_one_receiver() {
        let (tx, rx) = SignalDispatcher::new();
        let tx2 = tx.clone();

        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
        tx2.dispatch(Signal::new("/data/b.txt", NodeType::File));
        drop(tx);
        drop(tx2);

        assert!(rx.recv().is_some());
        assert!(rx.recv().is_some());
        assert!(rx.recv().is_none());
    }

    #[test]
    fn test_try_recv_is_non_blocking() {
        let (tx, rx) = SignalDispatcher::new();
        assert!(rx.try_recv().is_none());

        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
    }
}
