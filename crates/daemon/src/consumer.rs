//! Signal consumer worker
//!
//! A dedicated thread that drains the signal channel for the lifetime of
//! the mount. The channel contract makes no assumption about what
//! processing does; this reference consumer logs each signal. It exits on
//! its own once every dispatcher is gone and the buffered signals are
//! drained, so the bootstrap can join it after unmounting.

use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use common::SignalReceiver;

/// Spawn the consumer thread
pub fn spawn(signals: SignalReceiver) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("signal-consumer".to_string())
        .spawn(move || {
            debug!("signal consumer started");
            while let Some(signal) = signals.recv() {
                info!(path = %signal.path, kind = ?signal.kind, "change signal");
            }
            debug!("signal channel disconnected, consumer exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{NodeType, Signal, SignalDispatcher};

    #[test]
    fn test_consumer_drains_and_exits_on_disconnect() {
        let (tx, rx) = SignalDispatcher::new();
        let handle = spawn(rx).unwrap();

        tx.dispatch(Signal::new("/data/a.txt", NodeType::File));
        tx.dispatch(Signal::new("/data/sub", NodeType::Directory));
        drop(tx);

        handle.join().unwrap();
    }
}
