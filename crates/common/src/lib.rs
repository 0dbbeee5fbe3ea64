// Shared contract between the filesystem layer and the signal consumer
pub mod channel;
pub mod signal;

pub use channel::{SignalDispatcher, SignalReceiver};
pub use signal::{NodeType, Signal};
