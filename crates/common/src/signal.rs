//! Change signals emitted for mutating filesystem operations
//!
//! A signal is constructed by the passthrough layer at the moment a
//! mutating call is dispatched, before the underlying host operation is
//! attempted. The consumer therefore sees every attempted mutation, even
//! ones the host filesystem subsequently rejects.

use serde::{Deserialize, Serialize};

/// Coarse classification of the node affected by a mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// A regular file
    File,
    /// A directory
    Directory,
    /// The affected kind is not determined by the call itself (rename)
    Unknown,
}

/// A change notification for a single mutating operation
///
/// `path` is the absolute real path under the source root, never the
/// virtual path presented at the mount point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Absolute real path of the affected node
    pub path: String,
    /// Coarse kind of the affected node
    pub kind: NodeType,
}

impl Signal {
    pub fn new(path: impl Into<String>, kind: NodeType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_str_and_string() {
        let from_str = Signal::new("/data/a.txt", NodeType::File);
        let from_string = Signal::new("/data/a.txt".to_string(), NodeType::File);

        assert_eq!(from_str, from_string);
        assert_eq!(from_str.path, "/data/a.txt");
        assert_eq!(from_str.kind, NodeType::File);
    }

    #[test]
    fn test_signals_differing_in_path_or_kind_are_unequal() {
        let base = Signal::new("/data/a.txt", NodeType::File);

        assert_ne!(base, Signal::new("/data/b.txt", NodeType::File));
        assert_ne!(base, Signal::new("/data/a.txt", NodeType::Unknown));
    }

    #[test]
    fn test_node_type_is_copy() {
        let kind = NodeType::Directory;
        let copied = kind;

        // Both remain usable; the kind travels by value into signals
        assert_eq!(kind, copied);
        assert_eq!(Signal::new("/data/sub", kind).kind, NodeType::Directory);
    }
}
