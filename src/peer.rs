//! Remote peer identity.

/// Identity of a remote peer (a node ID or BLE address).
///
/// Subscription bookkeeping and channel routing key on this value only;
/// two handles to the same device must produce equal IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_peer_id_identity() {
        let a = PeerId::from("AA:BB:CC:DD:EE:FF");
        let b = PeerId::new(String::from("AA:BB:CC:DD:EE:FF"));
        assert_eq!(a, b);

        let set: HashSet<_> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(a.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(a.as_str(), "AA:BB:CC:DD:EE:FF");
    }
}
