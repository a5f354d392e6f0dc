//! Core type definitions for Detach.

use std::fmt;
use uuid::Uuid;

/// Primary key of a persisted entity.
///
/// Keys are displayed bare (`42`, `alice`, a hyphenated UUID) so they can be
/// embedded in user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    /// Numeric surrogate key.
    Integer(i64),
    /// Natural text key.
    Text(String),
    /// UUID key.
    Uuid(Uuid),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Uuid> for EntityKey {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

/// Identity of an entity node within the current process.
///
/// Two handles have the same `NodeId` iff they point at the same node. The
/// id is only meaningful while at least one handle keeps the node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node id from a raw address.
    #[must_use]
    pub(crate) const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_key_display() {
        assert_eq!(EntityKey::from(7).to_string(), "7");
    }

    #[test]
    fn text_key_display_is_bare() {
        assert_eq!(EntityKey::from("alice").to_string(), "alice");
    }

    #[test]
    fn uuid_key_display_is_hyphenated() {
        let uuid = Uuid::new_v4();
        assert_eq!(EntityKey::from(uuid).to_string(), uuid.hyphenated().to_string());
    }

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::new(0xff)), "node:ff");
    }
}
