//! Error types for repository operations.

use thiserror::Error;

/// Which entity table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Host,
    Group,
    Template,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Host => "host",
            EntityKind::Group => "group",
            EntityKind::Template => "template",
        })
    }
}

/// Errors from repository operations.
///
/// Every failure carries the entity kind and key involved, so callers can
/// log it or translate it into a transport-level response without guessing.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write was attempted with an empty entity key.
    #[error("{kind} key is empty")]
    EmptyKey { kind: EntityKind },

    /// The key (or a unique index value such as a hardware address) is
    /// already taken.
    #[error("{kind} {key:?} already exists")]
    KeyExists { kind: EntityKind, key: String },

    /// The key, or a referenced entity, does not exist.
    #[error("{kind} {key:?} not found")]
    KeyNotFound { kind: EntityKind, key: String },

    /// A write operation was invoked on a read-only session.
    #[error("write operation on a read-only session")]
    ReadOnly,

    /// The session was already closed.
    #[error("session already closed")]
    AlreadyClosed,

    /// The repository configuration is malformed (bad driver key or value
    /// type).
    #[error("invalid repository config: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn empty_key(kind: EntityKind) -> Self {
        StoreError::EmptyKey { kind }
    }

    pub fn key_exists(kind: EntityKind, key: impl Into<String>) -> Self {
        StoreError::KeyExists {
            kind,
            key: key.into(),
        }
    }

    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        StoreError::KeyNotFound {
            kind,
            key: key.into(),
        }
    }

    /// True for missing-key failures, including missing referents.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::KeyNotFound { .. })
    }

    /// True for duplicate-key failures (entity id or hardware address).
    pub fn is_key_exists(&self) -> bool {
        matches!(self, StoreError::KeyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_kind_and_key() {
        let err = StoreError::not_found(EntityKind::Host, "node-1");
        assert_eq!(err.to_string(), "host \"node-1\" not found");
        assert!(err.is_not_found());
        assert!(!err.is_key_exists());

        let err = StoreError::key_exists(EntityKind::Group, "rack-1");
        assert_eq!(err.to_string(), "group \"rack-1\" already exists");
        assert!(err.is_key_exists());
    }

    #[test]
    fn empty_key_display() {
        let err = StoreError::empty_key(EntityKind::Template);
        assert_eq!(err.to_string(), "template key is empty");
    }
}
