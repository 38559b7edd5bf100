//! Mayfly storage layer
//!
//! This crate holds the canonical entity records (hosts, groups, boot
//! templates) and the transactional repository that guards them:
//!
//! - [`Repository`]: cloneable handle over the shared entity tables,
//!   protected by one coarse read/write lock. Cross-entity invariants
//!   (host/group back-references, MAC uniqueness) are enforced inside the
//!   write transaction, so there are no per-row locks to order.
//! - [`Session`]: a single-use handle bound to one open transaction.
//!   Entity-scoped views ([`Session::hosts`], [`Session::groups`],
//!   [`Session::templates`]) share the session's lock and mode.
//!
//! The in-memory driver is the reference implementation; [`create_repository`]
//! is the seam where a durable backend would plug in.
//!
//! # Example
//!
//! ```ignore
//! use mayfly_store::{entity::Host, Repository};
//!
//! let repo = Repository::memory();
//! repo.write(|s| {
//!     s.hosts().create(Host::new("node-1").with_hardware_addr("aa:bb:cc:dd:ee:ff"))
//! })
//! .await?;
//! ```

pub mod entity;
pub mod error;
mod memory;
mod repository;

pub use error::{EntityKind, StoreError};
pub use repository::{Groups, Hosts, Repository, Session, Templates};

use serde::Deserialize;

/// Repository backend selection, read from the `[db]` table of the config
/// file. The `driver` key picks the implementation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
        }
    }
}

fn default_driver() -> String {
    "memory".to_string()
}

/// Create a repository for the configured driver.
///
/// Alternative drivers must honor the same [`Repository`]/[`Session`]
/// contracts; an unknown driver fails with [`StoreError::InvalidConfig`].
pub fn create_repository(config: &StoreConfig) -> Result<Repository, StoreError> {
    match config.driver.to_ascii_lowercase().as_str() {
        "memory" => Ok(Repository::memory()),
        other => Err(StoreError::InvalidConfig(format!(
            "unknown repository driver {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_repository_memory_driver() {
        let config = StoreConfig::default();
        assert_eq!(config.driver, "memory");
        assert!(create_repository(&config).is_ok());

        // Driver matching is case-insensitive.
        let config = StoreConfig {
            driver: "Memory".to_string(),
        };
        assert!(create_repository(&config).is_ok());
    }

    #[test]
    fn create_repository_unknown_driver() {
        let config = StoreConfig {
            driver: "etcd".to_string(),
        };
        match create_repository(&config) {
            Err(StoreError::InvalidConfig(msg)) => assert!(msg.contains("etcd")),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }
}
