//! Transactional sessions over the shared entity tables.
//!
//! One coarse read/write lock covers the whole entity graph: a write session
//! holds it exclusively for its entire lifetime, which is what makes the
//! multi-entity back-reference updates atomic from every other transaction's
//! point of view. Read sessions share the lock. The lock is released when the
//! session is closed or dropped, so the [`Repository::read`] /
//! [`Repository::write`] wrappers cannot leak it, even when the closure
//! panics.

use crate::entity::{Group, Host, Template};
use crate::error::StoreError;
use crate::memory::Tables;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Handle to a repository instance. Cloning is cheap and every clone operates
/// on the same entity tables.
#[derive(Clone)]
pub struct Repository {
    tables: Arc<RwLock<Tables>>,
}

impl Repository {
    /// Create an empty repository backed by the in-memory driver.
    pub fn memory() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Open a transaction: shared for reads, exclusive for writes.
    ///
    /// The returned session owns the lock until it is closed or dropped.
    /// A writer blocks until all outstanding readers are gone, and vice
    /// versa.
    pub async fn open(&self, write: bool) -> Session {
        let guard = if write {
            Guard::Write(Arc::clone(&self.tables).write_owned().await)
        } else {
            Guard::Read(Arc::clone(&self.tables).read_owned().await)
        };
        Session {
            write,
            guard: Some(guard),
        }
    }

    /// Run `f` inside a read transaction. The session is always closed
    /// afterwards and `f`'s error is propagated untouched.
    pub async fn read<T, E>(&self, f: impl FnOnce(&mut Session) -> Result<T, E>) -> Result<T, E> {
        let mut session = self.open(false).await;
        let out = f(&mut session);
        let _ = session.close();
        out
    }

    /// Run `f` inside a write transaction; see [`Repository::read`].
    pub async fn write<T, E>(&self, f: impl FnOnce(&mut Session) -> Result<T, E>) -> Result<T, E> {
        let mut session = self.open(true).await;
        let out = f(&mut session);
        let _ = session.close();
        out
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::memory()
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

enum Guard {
    Read(OwnedRwLockReadGuard<Tables>),
    Write(OwnedRwLockWriteGuard<Tables>),
}

/// A single-use handle bound to one open transaction.
pub struct Session {
    write: bool,
    guard: Option<Guard>,
}

impl Session {
    pub fn is_read_only(&self) -> bool {
        !self.write
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_some()
    }

    /// Release the transaction's lock. Fails with
    /// [`StoreError::AlreadyClosed`] when called twice.
    pub fn close(&mut self) -> Result<(), StoreError> {
        match self.guard.take() {
            Some(_) => Ok(()),
            None => Err(StoreError::AlreadyClosed),
        }
    }

    /// Host operations bound to this transaction.
    pub fn hosts(&mut self) -> Hosts<'_> {
        Hosts { session: self }
    }

    /// Group operations bound to this transaction.
    pub fn groups(&mut self) -> Groups<'_> {
        Groups { session: self }
    }

    /// Template operations bound to this transaction.
    pub fn templates(&mut self) -> Templates<'_> {
        Templates { session: self }
    }

    fn tables(&self) -> Result<&Tables, StoreError> {
        match self.guard.as_ref() {
            Some(Guard::Read(guard)) => Ok(guard),
            Some(Guard::Write(guard)) => Ok(guard),
            None => Err(StoreError::AlreadyClosed),
        }
    }

    fn tables_mut(&mut self) -> Result<&mut Tables, StoreError> {
        match self.guard.as_mut() {
            Some(Guard::Write(guard)) => Ok(guard),
            Some(Guard::Read(_)) => Err(StoreError::ReadOnly),
            None => Err(StoreError::AlreadyClosed),
        }
    }
}

/// Host view of a session.
pub struct Hosts<'s> {
    session: &'s mut Session,
}

impl Hosts<'_> {
    /// Install a new host and all its index entries. A non-empty `group_id`
    /// must reference an existing group, which receives the host in its
    /// back-reference list within the same transaction; a non-empty
    /// `template_id` must reference an existing template.
    pub fn create(&mut self, host: Host) -> Result<(), StoreError> {
        self.session.tables_mut()?.create_host(host)
    }

    pub fn get(&self, id: &str) -> Result<Host, StoreError> {
        self.session.tables()?.get_host(id)
    }

    /// Look a host up through the hardware-address index. Addresses are
    /// matched case-insensitively, hyphen or colon separated.
    pub fn find_by_hardware_addr(&self, mac: &str) -> Result<Host, StoreError> {
        self.session.tables()?.find_host_by_hardware_addr(mac)
    }

    /// Replace a stored host wholesale, reindexing hardware addresses and
    /// moving group back-references when `group_id` changed.
    pub fn update(&mut self, host: Host) -> Result<(), StoreError> {
        self.session.tables_mut()?.update_host(host)
    }

    pub fn delete(&mut self, host: &Host) -> Result<(), StoreError> {
        self.session.tables_mut()?.delete_host(host)
    }

    pub fn list(&self) -> Result<Vec<Host>, StoreError> {
        Ok(self.session.tables()?.list_hosts())
    }
}

/// Group view of a session.
pub struct Groups<'s> {
    session: &'s mut Session,
}

impl Groups<'_> {
    /// Install a new group. A non-empty `parent_id` must reference an
    /// existing group, which records the child in its back-reference list.
    pub fn create(&mut self, group: Group) -> Result<(), StoreError> {
        self.session.tables_mut()?.create_group(group)
    }

    pub fn get(&self, id: &str) -> Result<Group, StoreError> {
        self.session.tables()?.get_group(id)
    }

    pub fn update(&mut self, group: Group) -> Result<(), StoreError> {
        self.session.tables_mut()?.update_group(group)
    }

    /// Remove a group record. Dependent hosts and child groups are not
    /// touched; their references dangle until an operator repairs them.
    pub fn delete(&mut self, group: &Group) -> Result<(), StoreError> {
        self.session.tables_mut()?.delete_group(group)
    }

    pub fn list(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.session.tables()?.list_groups())
    }
}

/// Template view of a session.
pub struct Templates<'s> {
    session: &'s mut Session,
}

impl Templates<'_> {
    pub fn create(&mut self, template: Template) -> Result<(), StoreError> {
        self.session.tables_mut()?.create_template(template)
    }

    pub fn get(&self, id: &str) -> Result<Template, StoreError> {
        self.session.tables()?.get_template(id)
    }

    pub fn update(&mut self, template: Template) -> Result<(), StoreError> {
        self.session.tables_mut()?.update_template(template)
    }

    pub fn delete(&mut self, template: &Template) -> Result<(), StoreError> {
        self.session.tables_mut()?.delete_template(template)
    }

    pub fn list(&self) -> Result<Vec<Template>, StoreError> {
        Ok(self.session.tables()?.list_templates())
    }
}
