//! Entity records stored by the repository.
//!
//! These are plain value types: every mutation goes through a write session,
//! which replaces the stored record wholesale. The only behavior they carry
//! is the set-like maintenance of the group back-reference lists.

mod group;
mod host;
mod template;

pub use group::Group;
pub use host::Host;
pub use template::Template;
