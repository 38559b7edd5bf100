//! Error types for configuration resolution and script rendering.

use mayfly_store::StoreError;
use thiserror::Error;

/// Error type for resolution and rendering.
#[derive(Debug, Error)]
pub enum IpxeError {
    /// No host with that id or hardware address.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// The group chain references a group that does not exist.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The effective template id is empty or references no stored template.
    #[error("template not found: {0:?}")]
    TemplateNotFound(String),

    /// The group parent chain revisited a group.
    #[error("cyclic group reference through {0:?}")]
    CyclicGroupReference(String),

    /// The template body is malformed.
    #[error("template {name:?} failed to parse")]
    TemplateParse {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// The template body failed while executing (e.g. an undefined
    /// reference).
    #[error("template {name:?} failed to render")]
    TemplateRender {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// Session plumbing failure from the repository.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for resolution and rendering.
pub type Result<T> = std::result::Result<T, IpxeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_key() {
        assert_eq!(
            IpxeError::HostNotFound("node-1".into()).to_string(),
            "host not found: node-1"
        );
        assert_eq!(
            IpxeError::TemplateNotFound("".into()).to_string(),
            "template not found: \"\""
        );
        assert_eq!(
            IpxeError::CyclicGroupReference("rack-1".into()).to_string(),
            "cyclic group reference through \"rack-1\""
        );
    }
}
