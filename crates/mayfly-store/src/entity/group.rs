use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A nestable bucket of shared configuration. Groups form a forest through
/// `parent_id`; hosts and child groups inherit the variables and template of
/// every ancestor, nearer layers winning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique key.
    pub id: String,

    #[serde(default)]
    pub vars: HashMap<String, String>,

    /// Parent group, or empty for a root.
    #[serde(default)]
    pub parent_id: String,

    /// Template applied to members unless a nearer layer overrides it.
    #[serde(default)]
    pub template_id: String,

    /// Back-references: hosts currently assigned to this group. Maintained by
    /// the repository, no duplicates, order-insensitive.
    #[serde(default)]
    pub hosts_ids: Vec<String>,

    /// Back-references: direct child groups.
    #[serde(default)]
    pub group_ids: Vec<String>,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    /// Add a host back-reference; inserting an already-present id is a no-op.
    pub fn add_host(&mut self, host_id: &str) {
        if !self.hosts_ids.iter().any(|id| id == host_id) {
            self.hosts_ids.push(host_id.to_string());
        }
    }

    pub fn remove_host(&mut self, host_id: &str) {
        self.hosts_ids.retain(|id| id != host_id);
    }

    /// Add a child-group back-reference; idempotent like [`Group::add_host`].
    pub fn add_group(&mut self, group_id: &str) {
        if !self.group_ids.iter().any(|id| id == group_id) {
            self.group_ids.push(group_id.to_string());
        }
    }

    pub fn remove_group(&mut self, group_id: &str) {
        self.group_ids.retain(|id| id != group_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_host_is_idempotent() {
        let mut group = Group::new("rack-1");
        group.add_host("node-1");
        group.add_host("node-2");
        group.add_host("node-1");
        assert_eq!(group.hosts_ids, vec!["node-1", "node-2"]);
    }

    #[test]
    fn remove_host_missing_is_noop() {
        let mut group = Group::new("rack-1");
        group.add_host("node-1");
        group.remove_host("node-2");
        group.remove_host("node-1");
        assert!(group.hosts_ids.is_empty());
    }

    #[test]
    fn child_group_back_references() {
        let mut group = Group::new("dc");
        group.add_group("rack-1");
        group.add_group("rack-1");
        assert_eq!(group.group_ids, vec!["rack-1"]);
        group.remove_group("rack-1");
        assert!(group.group_ids.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let group = Group::new("rack-1")
            .with_var("env", "prod")
            .with_parent("dc")
            .with_template("ubuntu");
        let json = serde_json::to_string(&group).unwrap();
        assert!(json.contains("parentId"));
        let parsed: Group = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, group);
    }
}
