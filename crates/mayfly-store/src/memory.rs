//! In-memory driver: the entity tables and their mutation rules.
//!
//! All methods here run under the session's lock; a `&mut Tables` only
//! exists inside an exclusive (write) transaction. Every mutation validates
//! fully before touching any table, so a failed write leaves the repository
//! unchanged.

use crate::entity::{Group, Host, Template};
use crate::error::{EntityKind, StoreError};
use std::collections::HashMap;

/// Normalize a hardware address for indexing: lowercase, hyphens to colons.
/// Boot firmware asks with hyphenated-lowercase MACs while operators tend to
/// write colon-separated ones; both must land on the same host.
pub(crate) fn normalize_mac(mac: &str) -> String {
    mac.to_ascii_lowercase().replace('-', ":")
}

/// The canonical entity maps plus the hardware-address secondary index.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    hosts: HashMap<String, Host>,
    groups: HashMap<String, Group>,
    templates: HashMap<String, Template>,
    /// Normalized MAC -> host id.
    mac_index: HashMap<String, String>,
}

impl Tables {
    // === Host operations ===

    pub(crate) fn create_host(&mut self, host: Host) -> Result<(), StoreError> {
        if host.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Host));
        }
        if self.hosts.contains_key(&host.id) {
            return Err(StoreError::key_exists(EntityKind::Host, &host.id));
        }
        for mac in &host.hardware_addr {
            if self.mac_index.contains_key(&normalize_mac(mac)) {
                return Err(StoreError::key_exists(EntityKind::Host, mac));
            }
        }
        self.check_host_refs(&host)?;

        for mac in &host.hardware_addr {
            self.mac_index.insert(normalize_mac(mac), host.id.clone());
        }
        if let Some(group) = self.groups.get_mut(&host.group_id) {
            group.add_host(&host.id);
        }
        self.hosts.insert(host.id.clone(), host);
        Ok(())
    }

    pub(crate) fn get_host(&self, id: &str) -> Result<Host, StoreError> {
        self.hosts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Host, id))
    }

    pub(crate) fn find_host_by_hardware_addr(&self, mac: &str) -> Result<Host, StoreError> {
        self.mac_index
            .get(&normalize_mac(mac))
            .and_then(|id| self.hosts.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Host, mac))
    }

    pub(crate) fn update_host(&mut self, host: Host) -> Result<(), StoreError> {
        if host.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Host));
        }
        let old = match self.hosts.get(&host.id) {
            Some(stored) => stored.clone(),
            None => return Err(StoreError::not_found(EntityKind::Host, &host.id)),
        };
        for mac in &host.hardware_addr {
            if let Some(owner) = self.mac_index.get(&normalize_mac(mac)) {
                if owner != &host.id {
                    return Err(StoreError::key_exists(EntityKind::Host, mac));
                }
            }
        }
        self.check_host_refs(&host)?;

        for mac in &old.hardware_addr {
            self.mac_index.remove(&normalize_mac(mac));
        }
        for mac in &host.hardware_addr {
            self.mac_index.insert(normalize_mac(mac), host.id.clone());
        }
        if old.group_id != host.group_id {
            // The old group may itself have been deleted; nothing to repair then.
            if let Some(group) = self.groups.get_mut(&old.group_id) {
                group.remove_host(&host.id);
            }
            if let Some(group) = self.groups.get_mut(&host.group_id) {
                group.add_host(&host.id);
            }
        }
        self.hosts.insert(host.id.clone(), host);
        Ok(())
    }

    pub(crate) fn delete_host(&mut self, host: &Host) -> Result<(), StoreError> {
        if host.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Host));
        }
        let old = match self.hosts.get(&host.id) {
            Some(stored) => stored.clone(),
            None => return Err(StoreError::not_found(EntityKind::Host, &host.id)),
        };

        for mac in &old.hardware_addr {
            self.mac_index.remove(&normalize_mac(mac));
        }
        if let Some(group) = self.groups.get_mut(&old.group_id) {
            group.remove_host(&old.id);
        }
        self.hosts.remove(&old.id);
        Ok(())
    }

    pub(crate) fn list_hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self.hosts.values().cloned().collect();
        hosts.sort_by(|a, b| a.id.cmp(&b.id));
        hosts
    }

    /// Referential-integrity checks shared by host create and update: a
    /// non-empty group or template reference must point at an existing entity.
    fn check_host_refs(&self, host: &Host) -> Result<(), StoreError> {
        if !host.group_id.is_empty() && !self.groups.contains_key(&host.group_id) {
            return Err(StoreError::not_found(EntityKind::Group, &host.group_id));
        }
        if !host.template_id.is_empty() && !self.templates.contains_key(&host.template_id) {
            return Err(StoreError::not_found(EntityKind::Template, &host.template_id));
        }
        Ok(())
    }

    // === Group operations ===

    pub(crate) fn create_group(&mut self, group: Group) -> Result<(), StoreError> {
        if group.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Group));
        }
        if self.groups.contains_key(&group.id) {
            return Err(StoreError::key_exists(EntityKind::Group, &group.id));
        }
        if !group.parent_id.is_empty() && !self.groups.contains_key(&group.parent_id) {
            return Err(StoreError::not_found(EntityKind::Group, &group.parent_id));
        }

        if let Some(parent) = self.groups.get_mut(&group.parent_id) {
            parent.add_group(&group.id);
        }
        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    pub(crate) fn get_group(&self, id: &str) -> Result<Group, StoreError> {
        self.groups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Group, id))
    }

    pub(crate) fn update_group(&mut self, group: Group) -> Result<(), StoreError> {
        if group.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Group));
        }
        let old = match self.groups.get(&group.id) {
            Some(stored) => stored.clone(),
            None => return Err(StoreError::not_found(EntityKind::Group, &group.id)),
        };
        if !group.parent_id.is_empty() && !self.groups.contains_key(&group.parent_id) {
            return Err(StoreError::not_found(EntityKind::Group, &group.parent_id));
        }

        if old.parent_id != group.parent_id {
            if let Some(parent) = self.groups.get_mut(&old.parent_id) {
                parent.remove_group(&group.id);
            }
            if let Some(parent) = self.groups.get_mut(&group.parent_id) {
                parent.add_group(&group.id);
            }
        }
        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    pub(crate) fn delete_group(&mut self, group: &Group) -> Result<(), StoreError> {
        if group.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Group));
        }
        let old = match self.groups.get(&group.id) {
            Some(stored) => stored.clone(),
            None => return Err(StoreError::not_found(EntityKind::Group, &group.id)),
        };

        // Detach from the parent's back-references; member hosts and child
        // groups keep their (now dangling) references, resolution reports
        // them as missing.
        if let Some(parent) = self.groups.get_mut(&old.parent_id) {
            parent.remove_group(&old.id);
        }
        self.groups.remove(&old.id);
        Ok(())
    }

    pub(crate) fn list_groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }

    // === Template operations ===

    pub(crate) fn create_template(&mut self, template: Template) -> Result<(), StoreError> {
        if template.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Template));
        }
        if self.templates.contains_key(&template.id) {
            return Err(StoreError::key_exists(EntityKind::Template, &template.id));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub(crate) fn get_template(&self, id: &str) -> Result<Template, StoreError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Template, id))
    }

    pub(crate) fn update_template(&mut self, template: Template) -> Result<(), StoreError> {
        if template.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Template));
        }
        if !self.templates.contains_key(&template.id) {
            return Err(StoreError::not_found(EntityKind::Template, &template.id));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub(crate) fn delete_template(&mut self, template: &Template) -> Result<(), StoreError> {
        if template.id.is_empty() {
            return Err(StoreError::empty_key(EntityKind::Template));
        }
        if self.templates.remove(&template.id).is_none() {
            return Err(StoreError::not_found(EntityKind::Template, &template.id));
        }
        Ok(())
    }

    pub(crate) fn list_templates(&self) -> Vec<Template> {
        let mut templates: Vec<Template> = self.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_mac_folds_case_and_separator() {
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn host_create_indexes_every_mac() {
        let mut tables = Tables::default();
        tables
            .create_host(
                Host::new("node-1")
                    .with_hardware_addr("AA-BB-CC-DD-EE-01")
                    .with_hardware_addr("aa:bb:cc:dd:ee:02"),
            )
            .unwrap();

        assert_eq!(
            tables
                .find_host_by_hardware_addr("aa:bb:cc:dd:ee:01")
                .unwrap()
                .id,
            "node-1"
        );
        assert_eq!(
            tables
                .find_host_by_hardware_addr("AA-BB-CC-DD-EE-02")
                .unwrap()
                .id,
            "node-1"
        );
    }

    #[test]
    fn host_create_rejects_mac_collision() {
        let mut tables = Tables::default();
        tables
            .create_host(Host::new("node-1").with_hardware_addr("aa:bb:cc:dd:ee:01"))
            .unwrap();

        // Same address in a different notation still collides.
        let err = tables
            .create_host(Host::new("node-2").with_hardware_addr("AA-BB-CC-DD-EE-01"))
            .unwrap_err();
        assert!(err.is_key_exists());
        assert!(tables.get_host("node-2").is_err());
    }

    #[test]
    fn host_create_missing_group_leaves_state_unchanged() {
        let mut tables = Tables::default();
        let err = tables
            .create_host(
                Host::new("node-1")
                    .with_hardware_addr("aa:bb:cc:dd:ee:01")
                    .with_group("nope"),
            )
            .unwrap_err();
        assert!(err.is_not_found());

        // No partial write: neither the host record nor the MAC index entry.
        assert!(tables.get_host("node-1").is_err());
        assert!(tables
            .find_host_by_hardware_addr("aa:bb:cc:dd:ee:01")
            .is_err());
    }

    #[test]
    fn host_update_reindexes_hardware_addrs() {
        let mut tables = Tables::default();
        tables
            .create_host(Host::new("node-1").with_hardware_addr("aa:bb:cc:dd:ee:01"))
            .unwrap();
        tables
            .update_host(Host::new("node-1").with_hardware_addr("aa:bb:cc:dd:ee:02"))
            .unwrap();

        assert!(tables
            .find_host_by_hardware_addr("aa:bb:cc:dd:ee:01")
            .is_err());
        assert_eq!(
            tables
                .find_host_by_hardware_addr("aa:bb:cc:dd:ee:02")
                .unwrap()
                .id,
            "node-1"
        );
    }

    #[test]
    fn host_update_keeps_own_macs() {
        let mut tables = Tables::default();
        tables
            .create_host(Host::new("node-1").with_hardware_addr("aa:bb:cc:dd:ee:01"))
            .unwrap();

        // Re-submitting the host with its own address is not a collision.
        tables
            .update_host(
                Host::new("node-1")
                    .with_hardware_addr("aa:bb:cc:dd:ee:01")
                    .with_var("env", "prod"),
            )
            .unwrap();
        assert_eq!(tables.get_host("node-1").unwrap().vars["env"], "prod");
    }

    #[test]
    fn host_group_move_updates_both_back_references() {
        let mut tables = Tables::default();
        tables.create_group(Group::new("g1")).unwrap();
        tables.create_group(Group::new("g2")).unwrap();
        tables
            .create_host(Host::new("node-1").with_group("g1"))
            .unwrap();
        assert_eq!(tables.get_group("g1").unwrap().hosts_ids, vec!["node-1"]);

        tables
            .update_host(Host::new("node-1").with_group("g2"))
            .unwrap();
        assert!(tables.get_group("g1").unwrap().hosts_ids.is_empty());
        assert_eq!(tables.get_group("g2").unwrap().hosts_ids, vec!["node-1"]);

        tables.delete_host(&Host::new("node-1")).unwrap();
        assert!(tables.get_group("g2").unwrap().hosts_ids.is_empty());
    }

    #[test]
    fn group_create_maintains_parent_children() {
        let mut tables = Tables::default();
        tables.create_group(Group::new("dc")).unwrap();
        tables
            .create_group(Group::new("rack-1").with_parent("dc"))
            .unwrap();
        assert_eq!(tables.get_group("dc").unwrap().group_ids, vec!["rack-1"]);

        tables.delete_group(&Group::new("rack-1")).unwrap();
        assert!(tables.get_group("dc").unwrap().group_ids.is_empty());
    }

    #[test]
    fn group_create_missing_parent_fails() {
        let mut tables = Tables::default();
        let err = tables
            .create_group(Group::new("rack-1").with_parent("nope"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(tables.get_group("rack-1").is_err());
    }

    #[test]
    fn group_reparent_moves_back_reference() {
        let mut tables = Tables::default();
        tables.create_group(Group::new("dc-a")).unwrap();
        tables.create_group(Group::new("dc-b")).unwrap();
        tables
            .create_group(Group::new("rack-1").with_parent("dc-a"))
            .unwrap();

        let mut rack = tables.get_group("rack-1").unwrap();
        rack.parent_id = "dc-b".to_string();
        tables.update_group(rack).unwrap();

        assert!(tables.get_group("dc-a").unwrap().group_ids.is_empty());
        assert_eq!(tables.get_group("dc-b").unwrap().group_ids, vec!["rack-1"]);
    }

    #[test]
    fn group_delete_leaves_dependents_dangling() {
        let mut tables = Tables::default();
        tables.create_group(Group::new("g1")).unwrap();
        tables
            .create_host(Host::new("node-1").with_group("g1"))
            .unwrap();

        // No cascade: the host keeps its reference to the vanished group.
        tables.delete_group(&Group::new("g1")).unwrap();
        assert_eq!(tables.get_host("node-1").unwrap().group_id, "g1");
    }

    #[test]
    fn empty_keys_rejected_everywhere() {
        let mut tables = Tables::default();
        assert!(matches!(
            tables.create_host(Host::default()),
            Err(StoreError::EmptyKey { .. })
        ));
        assert!(matches!(
            tables.update_group(Group::default()),
            Err(StoreError::EmptyKey { .. })
        ));
        assert!(matches!(
            tables.delete_template(&Template::default()),
            Err(StoreError::EmptyKey { .. })
        ));
    }

    #[test]
    fn template_crud() {
        let mut tables = Tables::default();
        tables
            .create_template(Template::new("t1", "#!ipxe"))
            .unwrap();
        assert!(tables
            .create_template(Template::new("t1", "other"))
            .unwrap_err()
            .is_key_exists());

        tables
            .update_template(Template::new("t1", "#!ipxe v2"))
            .unwrap();
        assert_eq!(tables.get_template("t1").unwrap().template, "#!ipxe v2");

        tables.delete_template(&Template::new("t1", "")).unwrap();
        assert!(tables.get_template("t1").is_err());
    }

    #[test]
    fn list_is_sorted_by_id() {
        let mut tables = Tables::default();
        tables.create_host(Host::new("b")).unwrap();
        tables.create_host(Host::new("a")).unwrap();
        let ids: Vec<String> = tables.list_hosts().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
