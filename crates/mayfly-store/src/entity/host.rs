use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A provisionable machine, identified by its hardware addresses until it
/// has any other identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Unique key.
    pub id: String,

    /// MAC addresses owned by this host. Each address is unique across the
    /// whole host population.
    #[serde(default)]
    pub hardware_addr: Vec<String>,

    /// First-boot capture: when set, the first boot request flips
    /// `trap_triggered`. Opaque to the resolution engine.
    #[serde(default)]
    pub trap_mode: bool,

    #[serde(default)]
    pub trap_triggered: bool,

    /// Innermost variable layer; wins over every inherited group layer.
    #[serde(default)]
    pub vars: HashMap<String, String>,

    /// Group this host belongs to, or empty.
    #[serde(default)]
    pub group_id: String,

    /// Explicit template, overriding anything inherited. Empty means
    /// "inherit from the group chain".
    #[serde(default)]
    pub template_id: String,
}

impl Host {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_hardware_addr(mut self, mac: impl Into<String>) -> Self {
        self.hardware_addr.push(mac.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    pub fn with_trap_mode(mut self, trap_mode: bool) -> Self {
        self.trap_mode = trap_mode;
        self
    }
}
