//! Configuration resolution: walk the group-inheritance chain, merge
//! variables, pick the effective template.
//!
//! The merge is a pure function over a read session. Variables overlay
//! nearer-wins: ancestor groups first, then each descendant, then the host's
//! own vars. The effective template is the nearest explicit one; a host-level
//! template overrides everything inherited.

use crate::error::{IpxeError, Result};
use mayfly_store::Session;
use std::collections::{HashMap, HashSet};

/// The fully merged configuration for one host, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub host_id: String,
    /// The template that won the override chain.
    pub template_id: String,
    /// Merged variables, host layer last.
    pub vars: HashMap<String, String>,
    /// Raw body of the winning template.
    pub template_body: String,
}

/// Resolve a host's merged variables and effective template.
pub fn resolve_host(session: &mut Session, host_id: &str) -> Result<ResolvedConfig> {
    let host = session
        .hosts()
        .get(host_id)
        .map_err(|_| IpxeError::HostNotFound(host_id.to_string()))?;

    let mut visited = HashSet::new();
    let (group_vars, group_template_id) = merge_group_chain(session, &mut visited, &host.group_id)?;

    let vars = overlay(&group_vars, &host.vars);
    let template_id = if host.template_id.is_empty() {
        group_template_id
    } else {
        host.template_id.clone()
    };

    let template = session
        .templates()
        .get(&template_id)
        .map_err(|_| IpxeError::TemplateNotFound(template_id.clone()))?;

    Ok(ResolvedConfig {
        host_id: host.id,
        template_id,
        vars,
        template_body: template.template,
    })
}

/// Recursively merge a group and its ancestors.
///
/// Returns the merged variables (nearer group wins) and the effective
/// template id ("" when no group in the chain sets one). The visited set
/// guarantees termination: a revisited group id fails with
/// [`IpxeError::CyclicGroupReference`] instead of looping.
fn merge_group_chain(
    session: &mut Session,
    visited: &mut HashSet<String>,
    group_id: &str,
) -> Result<(HashMap<String, String>, String)> {
    if group_id.is_empty() {
        return Ok((HashMap::new(), String::new()));
    }
    if !visited.insert(group_id.to_string()) {
        return Err(IpxeError::CyclicGroupReference(group_id.to_string()));
    }

    let group = session
        .groups()
        .get(group_id)
        .map_err(|_| IpxeError::GroupNotFound(group_id.to_string()))?;

    let (parent_vars, parent_template_id) = merge_group_chain(session, visited, &group.parent_id)?;

    let vars = overlay(&parent_vars, &group.vars);
    let template_id = if group.template_id.is_empty() {
        parent_template_id
    } else {
        group.template_id.clone()
    };
    Ok((vars, template_id))
}

/// Merge two variable maps; on key collision `over` wins. Neither input is
/// mutated.
pub fn overlay(
    base: &HashMap<String, String>,
    over: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = base.clone();
    for (key, value) in over {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
