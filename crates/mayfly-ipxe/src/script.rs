//! Boot-script rendering.
//!
//! The resolved template body is rendered with minijinja. The context exposes
//! `host_id`, `template_id` and the merged `vars` map; `get_var(key, default)`
//! is available as a function for templates that want a fallback instead of a
//! hard failure on absent keys. Undefined references are strict: a template
//! that names a missing field fails to render rather than silently emitting
//! nothing a bootloader would choke on.

use crate::error::{IpxeError, Result};
use crate::resolve::ResolvedConfig;
use minijinja::{context, Environment, UndefinedBehavior};

/// Render the boot script for a resolved host configuration.
pub fn render(resolved: &ResolvedConfig) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let vars = resolved.vars.clone();
    env.add_function("get_var", move |key: String, default: String| {
        vars.get(&key).cloned().unwrap_or(default)
    });

    env.add_template(&resolved.template_id, &resolved.template_body)
        .map_err(|source| IpxeError::TemplateParse {
            name: resolved.template_id.clone(),
            source,
        })?;

    let template = env
        .get_template(&resolved.template_id)
        .map_err(|source| IpxeError::TemplateParse {
            name: resolved.template_id.clone(),
            source,
        })?;

    template
        .render(context! {
            host_id => resolved.host_id,
            template_id => resolved.template_id,
            vars => resolved.vars,
            template_body => resolved.template_body,
        })
        .map_err(|source| IpxeError::TemplateRender {
            name: resolved.template_id.clone(),
            source,
        })
}
