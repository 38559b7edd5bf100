//! Mayfly boot-script compilation
//!
//! Ties the repository to the bootloader: given a host id or a bare hardware
//! address, walk the group-inheritance chain, merge variables, pick the
//! effective template and render it into the script the machine will boot.
//!
//! # Example
//!
//! ```ignore
//! use mayfly_ipxe::render_for_mac;
//!
//! let script = render_for_mac(&repository, "aa-bb-cc-dd-ee-ff").await?;
//! assert!(script.starts_with("#!ipxe"));
//! ```

pub mod error;
pub mod resolve;
pub mod script;

pub use error::{IpxeError, Result};
pub use resolve::{overlay, resolve_host, ResolvedConfig};
pub use script::render;

use mayfly_store::Repository;

/// Resolve and render the boot script for a host id.
pub async fn render_for_host(repository: &Repository, host_id: &str) -> Result<String> {
    repository
        .read(|session| {
            let resolved = resolve_host(session, host_id)?;
            render(&resolved)
        })
        .await
}

/// Resolve and render the boot script for the host owning a hardware
/// address. This is the entry point the boot path uses: at PXE time the MAC
/// is the machine's only identity.
pub async fn render_for_mac(repository: &Repository, mac: &str) -> Result<String> {
    repository
        .read(|session| {
            let host = session
                .hosts()
                .find_by_hardware_addr(mac)
                .map_err(|_| IpxeError::HostNotFound(mac.to_string()))?;
            let resolved = resolve_host(session, &host.id)?;
            render(&resolved)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mayfly_store::entity::{Group, Host, Template};
    use mayfly_store::StoreError;

    /// The full pipeline: template on a group, host resolved by MAC, host
    /// override applied on re-resolution.
    #[tokio::test]
    async fn end_to_end_boot_script_by_mac() {
        let repo = Repository::memory();
        repo.write(|s| {
            s.templates().create(Template::new(
                "t1",
                "#!boot {{ get_var(\"env\", \"dev\") }}",
            ))?;
            s.groups()
                .create(Group::new("g").with_var("env", "prod").with_template("t1"))?;
            s.hosts().create(
                Host::new("h")
                    .with_group("g")
                    .with_hardware_addr("aa-bb-cc-dd-ee-ff"),
            )?;
            Ok::<(), StoreError>(())
        })
        .await
        .unwrap();

        let script = render_for_mac(&repo, "aa-bb-cc-dd-ee-ff").await.unwrap();
        assert_eq!(script, "#!boot prod");

        // The host layer wins once it sets the variable itself.
        repo.write(|s| {
            let mut host = s.hosts().get("h")?;
            host.vars.insert("env".to_string(), "staging".to_string());
            s.hosts().update(host)
        })
        .await
        .unwrap();

        let script = render_for_mac(&repo, "aa-bb-cc-dd-ee-ff").await.unwrap();
        assert_eq!(script, "#!boot staging");
    }

    #[tokio::test]
    async fn unknown_mac_is_host_not_found() {
        let repo = Repository::memory();
        let err = render_for_mac(&repo, "00-00-00-00-00-00").await.unwrap_err();
        assert!(matches!(err, IpxeError::HostNotFound(mac) if mac == "00-00-00-00-00-00"));
    }

    #[tokio::test]
    async fn render_for_host_without_template_fails() {
        let repo = Repository::memory();
        repo.write(|s| s.hosts().create(Host::new("h")))
            .await
            .unwrap();
        let err = render_for_host(&repo, "h").await.unwrap_err();
        assert!(matches!(err, IpxeError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn repeated_render_is_byte_identical() {
        let repo = Repository::memory();
        repo.write(|s| {
            s.templates()
                .create(Template::new("t", "#!ipxe\nkernel {{ vars.kernel }}"))?;
            s.hosts().create(
                Host::new("h")
                    .with_template("t")
                    .with_var("kernel", "vmlinuz"),
            )?;
            Ok::<(), StoreError>(())
        })
        .await
        .unwrap();

        let first = render_for_host(&repo, "h").await.unwrap();
        let second = render_for_host(&repo, "h").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "#!ipxe\nkernel vmlinuz");
    }
}
