//! Boot-file locator chain.
//!
//! An inbound boot-protocol request carries nothing but a path. The chain
//! tries an ordered list of handlers; the first one that does not report
//! "not found" wins. Errors other than NotFound are logged and the chain
//! moves on, since a broken template must not keep the next locator from
//! serving firmware.

use async_trait::async_trait;
use bytes::Bytes;
use mayfly_ipxe::IpxeError;
use mayfly_store::Repository;
use mayfly_tftp::FileSource;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Conventional filename for the legacy-BIOS iPXE build.
pub const BIOS_FIRMWARE: &str = "undionly.kpxe";

/// Conventional filename for the UEFI iPXE build.
pub const UEFI_FIRMWARE: &str = "ipxe.efi";

/// Error type for lookups.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// The handler (or the whole chain) has nothing for this path.
    #[error("file not found")]
    NotFound,

    /// Boot-script compilation failed for a path that did match.
    #[error("boot script compilation failed: {0}")]
    Script(#[from] IpxeError),

    /// Filesystem failure in the static locator.
    #[error("error reading static file: {0}")]
    Io(#[from] std::io::Error),
}

/// One lookup handler in the chain.
#[async_trait]
pub trait FileLocator: Send + Sync {
    async fn lookup(&self, path: &str) -> Result<Bytes, LocatorError>;
}

/// Serves boot-firmware blobs from memory.
///
/// The blob store is owned and injected, not ambient: whoever builds the
/// chain decides which firmware images exist.
#[derive(Debug, Default)]
pub struct FirmwareLocator {
    blobs: HashMap<String, Bytes>,
}

impl FirmwareLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, blob: impl Into<Bytes>) {
        self.blobs.insert(name.into(), blob.into());
    }

    /// Load the well-known firmware images from `dir`, skipping absent ones.
    pub async fn load_dir(&mut self, dir: &Path) -> std::io::Result<()> {
        for name in [BIOS_FIRMWARE, UEFI_FIRMWARE] {
            match tokio::fs::read(dir.join(name)).await {
                Ok(blob) => {
                    debug!(name, bytes = blob.len(), "loaded firmware image");
                    self.insert(name, blob);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(name, "firmware image not present, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileLocator for FirmwareLocator {
    async fn lookup(&self, path: &str) -> Result<Bytes, LocatorError> {
        self.blobs.get(path).cloned().ok_or(LocatorError::NotFound)
    }
}

/// Renders per-host boot scripts for MAC-addressed request paths.
///
/// Recognized forms, always matched lowercase:
/// - `mac-aa-bb-cc-dd-ee-ff.ipxe` (iPXE chainload convention)
/// - `pxelinux.cfg/01-aa-bb-cc-dd-ee-ff` (PXELINUX convention, the leading
///   two hex digits are the ARP hardware type)
pub struct BootScriptLocator {
    repository: Repository,
    ipxe_path: Regex,
    pxelinux_path: Regex,
}

impl BootScriptLocator {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            ipxe_path: Regex::new(r"^mac-((?:[0-9a-f]{2}-){5}[0-9a-f]{2})\.ipxe$")
                .expect("hardwired pattern"),
            pxelinux_path: Regex::new(r"^pxelinux\.cfg/[0-9a-f]{2}-((?:[0-9a-f]{2}-){5}[0-9a-f]{2})$")
                .expect("hardwired pattern"),
        }
    }

    /// Extract the hardware address from a boot path, if it is one.
    fn mac_from_path(&self, path: &str) -> Option<String> {
        self.ipxe_path
            .captures(path)
            .or_else(|| self.pxelinux_path.captures(path))
            .map(|captures| captures[1].to_string())
    }
}

#[async_trait]
impl FileLocator for BootScriptLocator {
    async fn lookup(&self, path: &str) -> Result<Bytes, LocatorError> {
        let path = path.to_ascii_lowercase();
        let mac = self.mac_from_path(&path).ok_or(LocatorError::NotFound)?;
        let script = mayfly_ipxe::render_for_mac(&self.repository, &mac).await?;
        Ok(Bytes::from(script))
    }
}

/// Serves files from a directory, for kernels/initrds and other static
/// payloads next to the firmware.
pub struct StaticDirLocator {
    base_dir: PathBuf,
}

impl StaticDirLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl FileLocator for StaticDirLocator {
    async fn lookup(&self, path: &str) -> Result<Bytes, LocatorError> {
        // Only plain relative paths; anything traversing upwards is nobody's
        // file.
        let relative = Path::new(path.trim_start_matches('/'));
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(LocatorError::NotFound);
        }

        match tokio::fs::read(self.base_dir.join(relative)).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(LocatorError::NotFound),
            Err(err) => Err(LocatorError::Io(err)),
        }
    }
}

/// Ordered list of handlers; first non-NotFound success wins.
#[derive(Default)]
pub struct LocatorChain {
    locators: Vec<Arc<dyn FileLocator>>,
}

impl LocatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: Arc<dyn FileLocator>) -> Self {
        self.locators.push(locator);
        self
    }

    pub async fn lookup(&self, path: &str) -> Result<Bytes, LocatorError> {
        for locator in &self.locators {
            match locator.lookup(path).await {
                Ok(content) => return Ok(content),
                Err(LocatorError::NotFound) => continue,
                Err(err) => {
                    warn!(path, error = %err, "locator failed, trying next");
                    continue;
                }
            }
        }
        Err(LocatorError::NotFound)
    }
}

#[async_trait]
impl FileSource for LocatorChain {
    async fn fetch(&self, path: &str) -> Option<Bytes> {
        self.lookup(path).await.ok()
    }
}
