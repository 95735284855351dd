//! Link status from `/sys/class/net/<iface>`

use super::{LinkProvider, LinkStatus};
use crate::error::LinkError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/net";

/// Watches a network interface through sysfs
#[derive(Debug, Clone)]
pub struct SysfsLink {
    interface: String,
    sysfs_root: PathBuf,
    poll_wait: Duration,
}

impl SysfsLink {
    pub fn new<S: Into<String>>(interface: S, poll_wait: Duration) -> Self {
        Self::with_root(interface, DEFAULT_SYSFS_ROOT, poll_wait)
    }

    /// Read interface state from an alternate root (used by tests)
    pub fn with_root<S: Into<String>, P: AsRef<Path>>(
        interface: S,
        sysfs_root: P,
        poll_wait: Duration,
    ) -> Self {
        Self {
            interface: interface.into(),
            sysfs_root: sysfs_root.as_ref().to_path_buf(),
            poll_wait,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn read_attr(&self, attr: &str) -> Option<String> {
        let path = self.sysfs_root.join(&self.interface).join(attr);
        match std::fs::read_to_string(&path) {
            Ok(value) => Some(value.trim().to_string()),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Interface attribute unreadable");
                None
            }
        }
    }

    fn read_status(&self) -> LinkStatus {
        link_status_from(
            self.read_attr("operstate").as_deref(),
            self.read_attr("carrier").as_deref(),
        )
    }
}

/// Interpret operstate/carrier values (pure function)
///
/// Some drivers never report operstate and leave it at "unknown"; the
/// carrier flag decides for those.
pub fn link_status_from(operstate: Option<&str>, carrier: Option<&str>) -> LinkStatus {
    match (operstate, carrier) {
        (Some("up"), _) => LinkStatus::Up,
        (Some("unknown"), Some("1")) => LinkStatus::Up,
        _ => LinkStatus::Down,
    }
}

#[async_trait]
impl LinkProvider for SysfsLink {
    fn status(&mut self) -> LinkStatus {
        self.read_status()
    }

    async fn establish(&mut self) -> Result<(), LinkError> {
        if self.read_status().is_up() {
            return Ok(());
        }

        tokio::time::sleep(self.poll_wait).await;

        if self.read_status().is_up() {
            debug!(interface = %self.interface, "Link came up");
            Ok(())
        } else {
            Err(LinkError::Unavailable {
                interface: self.interface.clone(),
            })
        }
    }
}
