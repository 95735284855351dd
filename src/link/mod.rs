//! Wireless link providers
//!
//! The supervisor only needs to know whether the link is up and to nudge it
//! towards coming up. Association itself is owned by the host network stack.

use crate::config::LinkSection;
use crate::error::LinkError;
use async_trait::async_trait;
use std::time::Duration;

pub mod sysfs;

pub use sysfs::SysfsLink;

/// Current state of the wireless link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

impl LinkStatus {
    pub fn is_up(self) -> bool {
        matches!(self, LinkStatus::Up)
    }
}

/// Establishes and queries the wireless network link
#[async_trait]
pub trait LinkProvider: Send {
    /// Non-blocking status query
    fn status(&mut self) -> LinkStatus;

    /// One bounded establishment step; `Err` means the link is not up yet
    async fn establish(&mut self) -> Result<(), LinkError>;
}

/// Link for hosts with wired or externally managed networking: always up
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticLink;

#[async_trait]
impl LinkProvider for StaticLink {
    fn status(&mut self) -> LinkStatus {
        LinkStatus::Up
    }

    async fn establish(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Link provider selected from configuration
#[derive(Debug, Clone)]
pub enum HostLink {
    Sysfs(SysfsLink),
    Static(StaticLink),
}

impl HostLink {
    /// Watch the configured interface, or assume the link is up when none is set
    pub fn from_config(section: &LinkSection) -> Self {
        match &section.interface {
            Some(interface) => HostLink::Sysfs(SysfsLink::new(
                interface.as_str(),
                Duration::from_millis(section.poll_wait_ms),
            )),
            None => HostLink::Static(StaticLink),
        }
    }
}

#[async_trait]
impl LinkProvider for HostLink {
    fn status(&mut self) -> LinkStatus {
        match self {
            HostLink::Sysfs(link) => link.status(),
            HostLink::Static(link) => link.status(),
        }
    }

    async fn establish(&mut self) -> Result<(), LinkError> {
        match self {
            HostLink::Sysfs(link) => link.establish().await,
            HostLink::Static(link) => link.establish().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_link_from_config() {
        let section = LinkSection {
            interface: Some("wlan0".to_string()),
            poll_wait_ms: 250,
        };
        match HostLink::from_config(&section) {
            HostLink::Sysfs(link) => assert_eq!(link.interface(), "wlan0"),
            other => panic!("Expected sysfs link, got {other:?}"),
        }

        assert!(matches!(
            HostLink::from_config(&LinkSection::default()),
            HostLink::Static(_)
        ));
    }

    #[tokio::test]
    async fn test_static_link_is_always_up() {
        let mut link = StaticLink;
        assert!(link.status().is_up());
        assert!(link.establish().await.is_ok());
    }
}
