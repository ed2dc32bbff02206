// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use sysfs::{HostSysfs, SysfsErr, SysfsRead};

use crate::layout::{NetdevAttribute, SysfsLayout};

/// Resolves uplink and VF representors from sysfs metadata.
///
/// The resolver binds a [`SysfsRead`] capability and a [`SysfsLayout`] at construction and holds
/// no other state; every query re-reads the metadata it needs.
#[derive(Debug, Clone)]
pub struct Resolver<F> {
    fs: F,
    layout: SysfsLayout,
}

impl<F: SysfsRead> Resolver<F> {
    /// Create a resolver reading through `fs` at the locations described by `layout`.
    #[must_use]
    pub fn new(fs: F, layout: SysfsLayout) -> Resolver<F> {
        Resolver { fs, layout }
    }

    /// The sysfs locations this resolver reads from.
    #[must_use]
    pub fn layout(&self) -> &SysfsLayout {
        &self.layout
    }

    /// The capability every read goes through.
    #[must_use]
    pub fn sysfs(&self) -> &F {
        &self.fs
    }

    pub(crate) fn read_netdev_attribute(
        &self,
        netdev: &str,
        attribute: NetdevAttribute,
    ) -> Result<Vec<u8>, SysfsErr> {
        self.fs
            .read_attribute(&self.layout.netdev_attribute(netdev, attribute))
    }

    /// Read the port name of `netdev`, with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// Fails if the attribute does not exist (common on older kernels) or can not be read.
    pub fn port_name(&self, netdev: &str) -> Result<String, SysfsErr> {
        let raw = self.read_netdev_attribute(netdev, NetdevAttribute::PhysPortName)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

impl Resolver<HostSysfs> {
    /// Create a resolver over the sysfs mounted on this host.
    ///
    /// # Errors
    ///
    /// Fails if sysfs can not be located unambiguously.
    pub fn host() -> Result<Resolver<HostSysfs>, SysfsErr> {
        let fs = HostSysfs::discover()?;
        let layout = SysfsLayout::under(fs.root());
        Ok(Resolver::new(fs, layout))
    }
}
