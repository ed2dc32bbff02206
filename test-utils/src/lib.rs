// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Testing utilities for switchdev representor resolution.
//!
//! [`SwitchdevFixture`] lays out, in a [`MemorySysfs`], the part of sysfs a NIC in switchdev mode
//! publishes: netdevs under `class/net` with their switch id and port name, PCI devices under
//! `bus/pci/devices`, and the links between them.
//!
//! All methods panic on failure; they are only meant for tests.

use std::path::{Path, PathBuf};

use sysfs::{MemorySysfs, SysfsErr};

/// Description of one netdev to lay out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetdevSpec {
    pub name: String,
    /// Content of `phys_port_name`; the attribute is absent when `None`.
    pub port_name: Option<String>,
    /// Content of `phys_switch_id`; the attribute is absent when `None`.
    pub switch_id: Option<String>,
    /// PCI address of the device the netdev is bound to, if any.
    pub pci: Option<String>,
}

impl NetdevSpec {
    pub fn new(name: impl Into<String>) -> NetdevSpec {
        NetdevSpec {
            name: name.into(),
            ..NetdevSpec::default()
        }
    }

    #[must_use]
    pub fn port_name(mut self, port_name: impl Into<String>) -> NetdevSpec {
        self.port_name = Some(port_name.into());
        self
    }

    #[must_use]
    pub fn switch_id(mut self, switch_id: impl Into<String>) -> NetdevSpec {
        self.switch_id = Some(switch_id.into());
        self
    }

    #[must_use]
    pub fn pci(mut self, pci: impl Into<String>) -> NetdevSpec {
        self.pci = Some(pci.into());
        self
    }
}

/// Builder of an in-memory sysfs tree shaped like a switchdev NIC.
#[derive(Debug)]
pub struct SwitchdevFixture {
    fs: MemorySysfs,
    pci_devices: PathBuf,
    class_net: PathBuf,
}

impl Default for SwitchdevFixture {
    fn default() -> Self {
        SwitchdevFixture::rooted("/sys")
    }
}

fn check(what: impl std::fmt::Display) -> impl FnOnce(SysfsErr) {
    move |err| panic!("failed to lay out {what}: {err}")
}

impl SwitchdevFixture {
    /// A fixture shaped like a sysfs mounted at `/sys`.
    #[must_use]
    pub fn new() -> SwitchdevFixture {
        SwitchdevFixture::default()
    }

    /// A fixture shaped like a sysfs mounted at `root`.
    pub fn rooted(root: impl AsRef<Path>) -> SwitchdevFixture {
        let root = root.as_ref();
        let fixture = SwitchdevFixture {
            fs: MemorySysfs::new(),
            pci_devices: root.join("bus/pci/devices"),
            class_net: root.join("class/net"),
        };
        fixture
            .fs
            .create_dir_all(&fixture.pci_devices)
            .unwrap_or_else(check("pci devices"));
        fixture
            .fs
            .create_dir_all(&fixture.class_net)
            .unwrap_or_else(check("net class"));
        fixture
    }

    pub fn pci_devices(&self) -> &Path {
        &self.pci_devices
    }

    pub fn class_net(&self) -> &Path {
        &self.class_net
    }

    pub fn sysfs(&self) -> &MemorySysfs {
        &self.fs
    }

    #[must_use]
    pub fn into_sysfs(self) -> MemorySysfs {
        self.fs
    }

    fn pci_device(&self, address: &str) -> PathBuf {
        let device = self.pci_devices.join(address);
        self.fs
            .write_attribute(
                device.join("uevent"),
                format!("DRIVER=mlx5_core\nPCI_SLOT_NAME={address}\n"),
            )
            .unwrap_or_else(check(address));
        device
    }

    /// Lay out a netdev.
    ///
    /// The netdev gets a `subsystem` link to the net class and, if it has a PCI address, a `device`
    /// link to its PCI device, which in turn lists the netdev under its `net` directory.
    pub fn netdev(&self, spec: &NetdevSpec) -> &Self {
        let dev = self.class_net.join(&spec.name);
        self.fs
            .create_dir_all(&dev)
            .unwrap_or_else(check(&spec.name));
        self.fs
            .symlink(&self.class_net, dev.join("subsystem"))
            .unwrap_or_else(check(&spec.name));
        if let Some(port_name) = &spec.port_name {
            self.fs
                .write_attribute(dev.join("phys_port_name"), port_name)
                .unwrap_or_else(check(&spec.name));
        }
        if let Some(switch_id) = &spec.switch_id {
            self.fs
                .write_attribute(dev.join("phys_switch_id"), switch_id)
                .unwrap_or_else(check(&spec.name));
        }
        if let Some(pci) = &spec.pci {
            let device = self.pci_device(pci);
            self.fs
                .create_dir_all(device.join("net").join(&spec.name))
                .unwrap_or_else(check(pci));
            self.fs
                .symlink(&device, dev.join("device"))
                .unwrap_or_else(check(&spec.name));
        }
        self
    }

    /// Lay out several netdevs.
    pub fn netdevs<'a>(&self, specs: impl IntoIterator<Item = &'a NetdevSpec>) -> &Self {
        for spec in specs {
            self.netdev(spec);
        }
        self
    }

    /// Lay out a VF at PCI address `vf` whose physical function is at `pf`.
    pub fn vf(&self, vf: &str, pf: &str) -> &Self {
        let device = self.pci_device(vf);
        let pf_device = self.pci_devices.join(pf);
        self.fs
            .create_dir_all(pf_device.join("net"))
            .unwrap_or_else(check(pf));
        self.fs
            .symlink(&pf_device, device.join("physfn"))
            .unwrap_or_else(check(vf));
        self
    }

    /// Remove a netdev the way a hot-unplug would.
    pub fn unplug(&self, spec: &NetdevSpec) -> &Self {
        self.fs.remove(self.class_net.join(&spec.name));
        if let Some(pci) = &spec.pci {
            self.fs
                .remove(self.pci_devices.join(pci).join("net").join(&spec.name));
        }
        self
    }
}
