// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Where the kernel puts the metadata we need.
//!
//! The path conventions must match the kernel's sysfs layout exactly:
//!
//! | what                               | path                                    |
//! |------------------------------------|-----------------------------------------|
//! | netdevs of a VF's parent PF        | `<pci_devices>/<vf>/physfn/net/`        |
//! | switch identity                    | `<class_net>/<dev>/phys_switch_id`      |
//! | port name                          | `<class_net>/<dev>/phys_port_name`      |
//! | siblings of a netdev               | `<class_net>/<dev>/subsystem/`          |
//! | udev properties of the bus device  | `<class_net>/<dev>/device/uevent`       |

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use sysfs::SysfsPath;

use crate::pci::PciEbdf;

/// Attributes of a netdevice which we read under `<class_net>/<dev>/`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr)]
pub enum NetdevAttribute {
    /// Identity of the embedded switch the netdev is a port of.
    #[strum(serialize = "phys_switch_id")]
    PhysSwitchId,
    /// Role / index of the netdev within its embedded switch.
    #[strum(serialize = "phys_port_name")]
    PhysPortName,
    /// udev properties of the device backing the netdev (follows the `device` link).
    #[strum(serialize = "device/uevent")]
    DeviceUevent,
}

impl std::fmt::Display for NetdevAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &'static str = self.into();
        write!(f, "{s}")
    }
}

/// Location of the two sysfs directories resolution works from.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SysfsLayout {
    /// Directory holding one entry per PCI device, named by EBDF.
    #[builder(setter(into), default = "PathBuf::from(SysfsLayout::PCI_DEVICES)")]
    pub pci_devices: PathBuf,
    /// Directory holding one entry per netdevice, named by interface name.
    #[builder(setter(into), default = "PathBuf::from(SysfsLayout::CLASS_NET)")]
    pub class_net: PathBuf,
}

impl Default for SysfsLayout {
    fn default() -> Self {
        SysfsLayout {
            pci_devices: PathBuf::from(Self::PCI_DEVICES),
            class_net: PathBuf::from(Self::CLASS_NET),
        }
    }
}

impl SysfsLayout {
    /// PCI device directory of a conventionally mounted sysfs.
    pub const PCI_DEVICES: &'static str = "/sys/bus/pci/devices";
    /// netdev class directory of a conventionally mounted sysfs.
    pub const CLASS_NET: &'static str = "/sys/class/net";

    /// Layout of a sysfs mounted at `root`.
    #[must_use]
    pub fn under(root: &SysfsPath) -> SysfsLayout {
        SysfsLayout::rooted(root.inner())
    }

    /// Layout of a sysfs-shaped tree at `root`, checked or not.
    #[must_use]
    pub fn rooted(root: impl AsRef<Path>) -> SysfsLayout {
        let root = root.as_ref();
        SysfsLayout {
            pci_devices: root.join("bus/pci/devices"),
            class_net: root.join("class/net"),
        }
    }

    /// Directory listing the netdevs bound to the physical function a VF belongs to.
    #[must_use]
    pub fn pf_netdevs(&self, vf: &PciEbdf) -> PathBuf {
        self.pci_devices.join(vf.to_string()).join("physfn/net")
    }

    /// Path to an attribute of a netdev.
    #[must_use]
    pub fn netdev_attribute(&self, netdev: &str, attribute: NetdevAttribute) -> PathBuf {
        let attribute: &'static str = attribute.into();
        self.class_net.join(netdev).join(attribute)
    }

    /// Directory listing all netdevs of the same class as `netdev`.
    #[must_use]
    pub fn subsystem(&self, netdev: &str) -> PathBuf {
        self.class_net.join(netdev).join("subsystem")
    }
}
