// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Resolution of switchdev representors from sysfs metadata.
//!
//! On a NIC whose embedded switch is in switchdev mode, the kernel exposes one netdev per switch
//! port: the uplink (the physical port) and a representor per VF.
//! This crate answers two questions from the metadata the kernel publishes under sysfs:
//!
//! 1. which netdev is the uplink representor for the VF at a given PCI address
//!    ([`Resolver::resolve_uplink`]), and
//! 2. which netdev represents VF number `n` behind a given uplink
//!    ([`Resolver::resolve_vf_representor`]).
//!
//! Each query is a one-shot look at the current metadata; nothing is cached.
//!
//! ```no_run
//! use switchdev_representor::{PciEbdf, Resolver};
//!
//! let resolver = Resolver::host()?;
//! let vf = PciEbdf::try_new("0000:03:00.4")?;
//! let uplink = resolver.resolve_uplink(&vf)?;
//! let representor = resolver.resolve_vf_representor(&uplink, 4)?;
//! println!("{vf} is represented by {representor} behind {uplink}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::pedantic, clippy::unwrap_used)]

pub mod layout;
pub mod pci;
pub mod port_name;
pub mod representor;
mod resolver;
pub mod switch;
pub mod uplink;

pub use layout::{NetdevAttribute, SysfsLayout, SysfsLayoutBuilder};
pub use pci::{PciEbdf, PciEbdfError, PciFunctionError};
pub use port_name::{ParsedPortName, PortNameParseError};
pub use representor::VfRepresentorError;
pub use resolver::Resolver;
pub use switch::{SwitchId, SwitchIdError, SwitchIdReadError};
pub use uplink::UplinkError;
