// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI addressing of netdevices.

use std::fmt::{Display, Formatter};

use sysfs::{SysfsErr, SysfsRead};

use crate::layout::NetdevAttribute;
use crate::resolver::Resolver;

/// A PCI "extended" bus device function string (e.g. "0000:03:00.4")
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct PciEbdf(String);

/// Errors that can occur when parsing a PCI Ebdf string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PciEbdfError {
    /// The PCI Ebdf string is not valid
    #[error("Invalid PCI Ebdf format: {0}")]
    InvalidFormat(String),
}

impl PciEbdf {
    /// Parse a string and confirm it is a valid PCI Ebdf string
    ///
    /// The string must be `DDDD:BB:DD.F` with hexadecimal digits throughout.
    /// The kernel pads the domain to four digits but prints domains above `ffff` in full
    /// (e.g. `10000:e0:06.0` behind a VMD controller), so four to eight domain digits are accepted.
    ///
    /// # Errors
    ///
    /// * `PciEbdfError::InvalidFormat` if the string is not a valid PCI Ebdf string
    pub fn try_new(s: impl Into<String>) -> Result<PciEbdf, PciEbdfError> {
        use PciEbdfError::InvalidFormat;
        let s = s.into();
        if !s.is_ascii() {
            return Err(InvalidFormat(s));
        }
        let split: Vec<_> = s.split(':').collect();
        if split.len() != 3 {
            return Err(InvalidFormat(s));
        }
        let domain = split[0];
        let bus = split[1];
        let dev_and_func = split[2];
        let split: Vec<_> = dev_and_func.split('.').collect();
        if split.len() != 2 {
            return Err(InvalidFormat(s));
        }
        let dev = split[0];
        let func = split[1];
        if !(4..=8).contains(&domain.len())
            || bus.len() != 2
            || dev.len() != 2
            || func.len() != 1
        {
            return Err(InvalidFormat(s));
        }
        if [domain, bus, dev, func]
            .iter()
            .any(|part| part.chars().any(|c| !c.is_ascii_hexdigit()))
        {
            return Err(InvalidFormat(s));
        }
        Ok(PciEbdf(s))
    }

    /// The PCI function number: the final character of the address, read as a decimal digit.
    ///
    /// Returns `None` if that character is a hex digit outside `0-9`.
    #[must_use]
    pub fn function(&self) -> Option<u8> {
        self.0
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .and_then(|digit| u8::try_from(digit).ok())
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PciEbdf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for PciEbdf {
    type Error = PciEbdfError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        PciEbdf::try_new(value)
    }
}

impl TryFrom<String> for PciEbdf {
    type Error = PciEbdfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PciEbdf::try_new(value)
    }
}

impl From<PciEbdf> for String {
    fn from(value: PciEbdf) -> String {
        value.0
    }
}

impl std::str::FromStr for PciEbdf {
    type Err = PciEbdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PciEbdf::try_new(s)
    }
}

/// Errors which may occur when finding the PCI function of a netdev.
#[derive(Debug, thiserror::Error)]
pub enum PciFunctionError {
    /// The udev properties of the backing device could not be read.
    #[error("unable to read bus device properties of {netdev}: {source}")]
    Read {
        netdev: String,
        #[source]
        source: SysfsErr,
    },
    /// The backing device does not report a PCI slot (it is likely not a PCI device).
    #[error("{netdev} does not report a PCI slot name")]
    MissingSlotName { netdev: String },
    /// The reported slot name is not a PCI Ebdf.
    #[error("{netdev} reports an invalid PCI address")]
    InvalidAddress {
        netdev: String,
        #[source]
        source: PciEbdfError,
    },
    /// The final character of the address is not numeric.
    #[error("PCI address {address} of {netdev} has a non-numeric function")]
    NonNumericFunction { netdev: String, address: PciEbdf },
}

const PCI_SLOT_NAME: &str = "PCI_SLOT_NAME=";

impl<F: SysfsRead> Resolver<F> {
    /// Find the PCI address of the device backing `netdev`.
    ///
    /// # Errors
    ///
    /// Fails if the device's uevent properties can not be read, carry no `PCI_SLOT_NAME`, or carry
    /// an invalid address.
    pub fn pci_address(&self, netdev: &str) -> Result<PciEbdf, PciFunctionError> {
        let uevent = self
            .read_netdev_attribute(netdev, NetdevAttribute::DeviceUevent)
            .map_err(|source| PciFunctionError::Read {
                netdev: netdev.to_string(),
                source,
            })?;
        let uevent = String::from_utf8_lossy(&uevent);
        let slot = uevent
            .lines()
            .find_map(|line| line.trim().strip_prefix(PCI_SLOT_NAME))
            .ok_or_else(|| PciFunctionError::MissingSlotName {
                netdev: netdev.to_string(),
            })?;
        PciEbdf::try_new(slot.trim()).map_err(|source| PciFunctionError::InvalidAddress {
            netdev: netdev.to_string(),
            source,
        })
    }

    /// Find the PCI function number of the device backing `netdev`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::pci_address`]; additionally fails if the function is not numeric.
    pub fn pci_function(&self, netdev: &str) -> Result<u8, PciFunctionError> {
        let address = self.pci_address(netdev)?;
        address
            .function()
            .ok_or_else(|| PciFunctionError::NonNumericFunction {
                netdev: netdev.to_string(),
                address,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_parse() {
        let ebdf = PciEbdf::try_new("0000:03:00.4").unwrap();
        assert_eq!(ebdf.as_str(), "0000:03:00.4");
        assert_eq!(ebdf.function(), Some(4));
    }

    #[test]
    fn basic_parse_invalid() {
        for s in [
            "",
            "0000:00:0x3.0",
            "0000:00:03",
            "000:00:03.0",
            "0000:00:03.00",
            "0000:00:00:03.0",
            "0000:00:03.0\n",
            "0000:0g:03.0",
            "100000000:00:03.0",
        ] {
            assert!(PciEbdf::try_new(s).is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn wide_domains_parse() {
        let ebdf = PciEbdf::try_new("10000:e0:06.0").unwrap();
        assert_eq!(ebdf.as_str(), "10000:e0:06.0");
        assert_eq!(ebdf.function(), Some(0));
        assert_eq!(
            PciEbdf::try_new("ffffffff:00:1f.7").unwrap().function(),
            Some(7)
        );
    }

    #[test]
    fn hex_function_is_not_numeric() {
        let ebdf = PciEbdf::try_new("0000:03:00.a").unwrap();
        assert_eq!(ebdf.function(), None);
    }

    #[test]
    fn generated_addresses_have_their_function() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(domain, bus, device, function): (u16, u8, u8, u8)| {
                let device = device & 0x1f;
                let function = function & 0x7;
                let s = format!("{domain:04x}:{bus:02x}:{device:02x}.{function:01x}");
                let ebdf = PciEbdf::try_new(s.as_str()).unwrap();
                assert_eq!(ebdf.to_string(), s);
                assert_eq!(ebdf.function(), Some(function));
            });
    }
}
