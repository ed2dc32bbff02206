// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Embedded switch membership.

use std::fmt::{Debug, Display, Formatter, LowerHex};

use arrayvec::ArrayVec;
use sysfs::{SysfsErr, SysfsRead};
use tracing::trace;

use crate::layout::NetdevAttribute;
use crate::resolver::Resolver;

/// The kernel renders its (at most 32 byte) switch id as hex plus a trailing newline.
const SWITCH_ID_MAX_LEN: usize = 2 * 32 + 1;

/// The raw content of a netdev's `phys_switch_id` attribute.
///
/// Equality is byte equality on the raw attribute content; no trimming happens here.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct SwitchId(ArrayVec<u8, SWITCH_ID_MAX_LEN>);

#[derive(thiserror::Error, Debug)]
pub enum SwitchIdError {
    #[error("SwitchId is empty")]
    Empty,
    #[error("Maximum length of a SwitchId is {max} bytes, received {0} bytes", max = SwitchId::MAX_LEN)]
    InvalidLength(usize),
}

/// Errors which may occur when reading a netdev's switch id.
#[derive(thiserror::Error, Debug)]
pub enum SwitchIdReadError {
    #[error(transparent)]
    Sysfs(#[from] SysfsErr),
    #[error(transparent)]
    Invalid(#[from] SwitchIdError),
}

impl SwitchId {
    /// The maximum length of a [`SwitchId`] in bytes
    pub const MAX_LEN: usize = SWITCH_ID_MAX_LEN;

    /// Create a new [`SwitchId`] from a raw byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the raw byte slice is empty or if it is longer than
    /// [`SwitchId::MAX_LEN`] bytes
    pub fn new(raw: impl AsRef<[u8]>) -> Result<Self, SwitchIdError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(SwitchIdError::Empty);
        }
        ArrayVec::try_from(raw)
            .map(SwitchId)
            .map_err(|_| SwitchIdError::InvalidLength(raw.len()))
    }

    /// The raw bytes of the id.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl LowerHex for SwitchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let as_str = self
            .0
            .iter()
            .fold(String::with_capacity(self.0.len() * 2), |acc, byte| {
                acc + &format!("{byte:02x}")
            });
        write!(f, "{as_str}")
    }
}

impl Debug for SwitchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

// sysfs renders switch ids as ascii hex, so show them the way the kernel does
impl Display for SwitchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0).trim_end())
    }
}

impl<F: SysfsRead> Resolver<F> {
    /// Read the switch id of `netdev`.
    ///
    /// # Errors
    ///
    /// Fails if the attribute can not be read or holds an empty or oversized id.
    pub fn read_switch_id(&self, netdev: &str) -> Result<SwitchId, SwitchIdReadError> {
        let raw = self.read_netdev_attribute(netdev, NetdevAttribute::PhysSwitchId)?;
        Ok(SwitchId::new(raw)?)
    }

    /// Returns true if `netdev` is a port of a switchdev-mode embedded switch.
    ///
    /// True iff `phys_switch_id` can be read and is non-empty.
    /// The check is on the raw attribute: whitespace-only content still counts as an id, and so
    /// does content too long to be a [`SwitchId`].
    pub fn is_switchdev(&self, netdev: &str) -> bool {
        match self.read_netdev_attribute(netdev, NetdevAttribute::PhysSwitchId) {
            Ok(raw) if raw.is_empty() => {
                trace!("{netdev} is not switchdev: {}", SwitchIdError::Empty);
                false
            }
            Ok(_) => true,
            Err(err) => {
                trace!("{netdev} is not switchdev: {err}");
                false
            }
        }
    }
}
