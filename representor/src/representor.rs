// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Finding the representor of a VF given its uplink.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::ops::ControlFlow;

use sysfs::{SysfsErr, SysfsRead};
use tracing::{debug, instrument};

use crate::port_name::ParsedPortName;
use crate::resolver::Resolver;
use crate::switch::{SwitchId, SwitchIdReadError};

/// Errors which may occur when resolving the representor of a VF.
#[derive(Debug, thiserror::Error)]
pub enum VfRepresentorError {
    /// The uplink has no usable switch id, so it can not anchor a representor search.
    #[error("unable to get switch id of uplink {uplink}: {source}")]
    SwitchId {
        uplink: String,
        #[source]
        source: SwitchIdReadError,
    },
    /// The siblings of the uplink could not be listed.
    #[error("failed to list netdevs alongside uplink {uplink}: {source}")]
    Lookup {
        uplink: String,
        #[source]
        source: SysfsErr,
    },
    /// No sibling of the uplink represents the requested VF.
    #[error("failed to find VF representor for uplink {uplink}")]
    NotFound { uplink: String },
}

/// State of one representor scan; lives only as long as the call which created it.
struct Scan<'a, F> {
    resolver: &'a Resolver<F>,
    uplink: &'a str,
    switch_id: SwitchId,
    // resolved on first need, at most once per scan
    uplink_function: OnceCell<Option<u8>>,
}

impl<F: SysfsRead> Scan<'_, F> {
    fn uplink_function(&self) -> Option<u8> {
        *self
            .uplink_function
            .get_or_init(|| match self.resolver.pci_function(self.uplink) {
                Ok(function) => Some(function),
                Err(err) => {
                    debug!(
                        "unable to find PCI function of uplink {}: {err}",
                        self.uplink
                    );
                    None
                }
            })
    }

    /// The VF index `sibling` represents, if it is a VF representor of this uplink.
    fn vf_index(&self, sibling: &str) -> Option<u32> {
        match self.resolver.read_switch_id(sibling) {
            Ok(switch_id) if switch_id == self.switch_id => {}
            Ok(switch_id) => {
                debug!(
                    "skipping {sibling}: switch id {switch_id} is not {}",
                    self.switch_id
                );
                return None;
            }
            Err(err) => {
                debug!("skipping {sibling}: no switch id: {err}");
                return None;
            }
        }
        let port_name = match self.resolver.port_name(sibling) {
            Ok(port_name) => port_name,
            Err(err) => {
                debug!("skipping {sibling}: no port name: {err}");
                return None;
            }
        };
        let parsed: ParsedPortName = match port_name.parse() {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("skipping {sibling}: {err}");
                return None;
            }
        };
        if let Some(pf) = parsed.pf {
            match self.uplink_function() {
                Some(function) if u32::from(function) == pf => {}
                Some(function) => {
                    debug!(
                        "skipping {sibling}: represents pf {pf}, uplink is function {function}"
                    );
                    return None;
                }
                None => {
                    debug!("skipping {sibling}: can not compare pf {pf} with the uplink");
                    return None;
                }
            }
        }
        Some(parsed.vf)
    }
}

impl<F: SysfsRead> Resolver<F> {
    /// Walk the VF representors of `uplink` in listing order until `visit` breaks.
    fn scan_vf_representors<B>(
        &self,
        uplink: &str,
        mut visit: impl FnMut(u32, String) -> ControlFlow<B>,
    ) -> Result<Option<B>, VfRepresentorError> {
        let switch_id = self
            .read_switch_id(uplink)
            .map_err(|source| VfRepresentorError::SwitchId {
                uplink: uplink.to_string(),
                source,
            })?;
        let siblings = self
            .sysfs()
            .list_entries(&self.layout().subsystem(uplink))
            .map_err(|source| VfRepresentorError::Lookup {
                uplink: uplink.to_string(),
                source,
            })?;
        let scan = Scan {
            resolver: self,
            uplink,
            switch_id,
            uplink_function: OnceCell::new(),
        };
        for sibling in siblings {
            if let Some(vf) = scan.vf_index(&sibling) {
                if let ControlFlow::Break(found) = visit(vf, sibling) {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Find the representor netdev of VF number `vf` behind `uplink`.
    ///
    /// A sibling of the uplink qualifies when it shares the uplink's switch id and its port name
    /// parses to `vf`.
    /// If the port name also names a PF, that PF must be the uplink's own PCI function; this keeps
    /// representors of other PFs on the same embedded switch out of the result.
    ///
    /// # Errors
    ///
    /// - [`VfRepresentorError::SwitchId`] if the uplink has no usable switch id.
    /// - [`VfRepresentorError::Lookup`] if the siblings of the uplink can not be listed.
    /// - [`VfRepresentorError::NotFound`] if no sibling qualifies.
    #[instrument(level = "debug", skip(self), ret)]
    pub fn resolve_vf_representor(
        &self,
        uplink: &str,
        vf: u32,
    ) -> Result<String, VfRepresentorError> {
        let found = self.scan_vf_representors(uplink, |index, sibling| {
            if index == vf {
                ControlFlow::Break(sibling)
            } else {
                ControlFlow::Continue(())
            }
        })?;
        found.ok_or_else(|| VfRepresentorError::NotFound {
            uplink: uplink.to_string(),
        })
    }

    /// Map every VF index behind `uplink` to its representor netdev.
    ///
    /// Qualification is as for [`Resolver::resolve_vf_representor`].
    /// If two siblings claim the same index, the first in listing order is kept.
    ///
    /// # Errors
    ///
    /// - [`VfRepresentorError::SwitchId`] if the uplink has no usable switch id.
    /// - [`VfRepresentorError::Lookup`] if the siblings of the uplink can not be listed.
    #[instrument(level = "debug", skip(self))]
    pub fn vf_representors(
        &self,
        uplink: &str,
    ) -> Result<BTreeMap<u32, String>, VfRepresentorError> {
        let mut representors = BTreeMap::new();
        self.scan_vf_representors(uplink, |index, sibling| {
            representors.entry(index).or_insert(sibling);
            ControlFlow::<()>::Continue(())
        })?;
        Ok(representors)
    }
}
