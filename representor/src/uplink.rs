// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Finding the uplink representor of a VF.

use sysfs::{SysfsErr, SysfsRead};
use tracing::{debug, instrument};

use crate::pci::PciEbdf;
use crate::port_name::is_uplink_port_name;
use crate::resolver::Resolver;

/// Errors which may occur when resolving the uplink of a VF.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    /// The netdevs of the VF's physical function could not be listed.
    #[error("failed to lookup {address}: {source}")]
    Lookup {
        address: PciEbdf,
        #[source]
        source: SysfsErr,
    },
    /// No netdev of the VF's physical function qualifies as an uplink representor.
    #[error("uplink for {0} not found")]
    NotFound(PciEbdf),
}

impl<F: SysfsRead> Resolver<F> {
    /// Find the uplink representor netdev for the VF at PCI address `vf`.
    ///
    /// Candidates are the netdevs bound to the VF's physical function, in listing order.
    /// The first one which is switchdev and either has an uplink port name (`p<N>`) or no port
    /// name at all (older kernels) wins.
    ///
    /// # Errors
    ///
    /// - [`UplinkError::Lookup`] if the candidates can not be listed.
    /// - [`UplinkError::NotFound`] if no candidate qualifies.
    #[instrument(level = "debug", skip(self), fields(vf = %vf), ret)]
    pub fn resolve_uplink(&self, vf: &PciEbdf) -> Result<String, UplinkError> {
        let candidates = self
            .sysfs()
            .list_entries(&self.layout().pf_netdevs(vf))
            .map_err(|source| UplinkError::Lookup {
                address: vf.clone(),
                source,
            })?;
        for candidate in candidates {
            if !self.is_switchdev(&candidate) {
                debug!("skipping {candidate}: not switchdev");
                continue;
            }
            match self.port_name(&candidate) {
                Ok(port_name) if !is_uplink_port_name(&port_name) => {
                    debug!("skipping {candidate}: port name {port_name} is not an uplink port");
                    continue;
                }
                Ok(port_name) => debug!("{candidate} has uplink port name {port_name}"),
                Err(err) => debug!("{candidate} has no readable port name, accepting: {err}"),
            }
            return Ok(candidate);
        }
        Err(UplinkError::NotFound(vf.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SysfsLayout;
    use sysfs::MemorySysfs;
    use tracing_test::traced_test;

    const VF: &str = "0000:03:00.4";

    fn vf() -> PciEbdf {
        PciEbdf::try_new(VF).unwrap()
    }

    fn candidate(fs: &MemorySysfs, name: &str, switch_id: Option<&str>, port: Option<&str>) {
        let layout = SysfsLayout::default();
        fs.create_dir_all(layout.pf_netdevs(&vf()).join(name))
            .unwrap();
        let dev = layout.class_net.join(name);
        fs.create_dir_all(&dev).unwrap();
        if let Some(switch_id) = switch_id {
            fs.write_attribute(dev.join("phys_switch_id"), switch_id)
                .unwrap();
        }
        if let Some(port) = port {
            fs.write_attribute(dev.join("phys_port_name"), port).unwrap();
        }
    }

    #[test]
    fn first_qualifying_candidate_wins() {
        let fs = MemorySysfs::new();
        candidate(&fs, "eth0", Some("111111"), Some("p0"));
        candidate(&fs, "eth1", Some("111111"), Some("p1"));
        let resolver = Resolver::new(&fs, SysfsLayout::default());
        assert_eq!(resolver.resolve_uplink(&vf()).unwrap(), "eth0");
    }

    #[test]
    fn non_uplink_port_names_are_skipped_not_fatal() {
        let fs = MemorySysfs::new();
        candidate(&fs, "eth0", Some("111111"), Some("pf0vf0"));
        candidate(&fs, "eth1", Some("111111"), Some("p1\n"));
        let resolver = Resolver::new(&fs, SysfsLayout::default());
        assert_eq!(resolver.resolve_uplink(&vf()).unwrap(), "eth1");
    }

    #[test]
    fn legacy_integer_port_name_is_not_an_uplink() {
        let fs = MemorySysfs::new();
        candidate(&fs, "eth0", Some("111111"), Some("0"));
        let resolver = Resolver::new(&fs, SysfsLayout::default());
        match resolver.resolve_uplink(&vf()) {
            Err(UplinkError::NotFound(address)) => assert_eq!(address, vf()),
            e => unreachable!("expected NotFound, got {e:?}"),
        }
    }

    #[test]
    #[traced_test]
    fn missing_port_name_is_accepted() {
        let fs = MemorySysfs::new();
        candidate(&fs, "eth0", Some("111111"), None);
        let resolver = Resolver::new(&fs, SysfsLayout::default());
        assert_eq!(resolver.resolve_uplink(&vf()).unwrap(), "eth0");
        assert!(logs_contain("has no readable port name, accepting"));
    }

    #[test]
    fn lookup_failure_is_not_not_found() {
        let fs = MemorySysfs::new();
        let resolver = Resolver::new(&fs, SysfsLayout::default());
        let err = resolver.resolve_uplink(&vf()).unwrap_err();
        assert!(matches!(err, UplinkError::Lookup { .. }), "{err:?}");
        assert!(err.to_string().starts_with(&format!("failed to lookup {VF}")));
    }
}
