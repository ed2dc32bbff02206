// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parsing of the `phys_port_name` attribute.
//!
//! Two encodings exist in the wild:
//!
//! - legacy kernels expose a VF representor's port name as the bare VF index (`"3"`),
//! - current kernels expose `pf<N>vf<M>` (`"pf0vf3"`), possibly with a controller prefix or other
//!   surrounding text (`"c1pf0vf3"`).
//!
//! Uplink representors use `p<N>` (`"p0"`).

use std::str::FromStr;

/// The PF / VF indices encoded in a representor's port name.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedPortName {
    /// Index of the physical function; absent in the legacy encoding.
    pub pf: Option<u32>,
    /// Index of the virtual function.
    pub vf: u32,
}

/// Errors which may occur when parsing a port name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortNameParseError {
    /// The port name is neither a bare VF index nor contains `pf<N>vf<M>`.
    #[error("failed to parse port name {0}")]
    Unrecognized(String),
}

/// Strip `prefix` from `s` and split off the run of ascii digits which follows.
///
/// Returns the digits and the remainder, or `None` if there are no digits.
fn digits_after<'a>(s: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = s.strip_prefix(prefix)?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest.split_at(end))
    }
}

impl FromStr for ParsedPortName {
    type Err = PortNameParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(vf) = trimmed.parse::<u32>() {
            return Ok(ParsedPortName { pf: None, vf });
        }
        let unrecognized = || PortNameParseError::Unrecognized(trimmed.to_string());
        // leftmost `pf<N>vf<M>` anywhere in the name, e.g. `c1pf0vf1` on external host ports
        let (pf, vf) = trimmed
            .match_indices("pf")
            .find_map(|(start, _)| {
                let (pf, rest) = digits_after(&trimmed[start..], "pf")?;
                let (vf, _) = digits_after(rest, "vf")?;
                Some((pf, vf))
            })
            .ok_or_else(unrecognized)?;
        Ok(ParsedPortName {
            pf: Some(pf.parse().map_err(|_| unrecognized())?),
            vf: vf.parse().map_err(|_| unrecognized())?,
        })
    }
}

impl std::fmt::Display for ParsedPortName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.pf {
            None => write!(f, "{}", self.vf),
            Some(pf) => write!(f, "pf{pf}vf{}", self.vf),
        }
    }
}

/// Returns true if `raw` (after trimming) is an uplink port name, i.e. `p<N>`.
#[must_use]
pub fn is_uplink_port_name(raw: &str) -> bool {
    matches!(digits_after(raw.trim(), "p"), Some((_, "")))
}
