// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Read-only [sysfs] access.
//!
//! The crate exposes a deliberately narrow capability, [`SysfsRead`], with exactly two operations:
//! reading an attribute and listing the entries of a directory.
//! Everything which inspects kernel device metadata is written against that trait so that it can
//! be pointed at the real sysfs ([`HostSysfs`]) or, in tests, at an in-memory tree
//! ([`MemorySysfs`], behind the `testing` feature).
//!
//! [sysfs]: https://www.kernel.org/doc/Documentation/filesystems/sysfs.txt

#![deny(clippy::pedantic, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

mod host;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use host::*;
#[cfg(any(test, feature = "testing"))]
pub use memory::*;

/// Errors which might occur when accessing sysfs directories
#[derive(Debug, thiserror::Error)]
pub enum SysfsErr {
    /// The path is not under a mounted sysfs and therefore does not qualify as a [`SysfsPath`].
    #[error("path {0:?} is not under sysfs")]
    PathNotUnderSysfs(PathBuf),
    /// Some [`std::io::Error`] error occurred
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Invalid UTF-8 in a path under sysfs is an absolutely wild error case we expect to
    /// never see.
    ///
    /// The kernel just uses ascii byte strings for sysfs, so you should never see this
    /// error under healthy conditions.
    ///
    /// The [`SysfsErr::SysfsPathIsNotValidUtf8`] branch deliberately does not include
    /// any information about the offending string name or any derivative, even for logging
    /// or error reporting.
    /// Injecting arbitrary bytes into a system log may be what an attacker needs for lateral
    /// compromise of some other system.
    #[error("path under sysfs is not a valid UTF-8 string")]
    SysfsPathIsNotValidUtf8,
    /// No sysfs filesystem is mounted.
    #[error("sysfs is not mounted")]
    NotMounted,
    /// sysfs is mounted at more than one location and we refuse to guess which one is meant.
    #[error("suspicious configuration found: sysfs is mounted at more than one location: {0:?}")]
    MultipleMounts(Vec<PathBuf>),
}

impl SysfsErr {
    /// Returns true if this error means the requested path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SysfsErr::IoError(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// The minimal read-only surface over sysfs-like device metadata.
///
/// Implementations must not cache; every call observes the metadata as it is at the time of the
/// call.
pub trait SysfsRead {
    /// Read the full (raw, untrimmed) content of the attribute file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`SysfsErr`] if the attribute does not exist or cannot be read.
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr>;

    /// List the names of the entries of the directory at `path`.
    ///
    /// Names are returned in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns a [`SysfsErr`] if the directory does not exist, cannot be read, or contains a
    /// name which is not valid UTF-8.
    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr>;
}

impl<T: SysfsRead + ?Sized> SysfsRead for &T {
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr> {
        (**self).read_attribute(path)
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr> {
        (**self).list_entries(path)
    }
}

impl<T: SysfsRead + ?Sized> SysfsRead for Box<T> {
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr> {
        (**self).read_attribute(path)
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr> {
        (**self).list_entries(path)
    }
}

impl<T: SysfsRead + ?Sized> SysfsRead for Arc<T> {
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr> {
        (**self).read_attribute(path)
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr> {
        (**self).list_entries(path)
    }
}

/// Trait intended to insist that a value can be represented as valid UTF-8.
///
/// This trait is intended to be used in the situation where deviation from that expectation represents a
/// severe system error and crashing is the only reasonable response.
pub trait AssertAsStr {
    /// Insist that a value can be represented as valid UTF-8 and panic with a deliberately vague error message if not.
    ///
    /// # Panics
    ///
    /// If the conversion fails, all implementations are
    ///
    /// - **required** to panic or abort the process and,
    /// - are **forbidden** from logging the offending value or any value derived from the invalid value.
    fn assert_str(&self) -> &str;
}

/// We insist that path names are valid UTF-8 and immediately panic with a deliberately vague error message if not.
impl AssertAsStr for PathBuf {
    fn assert_str(&self) -> &str {
        match self.as_os_str().to_str() {
            Some(s) => s,
            None => panic!("PathBuf is not valid UTF-8 (this is suspicious)"),
        }
    }
}

/// Convert a directory entry name to a `String` without ever echoing invalid bytes.
pub(crate) fn entry_name(name: &std::ffi::OsStr) -> Result<String, SysfsErr> {
    name.to_str()
        .map(ToString::to_string)
        .ok_or(SysfsErr::SysfsPathIsNotValidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        let err = SysfsErr::IoError(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        let err = SysfsErr::IoError(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!err.is_not_found());
        assert!(!SysfsErr::NotMounted.is_not_found());
    }

    #[test]
    #[cfg(unix)]
    fn invalid_utf8_entry_names_are_rejected() {
        use std::os::unix::ffi::OsStrExt;
        let name = std::ffi::OsStr::from_bytes(b"eth\xff0");
        match entry_name(name) {
            Err(SysfsErr::SysfsPathIsNotValidUtf8) => {}
            e => unreachable!("expected SysfsPathIsNotValidUtf8, got {e:?}"),
        }
        assert_eq!(entry_name(std::ffi::OsStr::new("eth0")).unwrap(), "eth0");
    }

    #[test]
    fn borrowed_and_shared_capabilities_delegate() {
        let fs = MemorySysfs::default();
        fs.write_attribute("/sys/class/net/eth0/phys_switch_id", "abcd")
            .unwrap();
        let shared = Arc::new(fs);
        let path = Path::new("/sys/class/net/eth0/phys_switch_id");
        assert_eq!(shared.read_attribute(path).unwrap(), b"abcd");
        assert_eq!((&shared).read_attribute(path).unwrap(), b"abcd");
        let boxed: Box<dyn SysfsRead> = Box::new(Arc::clone(&shared));
        assert_eq!(
            boxed.list_entries(Path::new("/sys/class/net")).unwrap(),
            vec!["eth0".to_string()]
        );
    }
}
