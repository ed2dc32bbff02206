// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Access to the sysfs actually mounted on this host.

use std::io::Read;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use tracing::{error, info, trace};

use crate::{AssertAsStr, SysfsErr, SysfsRead, entry_name};

/// Determine where sysfs is mounted on this host.
///
/// # Errors
///
/// - [`SysfsErr::NotMounted`] if no sysfs is mounted.
/// - [`SysfsErr::MultipleMounts`] if sysfs is mounted at more than one location.
/// - [`SysfsErr::IoError`] if `/proc/mounts` can not be read.
pub fn sysfs_root() -> Result<SysfsPath, SysfsErr> {
    let sysfs_mounts: Vec<PathBuf> = procfs::mounts()
        .map_err(|e| SysfsErr::IoError(std::io::Error::other(e.to_string())))?
        .into_iter()
        .filter(|mount| mount.fs_vfstype == "sysfs")
        .map(|mount| PathBuf::from(mount.fs_file))
        .collect();
    let sysfs_path = match sysfs_mounts.as_slice() {
        [] => return Err(SysfsErr::NotMounted),
        [single] => single.clone(),
        _ => {
            error!("suspicious configuration found: sysfs is mounted at more than one location: {sysfs_mounts:#?}");
            return Err(SysfsErr::MultipleMounts(sysfs_mounts));
        }
    };
    let sysfs_root = SysfsPath::new(sysfs_path)?;
    info!("found sysfs filesystem at {sysfs_root}");
    Ok(sysfs_root)
}

/// Path which is promised to
///
/// 1. exist under a mounted sysfs at the time of creation,
/// 2. be both absolute and canonical,
/// 3. be both safely and correctly represented as a valid UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SysfsPath(PathBuf);

impl SysfsPath {
    /// Create a new `SysfsPath` from a path.
    ///
    /// <div class="note">
    ///
    /// The path will be canonicalized prior to any other checks, so passing paths to symlinks here
    /// is completely fine (sysfs uses a lot of symlinks).
    /// </div>
    ///
    /// # Errors
    ///
    /// - If the canonicalized path is not under sysfs, an error is returned.
    /// - If the path is under sysfs but is (somehow) not a valid UTF-8 string, an error is returned.
    /// - io errors (such as permission denied or not found) can also occur
    pub fn new(path: impl AsRef<Path>) -> Result<SysfsPath, SysfsErr> {
        let path = path.as_ref();
        if path.as_os_str().to_str().is_none() {
            return Err(SysfsErr::SysfsPathIsNotValidUtf8);
        }
        let path = std::fs::canonicalize(path)?;
        if path.as_os_str().to_str().is_none() {
            return Err(SysfsErr::SysfsPathIsNotValidUtf8);
        }
        match nix::sys::statfs::statfs(&path) {
            Ok(stats) => {
                if stats.filesystem_type() == nix::sys::statfs::SYSFS_MAGIC {
                    Ok(SysfsPath(path))
                } else {
                    Err(SysfsErr::PathNotUnderSysfs(path))
                }
            }
            Err(errno) => Err(SysfsErr::IoError(errno.into())),
        }
    }

    /// Get an immutable reference to the inner [`PathBuf`].
    #[must_use]
    pub fn inner(&self) -> &PathBuf {
        &self.0
    }
}

impl AsRef<Path> for SysfsPath {
    fn as_ref(&self) -> &Path {
        self.inner()
    }
}

// this is safe because we have already validated the conversion to UTF-8 in the constructor
impl std::fmt::Display for SysfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner().assert_str())
    }
}

/// File which is promised to be under a mounted sysfs, opened read-only.
pub struct SysfsFile(std::fs::File);

impl SysfsFile {
    /// Open a file under a mounted sysfs for reading.
    ///
    /// # Errors
    ///
    /// - If the path leads out of the sysfs mount
    /// - On permissions errors or otherwise invalid file access
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SysfsErr> {
        let path = SysfsPath::new(path.as_ref())?;
        let file = std::fs::File::open(path.inner()).map_err(SysfsErr::IoError)?;
        match nix::sys::statfs::fstatfs(file.as_fd()) {
            Ok(stat) => {
                if stat.filesystem_type() == nix::sys::statfs::SYSFS_MAGIC {
                    Ok(SysfsFile(file))
                } else {
                    Err(SysfsErr::PathNotUnderSysfs(path.inner().clone()))
                }
            }
            Err(e) => Err(SysfsErr::IoError(e.into())),
        }
    }
}

impl Read for SysfsFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

/// [`SysfsRead`] backed by the sysfs mounted on this host.
///
/// Every path handed to this backend must resolve to somewhere under the bound root.
#[derive(Debug, Clone)]
pub struct HostSysfs {
    root: SysfsPath,
}

impl HostSysfs {
    /// Bind to an already validated sysfs root.
    #[must_use]
    pub fn new(root: SysfsPath) -> HostSysfs {
        HostSysfs { root }
    }

    /// Bind to the sysfs mounted on this host.
    ///
    /// # Errors
    ///
    /// See [`sysfs_root`].
    pub fn discover() -> Result<HostSysfs, SysfsErr> {
        sysfs_root().map(HostSysfs::new)
    }

    /// The root this backend is bound to.
    #[must_use]
    pub fn root(&self) -> &SysfsPath {
        &self.root
    }

    fn confine(&self, path: &Path) -> Result<SysfsPath, SysfsErr> {
        let path = SysfsPath::new(path)?;
        if path.inner().starts_with(self.root.inner()) {
            Ok(path)
        } else {
            Err(SysfsErr::PathNotUnderSysfs(path.inner().clone()))
        }
    }
}

impl SysfsRead for HostSysfs {
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr> {
        let path = self.confine(path)?;
        let mut content = Vec::new();
        SysfsFile::open(&path)?.read_to_end(&mut content)?;
        trace!("read {} bytes from {path}", content.len());
        Ok(content)
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr> {
        let path = self.confine(path)?;
        let mut names = std::fs::read_dir(path.inner())?
            .map(|entry| entry_name(&entry?.file_name()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort_unstable();
        trace!("listed {} entries under {path}", names.len());
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_outside_sysfs_are_rejected() {
        // the temp dir is never on sysfs
        let dir = std::env::temp_dir();
        match SysfsPath::new(&dir) {
            Err(SysfsErr::PathNotUnderSysfs(path)) => {
                assert_eq!(path, std::fs::canonicalize(&dir).unwrap());
            }
            Err(SysfsErr::IoError(_)) => {} // e.g. statfs is refused in a sandbox
            e => unreachable!("temp dir should not qualify as a sysfs path: {e:?}"),
        }
    }

    #[test]
    fn missing_paths_are_not_found() {
        let err = SysfsPath::new("/this/path/should/not/exist/anywhere").unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
    }
}
