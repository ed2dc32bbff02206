// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory sysfs tree for tests.

use std::collections::BTreeMap;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::trace;

use crate::{SysfsErr, SysfsRead, entry_name};

/// Symlinks chained deeper than this fail to resolve (mirrors linux `MAXSYMLINKS`).
const MAX_LINK_DEPTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    Attribute(Vec<u8>),
    Link(PathBuf),
}

/// A [`SysfsRead`] implementation backed by an in-memory tree of directories, attributes, and
/// symlinks.
///
/// Reads follow symlinks the way the kernel's sysfs does (e.g. `class/net/<dev>/subsystem`).
/// Mutations take literal paths and never follow links.
///
/// The tree sits behind a lock so a fixture shared with a resolver can still be changed between
/// calls, which is how device hot-unplug is simulated.
#[derive(Debug, Default)]
pub struct MemorySysfs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

fn not_found(path: &Path) -> SysfsErr {
    SysfsErr::IoError(Error::new(
        ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    ))
}

fn resolve(
    nodes: &BTreeMap<PathBuf, Node>,
    path: &Path,
    depth: usize,
) -> Result<PathBuf, SysfsErr> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        resolved.push(component);
        if let Some(Node::Link(target)) = nodes.get(&resolved) {
            if depth >= MAX_LINK_DEPTH {
                return Err(SysfsErr::IoError(Error::other(format!(
                    "{}: too many levels of symbolic links",
                    path.display()
                ))));
            }
            resolved = resolve(nodes, target, depth + 1)?;
        }
    }
    Ok(resolved)
}

impl MemorySysfs {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> MemorySysfs {
        MemorySysfs::default()
    }

    /// Create a directory and all of its missing parents.
    ///
    /// # Errors
    ///
    /// Fails if some component of `path` already exists as an attribute or a link.
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> Result<(), SysfsErr> {
        let mut nodes = self.nodes.write();
        Self::create_dir_all_locked(&mut nodes, path.as_ref())
    }

    fn create_dir_all_locked(
        nodes: &mut BTreeMap<PathBuf, Node>,
        path: &Path,
    ) -> Result<(), SysfsErr> {
        let mut dirs: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        dirs.reverse();
        for dir in dirs {
            match nodes.get(dir) {
                None => {
                    nodes.insert(dir.to_path_buf(), Node::Dir);
                }
                Some(Node::Dir) => {}
                Some(_) => {
                    return Err(SysfsErr::IoError(Error::new(
                        ErrorKind::NotADirectory,
                        format!("{}: not a directory", dir.display()),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Write (or overwrite) an attribute, creating its parent directories as needed.
    ///
    /// # Errors
    ///
    /// Fails if a parent component is not a directory or `path` is itself a directory.
    pub fn write_attribute(
        &self,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
    ) -> Result<(), SysfsErr> {
        let path = path.as_ref();
        let mut nodes = self.nodes.write();
        if let Some(parent) = path.parent() {
            Self::create_dir_all_locked(&mut nodes, parent)?;
        }
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(SysfsErr::IoError(Error::new(
                ErrorKind::IsADirectory,
                format!("{}: is a directory", path.display()),
            )));
        }
        nodes.insert(path.to_path_buf(), Node::Attribute(content.as_ref().to_vec()));
        Ok(())
    }

    /// Create a symlink at `link` pointing at the absolute path `target`.
    ///
    /// The target does not need to exist yet.
    ///
    /// # Errors
    ///
    /// Fails if `target` is relative, if a parent of `link` is not a directory, or if `link`
    /// already exists.
    pub fn symlink(
        &self,
        target: impl AsRef<Path>,
        link: impl AsRef<Path>,
    ) -> Result<(), SysfsErr> {
        let (target, link) = (target.as_ref(), link.as_ref());
        if !target.is_absolute() {
            return Err(SysfsErr::IoError(Error::new(
                ErrorKind::InvalidInput,
                format!("{}: symlink target must be absolute", target.display()),
            )));
        }
        let mut nodes = self.nodes.write();
        if let Some(parent) = link.parent() {
            Self::create_dir_all_locked(&mut nodes, parent)?;
        }
        if nodes.contains_key(link) {
            return Err(SysfsErr::IoError(Error::new(
                ErrorKind::AlreadyExists,
                format!("{}: file exists", link.display()),
            )));
        }
        nodes.insert(link.to_path_buf(), Node::Link(target.to_path_buf()));
        Ok(())
    }

    /// Remove `path` and everything below it.  Removing a missing path is not an error.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.write().retain(|p, _| !p.starts_with(path));
    }
}

impl SysfsRead for MemorySysfs {
    fn read_attribute(&self, path: &Path) -> Result<Vec<u8>, SysfsErr> {
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, path, 0)?;
        match nodes.get(&resolved) {
            Some(Node::Attribute(content)) => {
                trace!("read {} bytes from {}", content.len(), path.display());
                Ok(content.clone())
            }
            Some(Node::Dir) => Err(SysfsErr::IoError(Error::new(
                ErrorKind::IsADirectory,
                format!("{}: is a directory", path.display()),
            ))),
            // dangling link
            Some(Node::Link(_)) | None => Err(not_found(path)),
        }
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<String>, SysfsErr> {
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, path, 0)?;
        match nodes.get(&resolved) {
            Some(Node::Dir) => {}
            Some(Node::Attribute(_)) => {
                return Err(SysfsErr::IoError(Error::new(
                    ErrorKind::NotADirectory,
                    format!("{}: not a directory", path.display()),
                )));
            }
            Some(Node::Link(_)) | None => return Err(not_found(path)),
        }
        // BTreeMap order on paths is component-wise, so direct children come out sorted
        nodes
            .range(resolved.clone()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(&resolved))
            .filter(|(p, _)| p.parent() == Some(resolved.as_path()))
            .filter_map(|(p, _)| p.file_name())
            .map(entry_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemorySysfs {
        let fs = MemorySysfs::new();
        fs.write_attribute("/sys/class/net/eth0/phys_switch_id", "111111")
            .unwrap();
        fs.write_attribute("/sys/class/net/eth1/phys_port_name", "p1\n")
            .unwrap();
        fs.create_dir_all("/sys/class/net/eth10").unwrap();
        fs.symlink("/sys/class/net", "/sys/class/net/eth0/subsystem")
            .unwrap();
        fs
    }

    #[test]
    fn attributes_are_returned_raw() {
        let fs = sample();
        assert_eq!(
            fs.read_attribute(Path::new("/sys/class/net/eth1/phys_port_name"))
                .unwrap(),
            b"p1\n"
        );
    }

    #[test]
    fn listing_is_sorted_and_only_direct_children() {
        let fs = sample();
        assert_eq!(
            fs.list_entries(Path::new("/sys/class/net")).unwrap(),
            vec!["eth0", "eth1", "eth10"]
        );
        assert_eq!(
            fs.list_entries(Path::new("/sys/class/net/eth0")).unwrap(),
            vec!["phys_switch_id", "subsystem"]
        );
    }

    #[test]
    fn links_are_followed_on_read() {
        let fs = sample();
        assert_eq!(
            fs.list_entries(Path::new("/sys/class/net/eth0/subsystem"))
                .unwrap(),
            vec!["eth0", "eth1", "eth10"]
        );
        assert_eq!(
            fs.read_attribute(Path::new(
                "/sys/class/net/eth0/subsystem/eth0/phys_switch_id"
            ))
            .unwrap(),
            b"111111"
        );
    }

    #[test]
    fn link_loops_fail_instead_of_hanging() {
        let fs = MemorySysfs::new();
        fs.symlink("/b", "/a").unwrap();
        fs.symlink("/a", "/b").unwrap();
        assert!(fs.read_attribute(Path::new("/a/x")).is_err());
    }

    #[test]
    fn missing_paths_are_not_found() {
        let fs = sample();
        assert!(
            fs.read_attribute(Path::new("/sys/class/net/eth0/phys_port_name"))
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            fs.list_entries(Path::new("/sys/bus/pci/devices"))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn kind_mismatches_are_errors() {
        let fs = sample();
        match fs.read_attribute(Path::new("/sys/class/net/eth0")) {
            Err(SysfsErr::IoError(e)) => assert_eq!(e.kind(), ErrorKind::IsADirectory),
            e => unreachable!("expected IsADirectory, got {e:?}"),
        }
        match fs.list_entries(Path::new("/sys/class/net/eth0/phys_switch_id")) {
            Err(SysfsErr::IoError(e)) => assert_eq!(e.kind(), ErrorKind::NotADirectory),
            e => unreachable!("expected NotADirectory, got {e:?}"),
        }
        assert!(
            fs.write_attribute("/sys/class/net/eth0/phys_switch_id/nested", "x")
                .is_err()
        );
        assert!(fs.symlink("relative", "/sys/link").is_err());
    }

    #[test]
    fn remove_is_recursive() {
        let fs = sample();
        fs.remove("/sys/class/net/eth0");
        assert_eq!(
            fs.list_entries(Path::new("/sys/class/net")).unwrap(),
            vec!["eth1", "eth10"]
        );
        assert!(
            fs.read_attribute(Path::new("/sys/class/net/eth0/phys_switch_id"))
                .unwrap_err()
                .is_not_found()
        );
    }
}
