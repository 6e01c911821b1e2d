//! Moving a block store onto disk and back.
//!
//! `materialize` writes the tree described by a store below a directory;
//! `capture` walks a directory and produces the store that describes it.
//! Capture visits entries in name order and allocates keys sequentially,
//! so capturing the same tree twice yields identical stores.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::block::error::{LayoutError, LayoutResult};
use crate::block::layout::{BlockReader, BlockWriter, DirListing, Inode, NodeKind, ROOT_INODE};
use crate::block::store::{BlockKey, BlockStore};
use crate::git::GIT_DIR;

const DEFAULT_DIR_MODE: u32 = 0o755;

/// Write the tree held by `store` into the existing, empty directory `root`.
///
/// An empty store materializes to an empty directory. Symlinks must stay
/// inside `root` and a top-level `.git` entry must be a real directory;
/// see [`validate`].
pub fn materialize(store: &BlockStore, root: &Path) -> LayoutResult<()> {
    if store.is_empty() {
        return Ok(());
    }

    let mut reader = BlockReader::new(store);
    let data = root_listing(&mut reader)?;
    walk_dir(&mut reader, data, Path::new(""), Some(root))?;

    let orphans = reader.unclaimed();
    if orphans > 0 {
        trace!(orphans, root = %root.display(), "store holds unreachable blocks");
    }
    Ok(())
}

/// Check that `store` describes a tree `materialize` would accept, without
/// touching the filesystem.
pub fn validate(store: &BlockStore) -> LayoutResult<()> {
    if store.is_empty() {
        return Ok(());
    }

    let mut reader = BlockReader::new(store);
    let data = root_listing(&mut reader)?;
    walk_dir(&mut reader, data, Path::new(""), None)
}

fn root_listing(reader: &mut BlockReader<'_>) -> LayoutResult<BlockKey> {
    let inode = reader.inode(ROOT_INODE)?;
    if inode.kind != NodeKind::Dir {
        return Err(LayoutError::RootNotDirectory(ROOT_INODE));
    }
    Ok(inode.data)
}

/// Walk the listing in block `data`. `rel` is the directory's path below
/// the root; entries are written under `out` when it is set.
fn walk_dir(
    reader: &mut BlockReader<'_>,
    data: BlockKey,
    rel: &Path,
    out: Option<&Path>,
) -> LayoutResult<()> {
    let listing = reader.listing(data)?;
    let at_root = rel.as_os_str().is_empty();

    for (name, inode_key) in listing {
        let inode = reader.inode(inode_key)?;
        let entry = rel.join(&name);
        let path = out.map(|dir| dir.join(&name));

        // a `.git` file or symlink would point git outside the namespace
        if at_root && name == GIT_DIR && inode.kind != NodeKind::Dir {
            return Err(LayoutError::GitDirNotDirectory(inode_key));
        }

        match inode.kind {
            NodeKind::File => {
                let bytes = reader.data(inode.data)?;
                if let Some(path) = &path {
                    fs::write(path, bytes).map_err(|e| LayoutError::io(path, e))?;
                    set_mode(path, inode.mode)?;
                }
            }
            NodeKind::Dir => {
                if let Some(path) = &path {
                    fs::create_dir(path).map_err(|e| LayoutError::io(path, e))?;
                }
                walk_dir(reader, inode.data, &entry, path.as_deref())?;
                // applied last so a read-only directory can still be filled
                if let Some(path) = &path {
                    set_mode(path, inode.mode)?;
                }
            }
            NodeKind::Symlink => {
                let target = symlink_target(reader.data(inode.data)?);
                check_symlink(&entry, &target)?;
                if let Some(path) = &path {
                    make_symlink(&target, path)?;
                }
            }
        }
    }

    Ok(())
}

/// Reject a symlink at `entry` whose `target` resolves outside the root.
///
/// Leading `..` components may climb as far as the root. After the first
/// normal component only descent is allowed, so passing through another
/// in-tree symlink cannot climb out either.
fn check_symlink(entry: &Path, target: &Path) -> LayoutResult<()> {
    let mut headroom = entry.components().count().saturating_sub(1);
    let mut descended = false;

    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if !descended && headroom > 0 => headroom -= 1,
            Component::Normal(_) => descended = true,
            _ => {
                return Err(LayoutError::EscapingSymlink {
                    path: entry.to_path_buf(),
                    target: target.to_path_buf(),
                })
            }
        }
    }
    Ok(())
}

/// Capture the tree below `root` into a new store.
///
/// A directory without entries captures to the empty store, matching
/// what `materialize` produces for it.
pub fn capture(root: &Path) -> LayoutResult<BlockStore> {
    let has_entries = fs::read_dir(root)
        .map_err(|e| LayoutError::io(root, e))?
        .next()
        .is_some();
    if !has_entries {
        return Ok(BlockStore::new());
    }

    let mut writer = BlockWriter::new();
    let root_key = writer.allocate();
    let data = capture_dir_entries(&mut writer, root)?;
    writer.put_inode(
        root_key,
        &Inode {
            kind: NodeKind::Dir,
            mode: DEFAULT_DIR_MODE,
            data,
        },
    )?;
    Ok(writer.finish())
}

fn capture_dir_entries(writer: &mut BlockWriter, dir: &Path) -> LayoutResult<BlockKey> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| LayoutError::io(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LayoutError::io(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut listing = DirListing::new();
    for entry in entries {
        let path = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| LayoutError::NonUtf8Name(path.clone()))?;

        let meta = fs::symlink_metadata(&path).map_err(|e| LayoutError::io(&path, e))?;
        let file_type = meta.file_type();
        let inode_key = writer.allocate();

        let inode = if file_type.is_dir() {
            let data = capture_dir_entries(writer, &path)?;
            Inode {
                kind: NodeKind::Dir,
                mode: read_mode(&meta),
                data,
            }
        } else if file_type.is_file() {
            let bytes = fs::read(&path).map_err(|e| LayoutError::io(&path, e))?;
            Inode {
                kind: NodeKind::File,
                mode: read_mode(&meta),
                data: writer.put_data(bytes),
            }
        } else if file_type.is_symlink() {
            let target = read_symlink(&path)?;
            Inode {
                kind: NodeKind::Symlink,
                mode: read_mode(&meta),
                data: writer.put_data(target),
            }
        } else {
            return Err(LayoutError::UnsupportedFileType(path));
        };

        writer.put_inode(inode_key, &inode)?;
        listing.insert(name, inode_key);
    }

    writer.put_listing(&listing)
}

#[cfg(unix)]
fn read_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn read_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else if meta.is_dir() {
        DEFAULT_DIR_MODE
    } else {
        0o644
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> LayoutResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| LayoutError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> LayoutResult<()> {
    let mut perms = fs::metadata(path).map_err(|e| LayoutError::io(path, e))?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms).map_err(|e| LayoutError::io(path, e))
}

#[cfg(unix)]
fn symlink_target(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn symlink_target(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(unix)]
fn make_symlink(target: &Path, path: &Path) -> LayoutResult<()> {
    std::os::unix::fs::symlink(target, path).map_err(|e| LayoutError::io(path, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, path: &Path) -> LayoutResult<()> {
    Err(LayoutError::UnsupportedFileType(path.to_path_buf()))
}

#[cfg(unix)]
fn read_symlink(path: &Path) -> LayoutResult<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    let target = fs::read_link(path).map_err(|e| LayoutError::io(path, e))?;
    Ok(target.as_os_str().as_bytes().to_vec())
}

#[cfg(not(unix))]
fn read_symlink(path: &Path) -> LayoutResult<Vec<u8>> {
    Err(LayoutError::UnsupportedFileType(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::write(root.join("README.md"), "hello").unwrap();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("src").join("lib.rs"), "pub fn f() {}").unwrap();
        fs::create_dir(root.join("empty")).unwrap();
    }

    #[test]
    fn test_capture_then_materialize() {
        let source = TempDir::new().unwrap();
        sample_tree(source.path());

        let store = capture(source.path()).unwrap();
        assert!(!store.is_empty());

        let target = TempDir::new().unwrap();
        materialize(&store, target.path()).unwrap();

        assert_eq!(fs::read_to_string(target.path().join("README.md")).unwrap(), "hello");
        assert_eq!(
            fs::read_to_string(target.path().join("src/lib.rs")).unwrap(),
            "pub fn f() {}"
        );
        assert!(target.path().join("empty").is_dir());

        // capturing the copy gives the same blocks
        assert_eq!(capture(target.path()).unwrap(), store);
    }

    #[test]
    fn test_empty_directory_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = capture(dir.path()).unwrap();
        assert!(store.is_empty());

        materialize(&store, dir.path()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let source = TempDir::new().unwrap();
        let script = source.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let frozen = source.path().join("frozen");
        fs::write(&frozen, "x").unwrap();
        fs::set_permissions(&frozen, fs::Permissions::from_mode(0o444)).unwrap();

        let store = capture(source.path()).unwrap();
        let target = TempDir::new().unwrap();
        materialize(&store, target.path()).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target.path().join("run.sh")), 0o755);
        assert_eq!(mode(&target.path().join("frozen")), 0o444);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_roundtrip() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("target.txt"), "t").unwrap();
        std::os::unix::fs::symlink("target.txt", source.path().join("link")).unwrap();

        let store = capture(source.path()).unwrap();
        let target = TempDir::new().unwrap();
        materialize(&store, target.path()).unwrap();

        let link = fs::read_link(target.path().join("link")).unwrap();
        assert_eq!(link, Path::new("target.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_git_symlink_to_host_rejected() {
        let host = TempDir::new().unwrap();
        fs::create_dir(host.path().join(".git")).unwrap();

        let source = TempDir::new().unwrap();
        std::os::unix::fs::symlink(host.path().join(".git"), source.path().join(".git")).unwrap();
        let store = capture(source.path()).unwrap();

        assert!(matches!(validate(&store), Err(LayoutError::GitDirNotDirectory(_))));
        let target = TempDir::new().unwrap();
        let err = materialize(&store, target.path()).unwrap_err();
        assert!(matches!(err, LayoutError::GitDirNotDirectory(_)));
        assert!(err.is_corruption());
        assert!(fs::symlink_metadata(target.path().join(".git")).is_err());
    }

    #[test]
    fn test_git_file_rejected() {
        // a `.git` file can redirect git with a `gitdir:` line
        let mut store = BlockStore::new();
        store.set(0, br#"{"kind":"dir","mode":493,"data":1}"#.to_vec());
        store.set(1, br#"{".git":2}"#.to_vec());
        store.set(2, br#"{"kind":"file","mode":420,"data":3}"#.to_vec());
        store.set(3, b"gitdir: /var/lib/elsewhere/.git\n".to_vec());

        assert!(matches!(validate(&store), Err(LayoutError::GitDirNotDirectory(2))));
    }

    #[cfg(unix)]
    #[test]
    fn test_escaping_symlinks_rejected() {
        let escapes = |place: &str, link: &str| {
            let source = TempDir::new().unwrap();
            fs::create_dir_all(source.path().join("src/deep")).unwrap();
            std::os::unix::fs::symlink(link, source.path().join(place)).unwrap();
            let store = capture(source.path()).unwrap();
            matches!(validate(&store), Err(LayoutError::EscapingSymlink { .. }))
        };

        assert!(escapes("up", "../outside"));
        assert!(escapes("src/up", "../../outside"));
        assert!(escapes("src/deep/abs", "/etc/passwd"));
        assert!(escapes("src/climb", "deep/../../.."));

        assert!(!escapes("src/sibling", "../README.md"));
        assert!(!escapes("src/deep/top", "../../src"));
        assert!(!escapes("src/here", "./deep/file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_escaping_symlink_not_written() {
        let source = TempDir::new().unwrap();
        fs::create_dir(source.path().join("src")).unwrap();
        std::os::unix::fs::symlink("../../etc", source.path().join("src/etc")).unwrap();
        let store = capture(source.path()).unwrap();

        let target = TempDir::new().unwrap();
        let err = materialize(&store, target.path()).unwrap_err();
        match err {
            LayoutError::EscapingSymlink { path, target: link } => {
                assert_eq!(path, Path::new("src/etc"));
                assert_eq!(link, Path::new("../../etc"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fs::symlink_metadata(target.path().join("src/etc")).is_err());
    }

    #[test]
    fn test_validate_accepts_captured_tree() {
        let source = TempDir::new().unwrap();
        sample_tree(source.path());
        fs::create_dir(source.path().join(".git")).unwrap();
        fs::write(source.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        let store = capture(source.path()).unwrap();
        validate(&store).unwrap();
        validate(&BlockStore::new()).unwrap();
    }

    #[test]
    fn test_missing_root_rejected() {
        let mut store = BlockStore::new();
        store.set(5, b"orphan".to_vec());

        let dir = TempDir::new().unwrap();
        let result = materialize(&store, dir.path());
        assert!(matches!(result, Err(LayoutError::MissingBlock(ROOT_INODE))));
    }

    #[test]
    fn test_root_must_be_directory() {
        let mut store = BlockStore::new();
        store.set(0, br#"{"kind":"file","mode":420,"data":1}"#.to_vec());
        store.set(1, b"contents".to_vec());

        let dir = TempDir::new().unwrap();
        let result = materialize(&store, dir.path());
        assert!(matches!(result, Err(LayoutError::RootNotDirectory(0))));
    }

    #[test]
    fn test_directory_cycle_rejected() {
        // root listing points back at the root inode
        let mut store = BlockStore::new();
        store.set(0, br#"{"kind":"dir","mode":493,"data":1}"#.to_vec());
        store.set(1, br#"{"loop":0}"#.to_vec());

        let dir = TempDir::new().unwrap();
        let result = materialize(&store, dir.path());
        assert!(matches!(result, Err(LayoutError::SharedBlock(0))));
    }

    #[test]
    fn test_garbage_inode_rejected() {
        let mut store = BlockStore::new();
        store.set(0, vec![0xff, 0x00, 0x13]);

        let dir = TempDir::new().unwrap();
        let err = materialize(&store, dir.path()).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInode { key: 0, .. }));
        assert!(err.is_corruption());
    }
}
