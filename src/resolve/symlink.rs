//! Symbolic link and shortcut resolution.

use std::path::{Path, PathBuf};

use crate::resolve::fs::{FileStat, FileSystem, FsError};

/// Result of a walk that crossed at least one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPath {
    /// The resolved path, or the deepest path reached before a dead end.
    pub absolute: PathBuf,
    /// `None` when the walk hit a dead end or the final target could not
    /// be statted.
    pub stat: Option<FileStat>,
}

/// Walk `virtual_path` from `root` one segment at a time, replacing every
/// link with its target. Returns `None` when no link was crossed, including
/// a walk that ends at a missing entry before reaching any link. A dangling
/// link counts as crossed.
pub async fn walk(
    fs: &dyn FileSystem,
    root: &Path,
    virtual_path: &str,
) -> Result<Option<LinkedPath>, FsError> {
    let mut current = root.to_path_buf();
    let mut crossed = false;
    let mut dead_end = false;

    for segment in virtual_path.split('/').filter(|s| !s.is_empty()) {
        let next = current.join(segment);

        let Ok(stat) = fs.stat_link(&next).await else {
            dead_end = true;
            break;
        };

        match follow(fs, &next, &stat).await? {
            Some(target) => {
                crossed = true;
                current = target;
            }
            None if stat.is_symlink() => {
                crossed = true;
                dead_end = true;
                current = next;
                break;
            }
            None => current = next,
        }
    }

    if !crossed {
        return Ok(None);
    }

    let stat = if dead_end {
        None
    } else {
        fs.stat_link(&current).await.ok()
    };
    Ok(Some(LinkedPath {
        absolute: current,
        stat,
    }))
}

/// Resolve a single entry already known to be at `path`. A dangling link
/// yields `None`.
pub async fn follow(
    fs: &dyn FileSystem,
    path: &Path,
    stat: &FileStat,
) -> Result<Option<PathBuf>, FsError> {
    if stat.is_symlink() {
        return match fs.real_path(path).await {
            Ok(target) => Ok(Some(target)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        };
    }

    if stat.is_file() && is_shortcut(path) {
        return fs.resolve_shortcut(path).await;
    }

    Ok(None)
}

pub fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lnk"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::resolve::fs::TokioFs;

    #[tokio::test]
    async fn test_walk_through_linked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("real")).unwrap();
        std::fs::write(root.join("real/page.html"), b"hi").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let linked = walk(&TokioFs, &root, "/alias/page.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.absolute, root.join("real/page.html"));
        assert!(linked.stat.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_walk_without_links() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain.txt"), b"x").unwrap();

        assert_eq!(walk(&TokioFs, dir.path(), "/plain.txt").await.unwrap(), None);
        assert_eq!(walk(&TokioFs, dir.path(), "/missing/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dangling_link() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dead")).unwrap();

        let linked = walk(&TokioFs, dir.path(), "/dead").await.unwrap().unwrap();
        assert_eq!(linked.absolute, dir.path().join("dead"));
        assert_eq!(linked.stat, None);
    }

    #[tokio::test]
    async fn test_dead_end_behind_link() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let linked = walk(&TokioFs, &root, "/alias/missing.txt").await.unwrap().unwrap();
        assert_eq!(linked.absolute, root.join("real"));
        assert_eq!(linked.stat, None);
    }
}
