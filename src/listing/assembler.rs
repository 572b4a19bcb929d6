//! Directory enumeration into a renderable listing.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Settings;
use crate::listing::format::{format_mtime, human_size};
use crate::resolve::symlink::{self, is_shortcut};
use crate::resolve::{FileStat, FileSystem, FsError};
use crate::rules::encode::{normalize_posix, slasher};

/// Everything a renderer needs to draw one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    /// Label such as `site/docs/`.
    pub directory: String,
    /// Breadcrumbs from the served root down to this directory.
    pub paths: Vec<Breadcrumb>,
    pub files: Vec<ListingEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    /// Relative to `/`, without a leading slash.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub base: String,
    pub relative: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub ext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
}

/// The sole file of a directory, served in place of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFile {
    pub absolute: PathBuf,
    pub stat: FileStat,
    /// Virtual path of the file.
    pub relative: String,
    pub is_symlink: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    Listing(DirectoryListing),
    SingleFile(SingleFile),
    /// Listing switched off for this path; callers answer 404.
    Disabled,
}

/// An entry that survived filtering and link resolution.
struct Candidate {
    base: String,
    relative: String,
    ext: String,
    stat: FileStat,
}

/// Build the listing for `absolute`, whose decoded virtual path is
/// `relative_path`. A missing directory surfaces as [`FsError::Missing`].
pub async fn assemble(
    fs: &dyn FileSystem,
    settings: &Settings,
    relative_path: &str,
    absolute: &Path,
) -> Result<ListingOutcome, FsError> {
    let listing_enabled = settings.directory_listing.applies(relative_path);
    if !listing_enabled && !settings.render_single {
        return Ok(ListingOutcome::Disabled);
    }

    let slash_suffix = match settings.trailing_slash {
        Some(false) => "",
        _ => "/",
    };

    let names = fs.list_directory(absolute).await?;
    let can_render_single = settings.render_single && names.len() == 1;

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        if settings.unlisted.any_match(&slasher(&name)) {
            continue;
        }

        let Some((candidate, target, is_link)) = inspect(fs, settings, absolute, relative_path, &name).await
        else {
            continue;
        };

        if can_render_single && !candidate.stat.is_dir() {
            tracing::debug!(path = %target.display(), "Rendering single file");
            return Ok(ListingOutcome::SingleFile(SingleFile {
                absolute: target,
                stat: candidate.stat,
                relative: candidate.relative,
                is_symlink: is_link,
            }));
        }

        files.push(into_entry(candidate, slash_suffix));
    }

    if !listing_enabled {
        return Ok(ListingOutcome::Disabled);
    }

    files.sort_by(compare_entries);

    let to_root: Vec<&str> = relative_path.split('/').filter(|s| !s.is_empty()).collect();
    let root_name = settings
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut directory = root_name;
    for part in &to_root {
        if !directory.is_empty() {
            directory.push('/');
        }
        directory.push_str(part);
    }
    directory.push_str(slash_suffix);

    let parts: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();

    if !to_root.is_empty() {
        let relative = parent_link(&parts, slash_suffix);
        files.insert(
            0,
            ListingEntry {
                base: "..".to_string(),
                title: relative.clone(),
                relative,
                kind: EntryType::Folder,
                ext: String::new(),
                size: None,
                mtime: None,
            },
        );
    }

    Ok(ListingOutcome::Listing(DirectoryListing {
        paths: breadcrumbs(&parts, slash_suffix),
        directory,
        files,
    }))
}

/// Stat one entry and follow it when it is a link. `None` drops the entry.
async fn inspect(
    fs: &dyn FileSystem,
    settings: &Settings,
    directory: &Path,
    relative_path: &str,
    name: &str,
) -> Option<(Candidate, PathBuf, bool)> {
    let path = directory.join(name);
    let stat = fs.stat_link(&path).await.ok()?;

    let mut base = name.to_string();
    let ext = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "txt".to_string());
    let relative = normalize_posix(&format!("{relative_path}/{name}"));

    let (target, stat, is_link) = match symlink::follow(fs, &path, &stat).await {
        Ok(Some(target)) => {
            if !settings.symlinks {
                return None;
            }
            let target_stat = fs.stat_link(&target).await.ok()?;
            if is_shortcut(&path) {
                base.truncate(base.len() - ".lnk".len());
            }
            (target, target_stat, true)
        }
        Ok(None) if stat.is_symlink() => return None,
        Ok(None) => (path, stat, false),
        Err(e) => {
            tracing::debug!(entry = %name, error = %e, "Dropping unreadable entry");
            return None;
        }
    };

    Some((
        Candidate {
            base,
            relative,
            ext,
            stat,
        },
        target,
        is_link,
    ))
}

fn into_entry(candidate: Candidate, slash_suffix: &str) -> ListingEntry {
    let mtime = Some(format_mtime(candidate.stat.modified));

    if candidate.stat.is_dir() {
        let base = format!("{}{slash_suffix}", candidate.base);
        ListingEntry {
            title: base.clone(),
            base,
            relative: format!("{}{slash_suffix}", candidate.relative),
            kind: EntryType::Folder,
            ext: String::new(),
            size: None,
            mtime,
        }
    } else {
        ListingEntry {
            title: candidate.base.clone(),
            base: candidate.base,
            relative: candidate.relative,
            kind: EntryType::File,
            ext: candidate.ext,
            size: Some(human_size(candidate.stat.len)),
            mtime,
        }
    }
}

/// Folders first, then case-insensitive name.
fn compare_entries(a: &ListingEntry, b: &ListingEntry) -> Ordering {
    let a_dir = a.kind == EntryType::Folder;
    let b_dir = b.kind == EntryType::Folder;
    b_dir
        .cmp(&a_dir)
        .then_with(|| a.base.to_lowercase().cmp(&b.base.to_lowercase()))
}

/// `parts[0]` is the root's own name and is not part of any URL.
fn parent_link(parts: &[&str], slash_suffix: &str) -> String {
    let mut joined = String::from("/");
    for part in parts.iter().skip(1) {
        joined.push_str(part);
        joined.push('/');
    }
    joined.push_str("..");
    joined.push_str(slash_suffix);
    normalize_posix(&joined)
}

fn breadcrumbs(parts: &[&str], slash_suffix: &str) -> Vec<Breadcrumb> {
    parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let is_last = index + 1 == parts.len();
            let name = format!("{part}{}", if is_last { slash_suffix } else { "/" });
            let url = if index == 0 {
                String::new()
            } else {
                format!("{}{slash_suffix}", parts[1..=index].join("/"))
            };
            Breadcrumb { name, url }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServeConfig, Toggle};
    use crate::resolve::TokioFs;

    struct Site {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    fn site() -> Site {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir_all(root.join("docs/guides")).unwrap();
        std::fs::create_dir_all(root.join("Assets")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("nest/inner")).unwrap();
        std::fs::create_dir_all(root.join("solo")).unwrap();
        std::fs::write(root.join("solo/only.txt"), b"only").unwrap();
        std::fs::write(root.join("b.txt"), b"bee").unwrap();
        std::fs::write(root.join("A.md"), b"# a").unwrap();
        std::fs::write(root.join("archive"), vec![0u8; 1536]).unwrap();
        std::fs::write(root.join(".DS_Store"), b"").unwrap();
        std::fs::write(root.join("docs/intro.html"), b"<p>").unwrap();
        Site { _dir: dir, root }
    }

    fn settings(site: &Site, mut config: ServeConfig) -> Settings {
        config.public = Some(site.root.clone());
        Settings::from_config(&config).unwrap()
    }

    async fn listing(settings: &Settings, relative: &str) -> ListingOutcome {
        let absolute = crate::resolve::join_within(&settings.root, relative);
        assemble(&TokioFs, settings, relative, &absolute).await.unwrap()
    }

    fn expect_listing(outcome: ListingOutcome) -> DirectoryListing {
        match outcome {
            ListingOutcome::Listing(listing) => listing,
            other => panic!("expected listing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_root_listing_sorted_without_parent() {
        let site = site();
        let settings = settings(&site, ServeConfig::default());
        let listing = expect_listing(listing(&settings, "/").await);

        let names: Vec<&str> = listing.files.iter().map(|f| f.base.as_str()).collect();
        assert_eq!(
            names,
            ["Assets/", "docs/", "nest/", "solo/", "A.md", "archive", "b.txt"]
        );
        assert_eq!(listing.directory, "site/");
        assert_eq!(
            listing.paths,
            vec![Breadcrumb {
                name: "site/".into(),
                url: String::new()
            }]
        );

        let archive = &listing.files[5];
        assert_eq!(archive.ext, "txt");
        assert_eq!(archive.size.as_deref(), Some("1.50 KB"));
        assert_eq!(archive.relative, "/archive");

        let docs = &listing.files[1];
        assert_eq!(docs.kind, EntryType::Folder);
        assert_eq!(docs.relative, "/docs/");
        assert!(docs.size.is_none());
    }

    #[tokio::test]
    async fn test_nested_listing_has_parent_and_breadcrumbs() {
        let site = site();
        let settings = settings(&site, ServeConfig::default());
        let listing = expect_listing(listing(&settings, "/docs/guides").await);

        assert_eq!(listing.directory, "site/docs/guides/");
        assert_eq!(listing.files[0].base, "..");
        assert_eq!(listing.files[0].relative, "/docs/");
        assert_eq!(
            listing.paths,
            vec![
                Breadcrumb { name: "site/".into(), url: String::new() },
                Breadcrumb { name: "docs/".into(), url: "docs/".into() },
                Breadcrumb { name: "guides/".into(), url: "docs/guides/".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_slash_false_drops_suffix() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                trailing_slash: Some(false),
                ..ServeConfig::default()
            },
        );
        let listing = expect_listing(listing(&settings, "/docs").await);
        assert_eq!(listing.directory, "site/docs");
        assert_eq!(listing.files[0].relative, "/");
        assert_eq!(listing.files[1].base, "guides");
        assert_eq!(listing.files[1].relative, "/docs/guides");
    }

    #[tokio::test]
    async fn test_unlisted_patterns() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                unlisted: vec!["*.md".into()],
                ..ServeConfig::default()
            },
        );
        let listing = expect_listing(listing(&settings, "/").await);
        assert!(listing.files.iter().all(|f| f.base != "A.md"));
        assert!(listing.files.iter().all(|f| !f.base.starts_with('.')));
    }

    #[tokio::test]
    async fn test_listing_disabled() {
        let site = site();
        let off = settings(
            &site,
            ServeConfig {
                directory_listing: Some(Toggle::Flag(false)),
                ..ServeConfig::default()
            },
        );
        assert_eq!(listing(&off, "/").await, ListingOutcome::Disabled);

        let partial = settings(
            &site,
            ServeConfig {
                directory_listing: Some(Toggle::Sources(vec!["/docs/**".into()])),
                ..ServeConfig::default()
            },
        );
        assert_eq!(listing(&partial, "/").await, ListingOutcome::Disabled);
        expect_listing(listing(&partial, "/docs/guides").await);
    }

    #[tokio::test]
    async fn test_render_single() {
        let site = site();
        let settings = settings(
            &site,
            ServeConfig {
                render_single: true,
                ..ServeConfig::default()
            },
        );
        match listing(&settings, "/solo").await {
            ListingOutcome::SingleFile(single) => {
                assert_eq!(single.relative, "/solo/only.txt");
                assert_eq!(single.absolute, site.root.join("solo/only.txt"));
                assert!(!single.is_symlink);
            }
            other => panic!("expected single file, got {other:?}"),
        }

        // A lone folder is still listed.
        expect_listing(listing(&settings, "/nest").await);
        expect_listing(listing(&settings, "/docs").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_entries() {
        let site = site();
        std::os::unix::fs::symlink(site.root.join("b.txt"), site.root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(site.root.join("gone"), site.root.join("dangling")).unwrap();

        let plain = settings(&site, ServeConfig::default());
        let listing_without = expect_listing(listing(&plain, "/").await);
        assert!(listing_without.files.iter().all(|f| f.base != "link.txt"));

        let linked = settings(
            &site,
            ServeConfig {
                symlinks: true,
                ..ServeConfig::default()
            },
        );
        let listing_with = expect_listing(listing(&linked, "/").await);
        let link = listing_with.files.iter().find(|f| f.base == "link.txt").unwrap();
        assert_eq!(link.size.as_deref(), Some("3.00 B"));
        assert!(listing_with.files.iter().all(|f| f.base != "dangling"));
    }

    #[test]
    fn test_json_shape() {
        let entry = ListingEntry {
            base: "a.txt".into(),
            relative: "/a.txt".into(),
            title: "a.txt".into(),
            kind: EntryType::File,
            ext: "txt".into(),
            size: Some("1.00 B".into()),
            mtime: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "file");
        assert!(value.get("mtime").is_none());
    }
}
