//! Source-tree catalog: the frozen, ordered entry lists the workers own.
//!
//! The walk runs once, before any worker starts; after [`FileList::partition`]
//! every entry belongs to exactly one worker and nothing mutates the lists
//! again. All planning and writing works off this snapshot.

use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::error::ArchiveError;

/// What kind of object an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for a single object bound for the archive.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Position within the owning worker's list.
    pub ordinal: usize,
    /// Path of the source object on disk.
    pub path: PathBuf,
    /// Slash-separated name the entry gets inside the archive.
    pub name: String,
    pub kind: EntryKind,
    /// Data size in bytes; 0 for directories and symlinks.
    pub size: u64,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    /// Target of a symlink entry.
    pub link_target: Option<PathBuf>,
}

/// Ordered, immutable sequence of entries owned by one worker.
#[derive(Debug, Default)]
pub struct FileList {
    pub entries: Vec<Entry>,
}

impl FileList {
    /// Split the list into exactly `parts` consecutive slices, reassigning
    /// ordinals within each. Trailing lists may be empty; every worker gets
    /// one either way, since all of them join the collective operations.
    pub fn partition(self, parts: usize) -> Vec<FileList> {
        let parts = parts.max(1);
        let mut lists: Vec<FileList> = Vec::with_capacity(parts);
        let chunk_sz = (self.entries.len() + parts - 1) / parts;
        if chunk_sz > 0 {
            for slice in self.entries.chunks(chunk_sz) {
                let mut entries = slice.to_vec();
                for (i, entry) in entries.iter_mut().enumerate() {
                    entry.ordinal = i;
                }
                lists.push(FileList { entries });
            }
        }
        while lists.len() < parts {
            lists.push(FileList::default());
        }
        lists
    }
}

/// Walk the source roots into one ordered entry list.
///
/// Symlinks are recorded, not followed. Objects that are neither file,
/// directory nor symlink (sockets, fifos, devices) are skipped with a
/// warning.
pub fn scan(roots: &[PathBuf]) -> Result<FileList, ArchiveError> {
    let base = name_base(roots);
    let mut entries = Vec::new();
    for root in roots {
        for dirent in WalkDir::new(root).follow_links(false) {
            let dirent = dirent?;
            let path = dirent.path();
            let meta = path
                .symlink_metadata()
                .map_err(|e| ArchiveError::Io { source: e, path: path.to_path_buf() })?;
            let Some(kind) = kind_of(&meta) else {
                warn!("skipping special file '{}'", path.display());
                continue;
            };
            let name = archive_name(path, &base);
            if name.is_empty() {
                continue;
            }
            let link_target = if kind == EntryKind::Symlink {
                Some(std::fs::read_link(path).map_err(|e| ArchiveError::Io {
                    source: e,
                    path: path.to_path_buf(),
                })?)
            } else {
                None
            };
            entries.push(Entry {
                ordinal: entries.len(),
                path: path.to_path_buf(),
                name,
                kind,
                size: if kind == EntryKind::File { meta.len() } else { 0 },
                mode: unix_mode(&meta),
                uid: unix_uid(&meta),
                gid: unix_gid(&meta),
                mtime: unix_mtime(&meta),
                link_target,
            });
        }
    }
    Ok(FileList { entries })
}

fn kind_of(meta: &Metadata) -> Option<EntryKind> {
    let ft = meta.file_type();
    if ft.is_symlink() {
        Some(EntryKind::Symlink)
    } else if ft.is_dir() {
        Some(EntryKind::Directory)
    } else if ft.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

/// Directory that archive names are made relative to: the common ancestor of
/// the roots, or its parent when a lone root would otherwise name itself
/// with an empty string.
fn name_base(roots: &[PathBuf]) -> PathBuf {
    let base = common_parent(roots);
    if roots.len() == 1 && base == roots[0] {
        return base.parent().map(Path::to_path_buf).unwrap_or_default();
    }
    base
}

/// Returns the longest common ancestor directory shared by all provided
/// paths. If the slice is empty, an empty `PathBuf` is returned.
fn common_parent(paths: &[PathBuf]) -> PathBuf {
    if paths.is_empty() {
        return PathBuf::new();
    }

    let mut prefix: Vec<Component> = paths[0].components().collect();
    for p in &paths[1..] {
        let comps: Vec<Component> = p.components().collect();
        let mut idx = 0usize;
        while idx < prefix.len() && idx < comps.len() && prefix[idx] == comps[idx] {
            idx += 1;
        }
        prefix.truncate(idx);
        if prefix.is_empty() {
            break;
        }
    }

    let mut out = PathBuf::new();
    for c in prefix {
        out.push(c.as_os_str());
    }

    if out.as_os_str().is_empty() {
        if let Some(par) = paths[0].parent() {
            return par.to_path_buf();
        }
    }

    out
}

fn archive_name(path: &Path, base: &Path) -> String {
    let rel = match path.strip_prefix(base) {
        Ok(p) if !p.as_os_str().is_empty() => p,
        _ => path,
    };
    normalize_name(&rel.to_string_lossy())
}

/// Normalize an archive name: forward slashes only, no leading `./`, no
/// doubled separators.
fn normalize_name(name: &str) -> String {
    let s = name.replace('\\', "/");
    let trimmed = s.strip_prefix("./").unwrap_or(&s);
    trimmed.replace("//", "/").trim_start_matches('/').to_string()
}

#[cfg(unix)]
fn unix_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(unix)]
fn unix_uid(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.uid() as u64
}

#[cfg(unix)]
fn unix_gid(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.gid() as u64
}

#[cfg(unix)]
fn unix_mtime(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.mtime().max(0) as u64
}

#[cfg(not(unix))]
fn unix_mode(meta: &Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn unix_uid(_meta: &Metadata) -> u64 {
    0
}

#[cfg(not(unix))]
fn unix_gid(_meta: &Metadata) -> u64 {
    0
}

#[cfg(not(unix))]
fn unix_mtime(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ordinal: usize) -> Entry {
        Entry {
            ordinal,
            path: PathBuf::from("x"),
            name: format!("e{ordinal}"),
            kind: EntryKind::File,
            size: 1,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            link_target: None,
        }
    }

    #[test]
    fn partition_keeps_order_and_renumbers() {
        let list = FileList { entries: (0..7).map(entry).collect() };
        let parts = list.partition(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].entries.len(), 3);
        assert_eq!(parts[1].entries.len(), 3);
        assert_eq!(parts[2].entries.len(), 1);
        for part in &parts {
            for (i, e) in part.entries.iter().enumerate() {
                assert_eq!(e.ordinal, i);
            }
        }
        assert_eq!(parts[1].entries[0].name, "e3");
        assert_eq!(parts[2].entries[0].name, "e6");
    }

    #[test]
    fn partition_pads_empty_lists() {
        let list = FileList { entries: vec![entry(0)] };
        let parts = list.partition(4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].entries.len(), 1);
        assert!(parts[1].entries.is_empty());
        assert!(parts[3].entries.is_empty());
    }

    #[test]
    fn normalize_strips_dot_and_doubles() {
        assert_eq!(normalize_name("./dir1//dir2/file.txt"), "dir1/dir2/file.txt");
        assert_eq!(normalize_name("a\\b"), "a/b");
    }
}
