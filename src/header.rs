//! Record-header serialization: one fixed 1536-byte pax header per entry.
//!
//! Each record opens with three 512-byte blocks: an extended-header
//! descriptor (`x` type), one block of pax records, and the ustar header
//! proper. The layout planner reserves exactly [`HEADER_LEN`] bytes for
//! them, so the pax records must fit a single block; an entry whose records
//! overflow is rejected before anything is written.
//!
//! Headers of different entries never overlap, so workers write them in any
//! order, concurrently with chunk copies of other entries.

use std::path::Path;

use log::debug;
use tar::{EntryType, Header};

use crate::catalog::{Entry, EntryKind, FileList};
use crate::error::ArchiveError;
use crate::layout::OffsetPlan;
use crate::writer::SharedWriter;

/// On-disk length of every record header.
pub const HEADER_LEN: u64 = 1536;

const BLOCK: usize = 512;

/// Options that shape header contents.
#[derive(Debug, Clone, Copy)]
pub struct HeaderOptions {
    /// Record owner, group and extended attributes.
    pub preserve: bool,
}

/// Serialize and write the record header of every entry in `list` at its
/// planned offset. One positioned write per entry.
pub fn write_headers(
    list: &FileList,
    plan: &OffsetPlan,
    writer: &SharedWriter,
    opts: HeaderOptions,
) -> Result<(), ArchiveError> {
    for entry in &list.entries {
        let offset = plan.offsets[entry.ordinal];
        let block = serialize(entry, opts)?;
        writer.positioned_write(offset, &block).map_err(|e| ArchiveError::Copy {
            source: e,
            path: entry.path.clone(),
            offset,
        })?;
        debug!("header '{}' at offset {}", entry.name, offset);
    }
    Ok(())
}

/// Build the full 1536-byte header for one entry.
pub fn serialize(entry: &Entry, opts: HeaderOptions) -> Result<[u8; HEADER_LEN as usize], ArchiveError> {
    let records = pax_records(entry, opts);
    if records.len() > BLOCK {
        return Err(ArchiveError::HeaderOverflow {
            path: entry.name.clone(),
            needed: records.len(),
            max: BLOCK,
        });
    }

    let mut out = [0u8; HEADER_LEN as usize];

    // Block 0: extended-header descriptor.
    let mut xhdr = Header::new_ustar();
    set_name(&mut xhdr, &pax_header_name(&entry.name));
    xhdr.set_entry_type(EntryType::XHeader);
    xhdr.set_size(records.len() as u64);
    xhdr.set_mode(0o644);
    xhdr.set_mtime(entry.mtime);
    xhdr.set_cksum();
    out[..BLOCK].copy_from_slice(xhdr.as_bytes());

    // Block 1: the pax records, zero-padded.
    out[BLOCK..BLOCK + records.len()].copy_from_slice(&records);

    // Block 2: the ustar header proper.
    let mut hdr = Header::new_ustar();
    set_name(&mut hdr, &display_name(entry));
    hdr.set_entry_type(match entry.kind {
        EntryKind::File => EntryType::Regular,
        EntryKind::Directory => EntryType::Directory,
        EntryKind::Symlink => EntryType::Symlink,
    });
    hdr.set_size(if entry.kind == EntryKind::File { entry.size } else { 0 });
    hdr.set_mode(entry.mode & 0o7777);
    hdr.set_uid(if opts.preserve { entry.uid } else { 0 });
    hdr.set_gid(if opts.preserve { entry.gid } else { 0 });
    hdr.set_mtime(entry.mtime);
    if let Some(target) = &entry.link_target {
        set_link(&mut hdr, target);
    }
    hdr.set_cksum();
    out[2 * BLOCK..].copy_from_slice(hdr.as_bytes());

    Ok(out)
}

/// Archive name as it appears in the ustar block; directories carry a
/// trailing slash.
fn display_name(entry: &Entry) -> String {
    match entry.kind {
        EntryKind::Directory => format!("{}/", entry.name),
        _ => entry.name.clone(),
    }
}

fn pax_records(entry: &Entry, opts: HeaderOptions) -> Vec<u8> {
    let mut records = Vec::new();
    push_record(&mut records, "path", display_name(entry).as_bytes());
    push_record(&mut records, "mtime", entry.mtime.to_string().as_bytes());
    if entry.kind == EntryKind::File {
        push_record(&mut records, "size", entry.size.to_string().as_bytes());
    }
    if let Some(target) = &entry.link_target {
        let target = target.to_string_lossy();
        if target.len() > 100 {
            push_record(&mut records, "linkpath", target.as_bytes());
        }
    }
    if opts.preserve {
        push_record(&mut records, "uid", entry.uid.to_string().as_bytes());
        push_record(&mut records, "gid", entry.gid.to_string().as_bytes());
        for (key, value) in xattrs_of(&entry.path) {
            push_record(&mut records, &format!("SCHILY.xattr.{key}"), &value);
        }
    }
    records
}

/// Append one `"<len> <key>=<value>\n"` record; `<len>` counts the whole
/// record including its own digits.
fn push_record(out: &mut Vec<u8>, key: &str, value: &[u8]) {
    let base = key.len() + value.len() + 3;
    let mut total = base + 1;
    while total != base + total.to_string().len() {
        total = base + total.to_string().len();
    }
    out.extend_from_slice(total.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(key.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value);
    out.push(b'\n');
}

/// Name stored in the descriptor block. Readers ignore it; it only has to
/// fit the plain 100-byte field.
fn pax_header_name(name: &str) -> String {
    let mut s = format!("PaxHeaders/{name}");
    if s.len() > 100 {
        let mut cut = 100;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}

/// Store a name in the header, falling back to a truncated stand-in when it
/// exceeds the ustar fields; the pax `path` record carries the real name.
fn set_name(hdr: &mut Header, name: &str) {
    if hdr.set_path(name).is_ok() {
        return;
    }
    let bytes = name.as_bytes();
    if let Some(ustar) = hdr.as_ustar_mut() {
        let n = bytes.len().min(ustar.name.len());
        ustar.name[..n].copy_from_slice(&bytes[..n]);
    }
}

fn set_link(hdr: &mut Header, target: &Path) {
    if hdr.set_link_name(target).is_ok() {
        return;
    }
    // Too long for the field; the pax `linkpath` record carries the target.
    let lossy = target.to_string_lossy();
    let bytes = lossy.as_bytes();
    if let Some(ustar) = hdr.as_ustar_mut() {
        let n = bytes.len().min(ustar.linkname.len());
        ustar.linkname[..n].copy_from_slice(&bytes[..n]);
    }
}

/// Extended attributes of a source object, ACL entries included (Linux
/// stores POSIX ACLs as `system.posix_acl_*` attributes).
#[cfg(target_os = "linux")]
fn xattrs_of(path: &Path) -> Vec<(String, Vec<u8>)> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return Vec::new();
    };
    let mut names = vec![0u8; 4096];
    let n = unsafe {
        libc::llistxattr(cpath.as_ptr(), names.as_mut_ptr() as *mut libc::c_char, names.len())
    };
    if n <= 0 {
        return Vec::new();
    }
    names.truncate(n as usize);

    let mut out = Vec::new();
    for name in names.split(|b| *b == 0).filter(|s| !s.is_empty()) {
        let Ok(cname) = CString::new(name) else { continue };
        let mut value = vec![0u8; 4096];
        let vn = unsafe {
            libc::lgetxattr(
                cpath.as_ptr(),
                cname.as_ptr(),
                value.as_mut_ptr() as *mut libc::c_void,
                value.len(),
            )
        };
        if vn < 0 {
            continue;
        }
        value.truncate(vn as usize);
        out.push((String::from_utf8_lossy(name).into_owned(), value));
    }
    out
}

#[cfg(not(target_os = "linux"))]
fn xattrs_of(_path: &Path) -> Vec<(String, Vec<u8>)> {
    Vec::new()
}
