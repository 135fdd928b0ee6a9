//! Byte-level archive writers: `ar` (Debian/IPK outer container), `tar`
//! (GNU, install trees), and `cpio` (SVR4 newc, RPM payload). Spec §4.2.
//!
//! Each writer follows the same shape spec §4.2 calls for:
//! `write_header(meta) -> write_body(bytes) -> close()`. None of these
//! buffer their *own* output beyond what's needed to compute a size
//! up-front when the format requires it (ar/cpio headers carry an exact
//! byte count); callers that need that are expected to measure first (see
//! `archive::ar::member_from_bytes`).

pub mod ar;
pub mod compress;
pub mod cpio;
pub mod tarw;

/// Common per-entry metadata every writer in this module accepts. Not
/// every field is meaningful to every format (e.g. `ar` has no notion of
/// directories).
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Path/name as it should appear in the archive.
    pub name: String,
    /// Unix mode bits (including type bits where the format encodes them,
    /// e.g. tar/cpio; ar encodes only permission bits).
    pub mode: u32,
    /// Owning user id (numeric) — used by `ar`/`cpio`; tar additionally
    /// carries `uname`.
    pub uid: u64,
    /// Owning group id (numeric).
    pub gid: u64,
    /// Owning user name (tar only).
    pub uname: String,
    /// Owning group name (tar only).
    pub gname: String,
    /// Modification time, Unix seconds.
    pub mtime: i64,
    /// Entry kind.
    pub kind: EntryKind,
    /// Symlink target, meaningful only when `kind == Symlink`.
    pub link_target: String,
}

/// The kind of filesystem object an archive entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
}

impl EntryMeta {
    /// A regular file entry with root ownership, the common case for
    /// control-archive members.
    pub fn regular(name: impl Into<String>, mode: u32, mtime: i64) -> Self {
        EntryMeta {
            name: name.into(),
            mode,
            uid: 0,
            gid: 0,
            uname: "root".to_string(),
            gname: "root".to_string(),
            mtime,
            kind: EntryKind::Regular,
            link_target: String::new(),
        }
    }
}
