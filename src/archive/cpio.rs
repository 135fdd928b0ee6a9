//! SVR4 "newc" cpio writer, used for the RPM payload. Spec §4.2.
//!
//! No crate in this workspace's dependency set implements newc cpio, so
//! this is hand-rolled: an ASCII header (`070701` magic + 13 eight-digit
//! hex fields), the filename (null-terminated, then padded to a 4-byte
//! boundary measured from the start of the header), the file body (also
//! padded to a 4-byte boundary), and a zero-length `TRAILER!!!` record at
//! the end.

use std::io::{self, Write};

use super::{EntryKind, EntryMeta};
use crate::error::ArchiveError;

const MAGIC: &[u8; 6] = b"070701";
const TRAILER_NAME: &str = "TRAILER!!!";

/// Writes entries to a newc cpio stream.
pub struct CpioWriter<W: Write> {
    inner: W,
    next_ino: u32,
}

impl<W: Write> CpioWriter<W> {
    /// Start a new cpio stream.
    pub fn new(inner: W) -> Self {
        CpioWriter {
            inner,
            next_ino: 1,
        }
    }

    /// Append one entry. `nlink` follows the cpio convention: `2` for
    /// directories (for `.` within them), `1` otherwise, per spec §4.5.
    pub fn add_entry(&mut self, meta: &EntryMeta, data: &[u8]) -> Result<(), ArchiveError> {
        let ino = self.next_ino;
        self.next_ino += 1;

        let file_type_bits: u32 = match meta.kind {
            EntryKind::Regular => 0o100000,
            EntryKind::Directory => 0o040000,
            EntryKind::Symlink => 0o120000,
        };
        let nlink = if meta.kind == EntryKind::Directory {
            2
        } else {
            1
        };
        let body: &[u8] = match meta.kind {
            EntryKind::Symlink => meta.link_target.as_bytes(),
            _ => data,
        };

        let name_with_nul = format!("{}\0", meta.name);
        let header = build_header(
            ino,
            file_type_bits | (meta.mode & 0o7777),
            meta.uid as u32,
            meta.gid as u32,
            nlink,
            meta.mtime.max(0) as u32,
            body.len() as u32,
            name_with_nul.len() as u32,
        );

        self.write_padded(&header, &name_with_nul.into_bytes(), body)
    }

    fn write_padded(&mut self, header: &[u8], name: &[u8], body: &[u8]) -> Result<(), ArchiveError> {
        self.inner.write_all(header).map_err(ArchiveError::Write)?;
        self.inner.write_all(name).map_err(ArchiveError::Write)?;
        pad4(&mut self.inner, (header.len() + name.len()) as u64)
            .map_err(ArchiveError::Write)?;
        self.inner.write_all(body).map_err(ArchiveError::Write)?;
        pad4(&mut self.inner, body.len() as u64).map_err(ArchiveError::Write)?;
        Ok(())
    }

    /// Write the `TRAILER!!!` record and return the underlying writer.
    pub fn close(mut self) -> Result<W, ArchiveError> {
        let name_with_nul = format!("{TRAILER_NAME}\0");
        let header = build_header(0, 0, 0, 0, 1, 0, 0, name_with_nul.len() as u32);
        self.write_padded(&header, name_with_nul.as_bytes(), &[])?;
        Ok(self.inner)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_header(
    ino: u32,
    mode: u32,
    uid: u32,
    gid: u32,
    nlink: u32,
    mtime: u32,
    filesize: u32,
    namesize: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(110);
    out.extend_from_slice(MAGIC);
    for field in [
        ino, mode, uid, gid, nlink, mtime, filesize,
        0, // devmajor
        0, // devminor
        0, // rdevmajor
        0, // rdevminor
        namesize,
        0, // check
    ] {
        out.extend_from_slice(format!("{field:08X}").as_bytes());
    }
    out
}

fn pad4<W: Write>(w: &mut W, written: u64) -> io::Result<()> {
    let pad = (4 - (written % 4)) % 4;
    w.write_all(&[0u8; 4][..pad as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_starts_with_magic_and_is_110_bytes() {
        let header = build_header(1, 0o100644, 0, 0, 1, 0, 4, 5);
        assert_eq!(&header[0..6], b"070701");
        assert_eq!(header.len(), 110);
    }

    #[test]
    fn trailer_is_present_and_zero_length() {
        let mut buf = Vec::new();
        let w = CpioWriter::new(&mut buf);
        let buf = w.close().unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("TRAILER!!!"));
    }

    #[test]
    fn regular_file_round_trips_basic_fields() {
        let mut buf = Vec::new();
        let mut w = CpioWriter::new(&mut buf);
        let meta = EntryMeta::regular("./usr/bin/foo", 0o755, 0);
        w.add_entry(&meta, b"hello").unwrap();
        let buf = w.close().unwrap();
        assert!(buf.windows(13).any(|w| w == b"./usr/bin/foo"));
    }
}
