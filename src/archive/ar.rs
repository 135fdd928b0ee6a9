//! Unix `ar` archive writer, used as the outer container for `.deb` and
//! the `.ipk` intermediate layout. Spec §4.2.
//!
//! Format: an 8-byte global magic (`!<arch>\n`), followed by one 60-byte
//! header per member (space-padded ASCII fields), followed by the
//! member's body, padded to an even length with a trailing `\n`.

use std::io::{self, Write};

use crate::error::ArchiveError;

const GLOBAL_MAGIC: &[u8; 8] = b"!<arch>\n";

/// Writes a stream of whole-body members to an `ar` archive. Every member
/// is written in one call (`add_member`) because `ar` headers carry an
/// exact size that must be known before the header is emitted — there is
/// no two-pass "reserve, patch" story needed since callers already have
/// the whole member in memory (spec's own note in §9 that inner archives
/// are buffered in memory for typical package sizes).
pub struct ArWriter<W: Write> {
    inner: W,
    wrote_magic: bool,
}

impl<W: Write> ArWriter<W> {
    /// Start a new `ar` archive, writing the global magic immediately.
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(GLOBAL_MAGIC)?;
        Ok(ArWriter {
            inner,
            wrote_magic: true,
        })
    }

    /// Append one member: a 60-byte header followed by `data`, then a
    /// single `\n` pad byte if `data.len()` is odd.
    pub fn add_member(
        &mut self,
        name: &str,
        mtime: i64,
        uid: u32,
        gid: u32,
        mode: u32,
        data: &[u8],
    ) -> Result<(), ArchiveError> {
        debug_assert!(self.wrote_magic);
        if name.len() > 16 {
            return Err(ArchiveError::NameTooLong(name.to_string()));
        }
        let header = format_header(name, mtime, uid, gid, mode, data.len());
        self.inner.write_all(&header).map_err(ArchiveError::Write)?;
        self.inner.write_all(data).map_err(ArchiveError::Write)?;
        if data.len() % 2 == 1 {
            self.inner.write_all(b"\n").map_err(ArchiveError::Write)?;
        }
        Ok(())
    }

    /// Reclaim the underlying writer. `ar` has no trailer, so this is
    /// just a handle-back.
    pub fn close(self) -> W {
        self.inner
    }
}

/// Build one 60-byte `ar` member header.
///
/// Layout: `name(16) mtime(12) uid(6) gid(6) mode(8, octal) size(10)
/// magic("\`\n", 2)`, all left-justified and space-padded except mode
/// which is octal (also space-padded).
fn format_header(name: &str, mtime: i64, uid: u32, gid: u32, mode: u32, size: usize) -> Vec<u8> {
    let mut header = vec![b' '; 60];
    write_field(&mut header[0..16], name.as_bytes());
    write_field(&mut header[16..28], mtime.to_string().as_bytes());
    write_field(&mut header[28..34], uid.to_string().as_bytes());
    write_field(&mut header[34..40], gid.to_string().as_bytes());
    write_field(&mut header[40..48], format!("{mode:o}").as_bytes());
    write_field(&mut header[48..58], size.to_string().as_bytes());
    header[58] = b'`';
    header[59] = b'\n';
    header
}

fn write_field(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_magic_and_padded_member() {
        let mut buf = Vec::new();
        {
            let mut w = ArWriter::new(&mut buf).unwrap();
            w.add_member("debian-binary", 0, 0, 0, 0o100644, b"2.0\n")
                .unwrap();
        }
        assert_eq!(&buf[0..8], b"!<arch>\n");
        assert_eq!(&buf[8..21], b"debian-binary");
        // 60-byte header + 4-byte body, even length already so no pad.
        assert_eq!(buf.len(), 8 + 60 + 4);
    }

    #[test]
    fn odd_length_body_is_padded() {
        let mut buf = Vec::new();
        let mut w = ArWriter::new(&mut buf).unwrap();
        w.add_member("x", 0, 0, 0, 0o100644, b"odd").unwrap();
        assert_eq!(buf.len(), 8 + 60 + 3 + 1);
        assert_eq!(buf.last(), Some(&b'\n'));
    }

    #[test]
    fn rejects_overlong_names() {
        let mut buf = Vec::new();
        let mut w = ArWriter::new(&mut buf).unwrap();
        let err = w
            .add_member("this-name-is-way-too-long-for-ar", 0, 0, 0, 0, b"")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong(_)));
    }
}
