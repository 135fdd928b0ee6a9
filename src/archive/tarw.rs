//! GNU tar writer built on the `tar` crate, used for every format's
//! install-tree archive (Debian/IPK `data.tar`, Arch's package tar,
//! APK's control/data tars before their single-trailer truncation). Spec
//! §4.2.

use std::io::{self, Write};

use tar::{Builder, EntryType, Header};

use super::{EntryKind, EntryMeta};
use crate::error::ArchiveError;

/// How many trailing 512-byte zero blocks to write when closing the
/// archive. GNU tar and most consumers expect two; APK's concatenated
/// gzip streams need exactly one (spec §9, "APK two-EOF-block vs. one").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailer {
    /// The standard two zero blocks.
    Standard,
    /// A single zero block, for APK.
    Single,
}

/// Thin wrapper over `tar::Builder` that writes entries from our
/// [`EntryMeta`] + body shape and controls the trailer length.
pub struct TarWriter<W: Write> {
    builder: Builder<W>,
}

impl<W: Write> TarWriter<W> {
    /// Start a new tar stream over `inner`.
    pub fn new(inner: W) -> Self {
        TarWriter {
            builder: Builder::new(inner),
        }
    }

    /// Append one entry. `data` is ignored for directories and symlinks.
    pub fn add_entry(&mut self, meta: &EntryMeta, data: &[u8]) -> Result<(), ArchiveError> {
        let mut header = Header::new_gnu();
        header.set_mode(meta.mode);
        header.set_uid(meta.uid);
        header.set_gid(meta.gid);
        let _ = header.set_username(&meta.uname);
        let _ = header.set_groupname(&meta.gname);
        header.set_mtime(meta.mtime.max(0) as u64);

        match meta.kind {
            EntryKind::Regular => {
                header.set_entry_type(EntryType::Regular);
                header.set_size(data.len() as u64);
                header.set_cksum();
                self.builder
                    .append_data(&mut header, &meta.name, data)
                    .map_err(ArchiveError::Write)?;
            }
            EntryKind::Directory => {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_cksum();
                let name = if meta.name.ends_with('/') {
                    meta.name.clone()
                } else {
                    format!("{}/", meta.name)
                };
                self.builder
                    .append_data(&mut header, &name, io::empty())
                    .map_err(ArchiveError::Write)?;
            }
            EntryKind::Symlink => {
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_cksum();
                self.builder
                    .append_link(&mut header, &meta.name, &meta.link_target)
                    .map_err(ArchiveError::Write)?;
            }
        }
        Ok(())
    }

    /// Finish the archive, writing `trailer`'s zero block(s), and return
    /// the underlying writer.
    pub fn close(self, trailer: Trailer) -> Result<W, ArchiveError> {
        let mut inner = self.builder.into_inner().map_err(ArchiveError::Write)?;
        let blocks = match trailer {
            Trailer::Standard => 2,
            Trailer::Single => 1,
        };
        for _ in 0..blocks {
            inner.write_all(&[0u8; 512]).map_err(ArchiveError::Write)?;
        }
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_trailer_is_one_block_shorter() {
        let meta = EntryMeta::regular("foo", 0o644, 0);

        let mut buf_standard = Vec::new();
        {
            let mut w = TarWriter::new(&mut buf_standard);
            w.add_entry(&meta, b"hi").unwrap();
            w.close(Trailer::Standard).unwrap();
        }

        let mut buf_single = Vec::new();
        {
            let mut w = TarWriter::new(&mut buf_single);
            w.add_entry(&meta, b"hi").unwrap();
            w.close(Trailer::Single).unwrap();
        }

        assert_eq!(buf_standard.len() - buf_single.len(), 512);
    }
}
