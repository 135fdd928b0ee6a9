//! Checksum helpers shared by every packager: MD5 (Debian `md5sums`),
//! SHA-256 (RPM file/payload digests), SHA-1 (APK's signed control-tar
//! digest). One pass over the bytes per checksum, no double reads (spec
//! §9's "Checksum ordering ambiguity" note).

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex_lower(&hasher.finalize())
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_lower(&hasher.finalize())
}

/// Raw SHA-1 digest bytes of `data` (20 bytes), for RPM's legacy RSA
/// signature and APK's control-tar signature.
pub fn sha1_bytes(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// A [`std::io::Write`] sink that tees every byte written into an MD5
/// hasher while forwarding to an inner writer — used so a tar writer and
/// the `md5sums` manifest are built from a single read of the source
/// file, per spec §9.
pub struct TeeMd5<W> {
    inner: W,
    hasher: Md5,
}

impl<W> TeeMd5<W> {
    /// Wrap `inner`, starting a fresh MD5 hasher.
    pub fn new(inner: W) -> Self {
        TeeMd5 {
            inner,
            hasher: Md5::new(),
        }
    }

    /// Consume the wrapper, returning the inner writer and the lowercase
    /// hex digest of everything written through it.
    pub fn finish(self) -> (W, String) {
        (self.inner, hex_lower(&self.hasher.finalize()))
    }
}

impl<W: std::io::Write> std::io::Write for TeeMd5<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_string_is_well_known() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn sha256_of_empty_string_is_well_known() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }
}
