//! "Sign these bytes" abstraction, spec §4.3: PGP detached (armored or
//! binary), PGP clearsign, and RSA-over-SHA1 digest signing, plus a
//! delegation hook (`sign_fn`) for callers who'd rather not hand the
//! engine raw key material (e.g. a remote KMS).

pub mod pgp;
pub mod rsa_legacy;

use std::sync::Arc;

use crate::error::{CryptoError, PkgResult};

/// A caller-supplied signing delegate: takes the bytes to sign, returns
/// the signature bytes. Boxed as `Send + Sync` so a `Signer` can be moved
/// across threads along with the `Info` it signs for (spec §5).
pub type SignFn = Arc<dyn Fn(&[u8]) -> PkgResult<Vec<u8>> + Send + Sync>;

/// Key material plus the bits needed to select one signing key out of a
/// keyring.
#[derive(Clone)]
pub struct KeyMaterial {
    /// ASCII-armored or binary key bytes (PGP keyring, or PEM for RSA).
    pub bytes: Vec<u8>,
    /// Passphrase, if the key is encrypted.
    pub passphrase: Option<String>,
    /// Disambiguates among multiple signing-capable keys in a keyring.
    pub key_id: Option<String>,
}

/// A signing capability: either real key material the engine loads
/// itself, or a delegate the caller provides.
#[derive(Clone)]
pub enum Signer {
    /// Sign using key material the engine loads and holds in memory for
    /// the duration of one `package()` call.
    Keyring(KeyMaterial),
    /// Delegate signing to a caller-supplied function (e.g. a remote
    /// KMS). The engine never touches raw key material in this mode.
    Delegated(SignFn),
}

impl Signer {
    /// PGP detached signature in binary form. Used by APK's
    /// SHA1-over-control-tar signature and RPM's header+payload
    /// signature.
    pub fn pgp_detached_binary(&self, message: &[u8]) -> PkgResult<Vec<u8>> {
        match self {
            Signer::Keyring(km) => pgp::detached_binary(km, message).map_err(|e| {
                crate::error::PkgError::signing(e)
            }),
            Signer::Delegated(f) => f(message),
        }
    }

    /// PGP detached signature, ASCII-armored. Used by `.deb` debsign.
    pub fn pgp_detached_armored(&self, message: &[u8]) -> PkgResult<Vec<u8>> {
        match self {
            Signer::Keyring(km) => pgp::detached_armored(km, message).map_err(|e| {
                crate::error::PkgError::signing(e)
            }),
            Signer::Delegated(f) => f(message),
        }
    }

    /// PGP clearsigned envelope. Used by `.deb` dpkg-sig.
    pub fn pgp_clearsigned(&self, message: &[u8]) -> PkgResult<Vec<u8>> {
        match self {
            Signer::Keyring(km) => pgp::clearsigned(km, message).map_err(|e| {
                crate::error::PkgError::signing(e)
            }),
            Signer::Delegated(f) => f(message),
        }
    }

    /// RSA signature over a SHA-1 digest (RPM legacy signature).
    /// `digest` must be exactly 20 bytes.
    pub fn rsa_sign_sha1_digest(&self, digest: &[u8]) -> PkgResult<Vec<u8>> {
        if digest.len() != 20 {
            return Err(crate::error::PkgError::signing(
                CryptoError::DigestSizeMismatch {
                    expected: 20,
                    actual: digest.len(),
                },
            ));
        }
        match self {
            Signer::Keyring(km) => rsa_legacy::sign_sha1_digest(km, digest)
                .map_err(crate::error::PkgError::signing),
            Signer::Delegated(f) => f(digest),
        }
    }

    /// Verify a detached PGP signature against `message`, using `cert` as
    /// the public keyring. Not required by `package()` itself, but added
    /// so the test suite can assert a signature is valid without shelling
    /// out to `gpg` (spec §8's round-trip law, "independent reader...
    /// reports the metadata that was written").
    pub fn verify_detached(
        cert_bytes: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> PkgResult<()> {
        pgp::verify_detached(cert_bytes, message, signature)
            .map_err(crate::error::PkgError::signing)
    }
}
