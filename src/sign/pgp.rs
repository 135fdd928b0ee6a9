//! PGP signing/verification on top of `sequoia-openpgp`, grounded on the
//! `paultag-deb-rs` example's choice of the crate (with its `crypto-rust`
//! feature, avoiding a C/Nettle dependency) for Debian-adjacent tooling.

use sequoia_openpgp as openpgp;

use openpgp::cert::prelude::*;
use openpgp::crypto::{KeyPair, Password};
use openpgp::parse::stream::{
    DetachedVerifierBuilder, MessageStructure, VerificationHelper,
};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Armorer, Message, Signer as StreamSigner};
use openpgp::serialize::SerializeInto;

use std::io::Write;

use crate::error::CryptoError;
use crate::sign::KeyMaterial;

fn load_cert(bytes: &[u8]) -> Result<Cert, CryptoError> {
    Cert::from_bytes(bytes).map_err(|e| CryptoError::OpenPgp(e.to_string()))
}

/// Find the unique signing-capable secret key in `cert`, optionally
/// narrowed by `key_id` (hex key id or fingerprint), and build a
/// [`KeyPair`] from it, decrypting with `passphrase` if needed.
fn signing_keypair(
    cert: &Cert,
    key_id: Option<&str>,
    passphrase: Option<&str>,
) -> Result<KeyPair, CryptoError> {
    let policy = StandardPolicy::new();
    let mut candidates: Vec<_> = cert
        .keys()
        .with_policy(&policy, None)
        .alive()
        .revoked(false)
        .for_signing()
        .secret()
        .collect();

    if let Some(kid) = key_id {
        candidates.retain(|ka| {
            ka.key().keyid().to_hex().eq_ignore_ascii_case(kid)
                || ka.key().fingerprint().to_hex().eq_ignore_ascii_case(kid)
        });
    }

    if candidates.is_empty() {
        return Err(CryptoError::KeyNotFound);
    }
    if candidates.len() > 1 {
        return Err(CryptoError::AmbiguousKey(candidates.len()));
    }

    let ka = candidates.into_iter().next().unwrap();
    let key = ka.key().clone();

    let unlocked = if key.secret().is_encrypted() {
        let pass = passphrase.ok_or(CryptoError::PassphraseRequired)?;
        key.decrypt_secret(&Password::from(pass))
            .map_err(|_| CryptoError::WrongPassphrase)?
    } else {
        key.clone()
    };

    unlocked
        .into_keypair()
        .map_err(|e| CryptoError::OpenPgp(e.to_string()))
}

/// A detached binary signature over `message`.
pub fn detached_binary(km: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cert = load_cert(&km.bytes)?;
    let keypair = signing_keypair(&cert, km.key_id.as_deref(), km.passphrase.as_deref())?;

    let mut sink = Vec::new();
    {
        let msg = Message::new(&mut sink);
        let mut signer = StreamSigner::new(msg, keypair)
            .detached()
            .build()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .write_all(message)
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .finalize()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
    }
    Ok(sink)
}

/// A detached, ASCII-armored signature over `message`, the form `.deb`
/// debsign stores in `_gpg<type>`.
pub fn detached_armored(km: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cert = load_cert(&km.bytes)?;
    let keypair = signing_keypair(&cert, km.key_id.as_deref(), km.passphrase.as_deref())?;

    let mut sink = Vec::new();
    {
        let msg = Message::new(&mut sink);
        let msg = Armorer::new(msg)
            .build()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        let mut signer = StreamSigner::new(msg, keypair)
            .detached()
            .build()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .write_all(message)
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .finalize()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
    }
    Ok(sink)
}

/// A clearsigned envelope wrapping `message`, the form `.deb` dpkg-sig
/// stores in `_gpgbuilder`.
pub fn clearsigned(km: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cert = load_cert(&km.bytes)?;
    let keypair = signing_keypair(&cert, km.key_id.as_deref(), km.passphrase.as_deref())?;

    let mut sink = Vec::new();
    {
        let msg = Message::new(&mut sink);
        let mut signer = StreamSigner::new(msg, keypair)
            .cleartext()
            .build()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .write_all(message)
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
        signer
            .finalize()
            .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
    }
    Ok(sink)
}

struct Helper<'a> {
    cert: &'a Cert,
}

impl<'a> VerificationHelper for Helper<'a> {
    fn get_certs(&mut self, _ids: &[openpgp::KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(vec![self.cert.clone()])
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        for layer in structure.into_iter() {
            if let openpgp::parse::stream::MessageLayer::SignatureGroup { results } = layer {
                if results.into_iter().any(|r| r.is_ok()) {
                    return Ok(());
                }
            }
        }
        Err(anyhow::anyhow!("no valid signature found"))
    }
}

/// Verify a detached signature over `message` against the public keyring
/// `cert_bytes`. Supplemental to the core engine (see `SPEC_FULL.md`
/// §6), used by this crate's own test suite in place of shelling out to
/// `gpg --verify`.
pub fn verify_detached(cert_bytes: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let cert = load_cert(cert_bytes)?;
    let policy = StandardPolicy::new();
    let helper = Helper { cert: &cert };
    let mut verifier = DetachedVerifierBuilder::from_bytes(signature)
        .map_err(|e| CryptoError::OpenPgp(e.to_string()))?
        .with_policy(&policy, None, helper)
        .map_err(|e| CryptoError::OpenPgp(e.to_string()))?;
    verifier
        .verify_bytes(message)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Load a PGP public-key certificate's bytes, re-exported for
/// `rsa_legacy`-adjacent key-material plumbing and for tests.
pub fn export_cert_bytes(cert: &Cert) -> Result<Vec<u8>, CryptoError> {
    cert.to_vec().map_err(|e| CryptoError::OpenPgp(e.to_string()))
}
