//! Legacy RSA-over-SHA1 signing, used for RPM's deprecated RSA header
//! signature (spec §4.5). Grounded on the teacher's own RustCrypto
//! dependency family (`sha2`/`sha3`/`blake2`): this adds `rsa` + `sha1`
//! from the same ecosystem rather than reaching for a C binding.

use pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::hazmat::PrehashSigner;
use rsa::RsaPrivateKey;
use sha1::Sha1;

use crate::error::CryptoError;
use crate::sign::KeyMaterial;

fn load_private_key(km: &KeyMaterial) -> Result<RsaPrivateKey, CryptoError> {
    let pem = std::str::from_utf8(&km.bytes).map_err(|_| CryptoError::NotRsaPem)?;

    if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(key);
    }

    if let Some(passphrase) = &km.passphrase {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase) {
            return Ok(key);
        }
    }

    match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(key) => Ok(key),
        Err(_) if km.passphrase.is_none() => Err(CryptoError::PassphraseRequired),
        Err(_) => Err(CryptoError::NotRsaPem),
    }
}

/// Sign a 20-byte SHA-1 digest with PKCS#1 v1.5 padding, as RPM's legacy
/// RSA header signature requires.
pub fn sign_sha1_digest(km: &KeyMaterial, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if digest.len() != 20 {
        return Err(CryptoError::DigestSizeMismatch {
            expected: 20,
            actual: digest.len(),
        });
    }
    let private_key = load_private_key(km)?;
    let signing_key: SigningKey<Sha1> = SigningKey::new(private_key);
    let signature = signing_key
        .sign_prehash(digest)
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;
    use rsa::signature::SignatureEncoding;
    Ok(signature.to_vec())
}
