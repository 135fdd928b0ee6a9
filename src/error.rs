//! Errors!
//!
//! Every fallible entry point in this crate returns [`PkgResult`]. Leaf
//! errors are grouped by concern (`ConfigError`, `ContentError`,
//! `CryptoError`, `ArchiveError`) and folded into [`PkgError`] so callers
//! that don't care about the distinction can match on one type, while
//! callers that do can downcast via `miette::Diagnostic`.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type for this crate.
pub type PkgResult<T> = std::result::Result<T, PkgError>;

/// Top level error type for pkgforge.
#[derive(Debug, Error, Diagnostic)]
pub enum PkgError {
    /// A problem with the `Info`/`Content` model itself.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// A problem discovered while running the content pipeline.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Content(#[from] ContentError),

    /// A problem building or reading an archive.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    /// A signing or verification failure. Wraps the underlying cause so it
    /// isn't lost, per the "signing failure is a single wrapping kind"
    /// policy.
    #[error("failed to sign package")]
    #[diagnostic(code(pkgforge::signing_failed))]
    Signing {
        /// The underlying crypto/I/O cause.
        #[source]
        source: Box<CryptoError>,
    },

    /// Bare I/O error with no more specific context to attach.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// No packager is registered under this format key.
    #[error("no packager registered for format {0:?}")]
    #[diagnostic(code(pkgforge::no_such_format))]
    NoSuchFormat(String),
}

impl PkgError {
    /// Wrap a crypto error as a signing failure.
    pub fn signing(source: CryptoError) -> Self {
        PkgError::Signing {
            source: Box::new(source),
        }
    }
}

/// Errors from loading or validating an `Info`/config document.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A required field was not supplied.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The YAML document had a key this model doesn't recognise.
    #[error("unknown field `{0}` in package config")]
    UnknownField(String),

    /// `overrides.<format>.signature.type` was not a recognised value.
    #[error("invalid signature type `{0}`")]
    InvalidSignatureType(String),

    /// An unrecognised compression algorithm name was requested.
    #[error("unrecognised compression format `{0}`")]
    UnknownCompression(String),

    /// Failed to parse the YAML document.
    #[error("failed to parse package config: {0}")]
    Yaml(#[from] serde_yml::Error),

    /// Failed to parse a semver version string.
    #[error("invalid version `{value}`: {source}")]
    Semver {
        /// The offending value.
        value: String,
        /// The underlying parse error.
        #[source]
        source: semver::Error,
    },
}

/// Errors raised while expanding `Content` into a concrete file list.
#[derive(Debug, Error, Diagnostic)]
pub enum ContentError {
    /// A glob pattern (or a literal, non-glob source) matched nothing on
    /// disk.
    #[error("content source `{0}` matched no files")]
    ContentMissing(String),

    /// Two entries in the prepared content list resolved to the same
    /// destination.
    #[error("duplicate destination `{0}` in package contents")]
    ContentConflict(String),

    /// A destination, after normalisation, would escape the install root
    /// (e.g. via `../..`).
    #[error("destination `{0}` escapes the install root")]
    ContentEscapesRoot(String),

    /// Could not stat or read a source file referenced by a `Content`.
    #[error("cannot read source file `{path}`: {source}")]
    SourceIo {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A glob expression itself was malformed.
    #[error("invalid glob pattern `{0}`: {1}")]
    BadGlob(String, glob::PatternError),
}

/// Errors from archive construction (ar/tar/cpio/compression).
#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    /// A write to the underlying sink failed.
    #[error("archive write failed: {0}")]
    Write(#[source] io::Error),

    /// A member's recorded size didn't match the bytes actually written
    /// (two-pass size-then-write contract violated).
    #[error("archive member `{name}` declared size {declared} but wrote {actual} bytes")]
    SizeMismatch {
        /// Member name.
        name: String,
        /// Size declared in the header.
        declared: u64,
        /// Size actually written.
        actual: u64,
    },

    /// A member name was too long to encode in this format's header.
    #[error("member name `{0}` is too long for this archive format")]
    NameTooLong(String),
}

/// Errors from key loading, signing, and verification.
#[derive(Debug, Error, Diagnostic)]
pub enum CryptoError {
    /// No key matching the request was found in the supplied keyring.
    #[error("no signing key found")]
    KeyNotFound,

    /// More than one signing-capable key was present and none was
    /// selected by `key_id`.
    #[error("ambiguous key: {0} candidate keys, specify key_id")]
    AmbiguousKey(usize),

    /// The key is passphrase-protected but none was supplied.
    #[error("key is encrypted and no passphrase was supplied")]
    PassphraseRequired,

    /// The supplied passphrase did not decrypt the key.
    #[error("incorrect passphrase")]
    WrongPassphrase,

    /// A digest of the wrong size was handed to a fixed-size digest
    /// signer (e.g. RSA-over-SHA1 expects exactly 20 bytes).
    #[error("expected a {expected}-byte digest, got {actual}")]
    DigestSizeMismatch {
        /// Expected digest length in bytes.
        expected: usize,
        /// Actual digest length in bytes.
        actual: usize,
    },

    /// The PEM block was not an RSA private key (PKCS#1 or PKCS#8).
    #[error("PEM block is not an RSA private key")]
    NotRsaPem,

    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Underlying OpenPGP library error.
    #[error("OpenPGP error: {0}")]
    OpenPgp(String),

    /// Underlying RSA library error.
    #[error("RSA error: {0}")]
    Rsa(String),

    /// I/O failure while reading key material.
    #[error("failed to read key material: {0}")]
    Io(#[from] io::Error),
}
