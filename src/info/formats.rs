//! Format-specific sub-records of [`crate::info::Info`]: `deb`, `rpm`,
//! `apk`, `ipk`, `archlinux`. Spec §3 ("`deb`, `rpm`, `apk`, `ipk`,
//! `archlinux` | format-specific sub-records").

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// A compression algorithm selectable for a container's inner archive(s).
/// Spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compression {
    /// Deflate via gzip framing.
    #[default]
    Gzip,
    /// LZMA2 via xz framing.
    Xz,
    /// Raw LZMA (no xz container).
    Lzma,
    /// Zstandard.
    Zstd,
    /// No compression.
    None,
}

impl Compression {
    /// The filename extension this compression implies for an inner tar,
    /// e.g. `data.tar.<ext>`.
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Xz => "xz",
            Compression::Lzma => "lzma",
            Compression::Zstd => "zst",
            Compression::None => "",
        }
    }
}

// ---------------------------------------------------------------- deb ----

/// `Info.deb` — Debian-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebConfig {
    /// Override `Info.arch` for this format only.
    #[serde(default)]
    pub arch: Option<String>,
    /// Compression for `data.tar.<ext>`. `control.tar` is always gzip
    /// (spec §4.4).
    #[serde(default)]
    pub compression: Compression,
    /// Debian-only `Breaks:` relation (not part of the shared
    /// [`super::Overridables`] set).
    #[serde(default)]
    pub breaks: Vec<String>,
    /// Extra user-specified control fields, appended after the standard
    /// ones, in insertion order.
    #[serde(default)]
    pub fields: Vec<(String, String)>,
    /// Path to a `triggers` control file.
    #[serde(default)]
    pub triggers: Option<Utf8PathBuf>,
    /// Path to a `debian/rules`-style maintainer script.
    #[serde(default)]
    pub rules: Option<Utf8PathBuf>,
    /// Path to a `debconf` `templates` file.
    #[serde(default)]
    pub templates: Option<Utf8PathBuf>,
    /// Path to a `debconf` `config` script.
    #[serde(default)]
    pub config_script: Option<Utf8PathBuf>,
    /// Detached-signature configuration.
    #[serde(default)]
    pub signature: Option<DebSignatureConfig>,
}

/// How a `.deb` should be signed, spec §4.4 "Signing modes".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebSignatureConfig {
    /// Which signing convention to use.
    #[serde(default)]
    pub method: DebSignMethod,
    /// ASCII-armored or binary PGP keyring.
    #[serde(default)]
    pub key_file: Option<Utf8PathBuf>,
    /// Inline key material, alternative to `key_file`.
    #[serde(default)]
    pub key: Option<String>,
    /// Passphrase, if the key is encrypted.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Disambiguate which key to use when the keyring holds more than
    /// one signing-capable key.
    #[serde(default)]
    pub key_id: Option<String>,
    /// `Signer:` field for dpkg-sig manifests.
    #[serde(default)]
    pub signer: Option<String>,
    /// `Role:` field for dpkg-sig manifests, default `"builder"`.
    #[serde(default)]
    pub role: Option<String>,
}

impl Default for DebSignatureConfig {
    fn default() -> Self {
        DebSignatureConfig {
            method: DebSignMethod::default(),
            key_file: None,
            key: None,
            passphrase: None,
            key_id: None,
            signer: None,
            role: None,
        }
    }
}

/// Debian signing convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum DebSignMethod {
    /// `debsign`-style: armor-detach-sign the concatenated member bytes,
    /// store in `_gpg<origin_type>`.
    Debsign {
        /// One of `origin`, `maint`, `archive`. Any other value is a
        /// `ConfigError::InvalidSignatureType`.
        origin_type: DebSignOrigin,
    },
    /// `dpkg-sig`-style: clearsigned manifest of per-member checksums,
    /// stored in `_gpgbuilder`.
    DpkgSig,
}

impl Default for DebSignMethod {
    fn default() -> Self {
        DebSignMethod::Debsign {
            origin_type: DebSignOrigin::Origin,
        }
    }
}

/// The `type` component of a `_gpg<type>` member name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebSignOrigin {
    /// `_gpgorigin`, the default.
    Origin,
    /// `_gpgmaint`.
    Maint,
    /// `_gpgarchive`.
    Archive,
}

impl DebSignOrigin {
    /// The member name suffix, e.g. `"origin"`.
    pub fn as_str(self) -> &'static str {
        match self {
            DebSignOrigin::Origin => "origin",
            DebSignOrigin::Maint => "maint",
            DebSignOrigin::Archive => "archive",
        }
    }
}

// ---------------------------------------------------------------- rpm ----

/// `Info.rpm` — RPM-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RpmConfig {
    /// Override `Info.arch` for this format only.
    #[serde(default)]
    pub arch: Option<String>,
    /// Override the RPM OS field, default `linux`.
    #[serde(default)]
    pub os: Option<String>,
    /// Compression for the cpio payload.
    #[serde(default)]
    pub compression: Compression,
    /// Compression level, stored verbatim in the payload-flags tag
    /// (default `"9"`, spec §4.5).
    #[serde(default)]
    pub compression_level: Option<String>,
    /// RPM `Group:` tag.
    #[serde(default)]
    pub group: Option<String>,
    /// RPM `Distribution:` tag.
    #[serde(default)]
    pub distribution: Option<String>,
    /// RPM `Packager:` tag, falls back to `Info.maintainer`.
    #[serde(default)]
    pub packager: Option<String>,
    /// Build host string.
    #[serde(default)]
    pub buildhost: Option<String>,
    /// Obsoleted package names (RPM-only relation category).
    #[serde(default)]
    pub obsoletes: Vec<String>,
    /// Signing configuration.
    #[serde(default)]
    pub signature: Option<RpmSignatureConfig>,
}

/// RPM signing configuration, spec §4.5 "Signature header".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RpmSignatureConfig {
    /// PGP keyring for the binary detached signature over
    /// `header ‖ payload`.
    #[serde(default)]
    pub pgp_key_file: Option<Utf8PathBuf>,
    /// Inline PGP key material.
    #[serde(default)]
    pub pgp_key: Option<String>,
    /// Passphrase for the PGP key.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Disambiguate among multiple signing-capable keys.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Legacy RSA key for the RSA-over-SHA1 header digest signature.
    #[serde(default)]
    pub rsa_key_file: Option<Utf8PathBuf>,
}

// ---------------------------------------------------------------- apk ----

/// `Info.apk` — APK-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApkConfig {
    /// Override `Info.arch` for this format only.
    #[serde(default)]
    pub arch: Option<String>,
    /// `origin` PKGINFO field (source package name, if this is a split
    /// package).
    #[serde(default)]
    pub origin: Option<String>,
    /// `commit` PKGINFO field.
    #[serde(default)]
    pub commit: Option<String>,
    /// Signing configuration.
    #[serde(default)]
    pub signature: Option<ApkSignatureConfig>,
    /// Path to a `.trigger` script.
    #[serde(default)]
    pub trigger: Option<Utf8PathBuf>,
}

/// APK signing configuration, spec §4.6 "Signature tar".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApkSignatureConfig {
    /// RSA (or DSA) private key, PEM.
    #[serde(default)]
    pub key_file: Option<Utf8PathBuf>,
    /// Passphrase for the key.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Overrides the default `<maintainer-email>.rsa.pub` keyname.
    #[serde(default)]
    pub key_name: Option<String>,
    /// `true` for a DSA key (`.SIGN.DSA.<keyname>`); default RSA.
    #[serde(default)]
    pub dsa: bool,
}

// ---------------------------------------------------------------- ipk ----

/// `Info.ipk` — IPK-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IpkConfig {
    /// Override `Info.arch` for this format only.
    #[serde(default)]
    pub arch: Option<String>,
    /// `ABIVersion:` field.
    #[serde(default)]
    pub abi_version: Option<String>,
    /// `Alternatives:` entries, encoded `priority:link:target`.
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    /// `Auto-Installed:` field.
    #[serde(default)]
    pub auto_installed: Option<bool>,
    /// `Essential:` field.
    #[serde(default)]
    pub essential: Option<bool>,
    /// `Tags:` field, comma-joined.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One `update-alternatives`-style entry for IPK's `Alternatives:` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Alternative {
    /// Alternative priority.
    pub priority: i32,
    /// Symlink path `update-alternatives` manages.
    pub link: String,
    /// Target the symlink should point at.
    pub target: String,
}

// ------------------------------------------------------------ archlinux -

/// `Info.archlinux` — Arch Linux-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArchConfig {
    /// Override `Info.arch` for this format only.
    #[serde(default)]
    pub arch: Option<String>,
    /// `pkgbase`, defaults to `Info.name`.
    #[serde(default)]
    pub pkgbase: Option<String>,
}
