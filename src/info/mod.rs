//! The package description: [`Info`], its overridable fields, and the
//! format-specific sub-records under `deb`/`rpm`/`apk`/`ipk`/`archlinux`.
//! Spec §3.

pub mod content;
pub mod formats;
pub mod layer;
pub mod load;
pub mod version;

use std::collections::HashMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

pub use content::{Content, ContentType, FileInfo};
pub use formats::*;
use layer::{ApplyLayer, ApplyOptExt, ApplyValExt};
pub use version::{VersionParts, VersionSchema};

/// The package description the whole engine packages from. Spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Info {
    /// Package name. Required, non-empty.
    pub name: String,
    /// Target architecture. Required unless every enabled format
    /// overrides it.
    #[serde(default)]
    pub arch: String,
    /// OS platform, prefixed to arch as `<platform>-<arch>` for formats
    /// that encode an OS string.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Upstream version string.
    pub version: String,
    /// How `version` should be parsed.
    #[serde(default)]
    pub version_schema: VersionSchema,
    /// Package epoch.
    #[serde(default)]
    pub epoch: String,
    /// Package release (packaging revision).
    #[serde(default)]
    pub release: String,
    /// Prerelease component, if not already embedded in `version` under
    /// `Semver` schema.
    #[serde(default)]
    pub prerelease: String,
    /// Build-metadata component, if not already embedded in `version`.
    #[serde(default)]
    pub version_metadata: String,

    /// Maintainer contact, `Name <email>`.
    #[serde(default)]
    pub maintainer: String,
    /// Upstream vendor name.
    #[serde(default)]
    pub vendor: String,
    /// Human-readable description. May be multi-line.
    #[serde(default)]
    pub description: String,
    /// Project homepage URL.
    #[serde(default)]
    pub homepage: String,
    /// SPDX-ish licence identifier.
    #[serde(default)]
    pub license: String,
    /// Archive section/category.
    #[serde(default)]
    pub section: String,
    /// Install priority.
    #[serde(default)]
    pub priority: String,

    /// Path to a changelog source, in the upstream changelog DSL (format
    /// delegated, spec §1).
    #[serde(default)]
    pub changelog: Option<Utf8PathBuf>,

    /// Disable shell-glob expansion of content sources.
    #[serde(default)]
    pub disable_globbing: bool,
    /// Permission mask applied to every file/dir mode.
    #[serde(default = "default_umask")]
    pub umask: u32,
    /// Fixed instant for reproducible builds. Defaults from
    /// `SOURCE_DATE_EPOCH` if unset (see [`Info::with_defaults`]).
    #[serde(default)]
    pub mtime: Option<i64>,

    /// Overridable base fields (relations + contents).
    #[serde(flatten)]
    pub overridable: Overridables,

    /// Lifecycle script sources.
    #[serde(default)]
    pub scripts: Scripts,

    /// Debian-specific configuration.
    #[serde(default)]
    pub deb: DebConfig,
    /// RPM-specific configuration.
    #[serde(default)]
    pub rpm: RpmConfig,
    /// APK-specific configuration.
    #[serde(default)]
    pub apk: ApkConfig,
    /// IPK-specific configuration.
    #[serde(default)]
    pub ipk: IpkConfig,
    /// Arch Linux-specific configuration.
    #[serde(default)]
    pub archlinux: ArchConfig,

    /// Per-format override layers, keyed by format name (`deb`, `rpm`,
    /// `apk`, `ipk`, `archlinux`).
    #[serde(default)]
    pub overrides: HashMap<String, OverridesLayer>,
}

fn default_platform() -> String {
    "linux".to_string()
}

fn default_umask() -> u32 {
    0o002
}

/// The subset of [`Info`] fields that a per-format override layer may
/// replace. Spec §3 "Overrides".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Overridables {
    /// Packages this one replaces.
    #[serde(default)]
    pub replaces: Vec<String>,
    /// Virtual packages this one provides.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Runtime dependencies.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Soft recommendations.
    #[serde(default)]
    pub recommends: Vec<String>,
    /// Optional suggestions.
    #[serde(default)]
    pub suggests: Vec<String>,
    /// Conflicting packages.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// The installation tree.
    #[serde(default)]
    pub contents: Vec<Content>,
}

/// The all-`Option` layer applied over [`Overridables`] for one format.
/// An overridden list *replaces*, it never appends (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OverridesLayer {
    /// Replacement `replaces` list.
    #[serde(default)]
    pub replaces: Option<Vec<String>>,
    /// Replacement `provides` list.
    #[serde(default)]
    pub provides: Option<Vec<String>>,
    /// Replacement `depends` list.
    #[serde(default)]
    pub depends: Option<Vec<String>>,
    /// Replacement `recommends` list.
    #[serde(default)]
    pub recommends: Option<Vec<String>>,
    /// Replacement `suggests` list.
    #[serde(default)]
    pub suggests: Option<Vec<String>>,
    /// Replacement `conflicts` list.
    #[serde(default)]
    pub conflicts: Option<Vec<String>>,
    /// Replacement `contents` list.
    #[serde(default)]
    pub contents: Option<Vec<Content>>,
}

impl ApplyLayer for Overridables {
    type Layer = OverridesLayer;

    fn apply_layer(
        &mut self,
        OverridesLayer {
            replaces,
            provides,
            depends,
            recommends,
            suggests,
            conflicts,
            contents,
        }: Self::Layer,
    ) {
        self.replaces.apply_opt(replaces);
        self.provides.apply_opt(provides);
        self.depends.apply_opt(depends);
        self.recommends.apply_opt(recommends);
        self.suggests.apply_opt(suggests);
        self.conflicts.apply_opt(conflicts);
        self.contents.apply_opt(contents);
    }
}

/// Lifecycle script source paths. Not every format uses every field;
/// unused fields are simply never read by that packager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Scripts {
    /// Runs before install.
    #[serde(default)]
    pub preinstall: Option<Utf8PathBuf>,
    /// Runs after install.
    #[serde(default)]
    pub postinstall: Option<Utf8PathBuf>,
    /// Runs before removal.
    #[serde(default)]
    pub preremove: Option<Utf8PathBuf>,
    /// Runs after removal.
    #[serde(default)]
    pub postremove: Option<Utf8PathBuf>,
    /// RPM: runs before any files in the transaction are touched.
    #[serde(default)]
    pub pretrans: Option<Utf8PathBuf>,
    /// RPM: runs after the whole transaction completes.
    #[serde(default)]
    pub posttrans: Option<Utf8PathBuf>,
    /// Runs before an upgrade (as opposed to a fresh install).
    #[serde(default)]
    pub preupgrade: Option<Utf8PathBuf>,
    /// Runs after an upgrade.
    #[serde(default)]
    pub postupgrade: Option<Utf8PathBuf>,
}

impl Info {
    /// Apply field defaults that depend on the environment (analogous to
    /// the teacher's `WithDefaults` step): `mtime` from `SOURCE_DATE_EPOCH`
    /// when unset, and passphrases from `NFPM_PASSPHRASE` /
    /// `NFPM_<FORMAT>_PASSPHRASE`.
    ///
    /// `env` is a caller-supplied snapshot of the environment, never read
    /// from `std::env` directly, so that loading stays deterministic and
    /// testable (spec §6).
    pub fn with_defaults(mut self, env: &HashMap<String, String>) -> Self {
        if self.mtime.is_none() {
            if let Some(sde) = env.get("SOURCE_DATE_EPOCH") {
                if let Ok(v) = sde.parse::<i64>() {
                    self.mtime = Some(v);
                }
            }
        }
        let base_pass = env.get("NFPM_PASSPHRASE").cloned();
        if let Some(sig) = self.deb.signature.as_mut() {
            if sig.passphrase.is_none() {
                sig.passphrase = env.get("NFPM_DEB_PASSPHRASE").cloned().or_else(|| base_pass.clone());
            }
        }
        if let Some(sig) = self.rpm.signature.as_mut() {
            if sig.passphrase.is_none() {
                sig.passphrase = env.get("NFPM_RPM_PASSPHRASE").cloned().or_else(|| base_pass.clone());
            }
        }
        if let Some(sig) = self.apk.signature.as_mut() {
            if sig.passphrase.is_none() {
                sig.passphrase = env.get("NFPM_APK_PASSPHRASE").cloned().or_else(|| base_pass.clone());
            }
        }
        self
    }

    /// `<platform>-<arch>` for formats that encode an OS in the
    /// architecture string, else just `arch`.
    pub fn platform_arch(&self, arch: &str) -> String {
        if self.platform.is_empty() || self.platform == "linux" {
            arch.to_string()
        } else {
            format!("{}-{}", self.platform, arch)
        }
    }

    /// Resolve the effective [`Overridables`] for `format`: deep-merge
    /// `overrides[format]` over the base, per spec §3. Does *not* filter
    /// `contents` by packager tag; that is the content pipeline's job
    /// (spec §4.1 step 1), so the two "filter by packager" mentions in the
    /// spec stay backed by one implementation.
    pub fn resolved_for(&self, format: &str) -> Overridables {
        let mut merged = self.overridable.clone();
        if let Some(layer) = self.overrides.get(format).cloned() {
            merged.apply_layer(layer);
        }
        merged
    }

    /// Resolve the version parts for this package.
    pub fn version_parts(&self) -> crate::error::PkgResult<VersionParts> {
        Ok(VersionParts::resolve(
            self.version_schema,
            &self.version,
            &self.epoch,
            &self.release,
            &self.prerelease,
            &self.version_metadata,
        )?)
    }
}
