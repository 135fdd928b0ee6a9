//! Version parsing and per-format encoding, spec §3 (`version_schema`) and
//! §4.4/§4.5 (Debian/RPM version encoding rules).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How `Info::version` should be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSchema {
    /// Parse as semver and split into version/prerelease/metadata.
    #[default]
    Semver,
    /// Use the string as-is, with no further parsing.
    None,
}

/// The pieces of a package version, after `version_schema` has been
/// applied.
#[derive(Debug, Clone, Default)]
pub struct VersionParts {
    /// `1.2.3` part.
    pub version: String,
    /// Epoch, e.g. `2` in `2:1.2.3-1`. Empty if unset.
    pub epoch: String,
    /// Release, e.g. `1` in `1.2.3-1`. Empty if unset.
    pub release: String,
    /// Prerelease, e.g. `rc1` in `1.2.3-rc1`. Empty if unset.
    pub prerelease: String,
    /// Build metadata, e.g. `m` in `1.2.3+m`. Empty if unset.
    pub metadata: String,
}

impl VersionParts {
    /// Resolve `version`/`version_schema`/`epoch`/`release`/`prerelease`/
    /// `version_metadata` as read off `Info` into one `VersionParts`.
    pub fn resolve(
        schema: VersionSchema,
        version: &str,
        epoch: &str,
        release: &str,
        prerelease: &str,
        metadata: &str,
    ) -> Result<Self, ConfigError> {
        match schema {
            VersionSchema::None => Ok(VersionParts {
                version: version.to_string(),
                epoch: epoch.to_string(),
                release: release.to_string(),
                prerelease: prerelease.to_string(),
                metadata: metadata.to_string(),
            }),
            VersionSchema::Semver => {
                let parsed =
                    semver::Version::parse(version).map_err(|source| ConfigError::Semver {
                        value: version.to_string(),
                        source,
                    })?;
                let base = format!("{}.{}.{}", parsed.major, parsed.minor, parsed.patch);
                let pre = if !parsed.pre.is_empty() {
                    parsed.pre.to_string()
                } else {
                    prerelease.to_string()
                };
                let meta = if !parsed.build.is_empty() {
                    parsed.build.to_string()
                } else {
                    metadata.to_string()
                };
                Ok(VersionParts {
                    version: base,
                    epoch: epoch.to_string(),
                    release: release.to_string(),
                    prerelease: pre,
                    metadata: meta,
                })
            }
        }
    }

    /// Debian/IPK encoding: `[epoch:]version[~prerelease][+metadata][-release]`
    /// (tilde before `+` before `-`, per spec §4.4).
    pub fn debian_version(&self) -> String {
        let mut out = String::new();
        if !self.epoch.is_empty() {
            out.push_str(&self.epoch);
            out.push(':');
        }
        out.push_str(&self.version);
        if !self.prerelease.is_empty() {
            out.push('~');
            out.push_str(&self.prerelease);
        }
        if !self.metadata.is_empty() {
            out.push('+');
            out.push_str(&self.metadata);
        }
        if !self.release.is_empty() {
            out.push('-');
            out.push_str(&self.release);
        }
        out
    }

    /// RPM encoding: version field is `<semver>[~prerelease][+metadata]`,
    /// with `release` kept as a separate header tag (spec §4.5).
    pub fn rpm_version(&self) -> String {
        let mut out = self.version.clone();
        if !self.prerelease.is_empty() {
            out.push('~');
            out.push_str(&self.prerelease);
        }
        if !self.metadata.is_empty() {
            out.push('+');
            out.push_str(&self.metadata);
        }
        out
    }

    /// RPM `release` tag value, defaulting to `1` when unset (the
    /// convention every RPM consumer expects).
    pub fn rpm_release(&self) -> String {
        if self.release.is_empty() {
            "1".to_string()
        } else {
            self.release.clone()
        }
    }

    /// APK encoding: `<version>-r<release>`; APK releases are always
    /// integers, defaulting to `0`.
    pub fn apk_version(&self) -> String {
        let release = if self.release.is_empty() {
            "0"
        } else {
            &self.release
        };
        format!("{}-r{release}", self.version)
    }

    /// Arch Linux encoding: `<version>-<release>`, release defaults to `1`.
    pub fn arch_version(&self) -> String {
        let release = if self.release.is_empty() {
            "1"
        } else {
            &self.release
        };
        format!("{}-{release}", self.version)
    }

    /// Full Debian version including epoch, used e.g. for
    /// `<name>-<fullver>.src.rpm` style strings where one is needed.
    pub fn full(&self) -> String {
        self.debian_version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_ordering_tilde_before_plus_before_dash() {
        let v = VersionParts::resolve(
            VersionSchema::Semver,
            "1.0.0-rc1+m",
            "",
            "2",
            "",
            "",
        )
        .unwrap();
        assert_eq!(v.debian_version(), "1.0.0~rc1+m-2");
    }

    #[test]
    fn rpm_keeps_release_separate() {
        let v = VersionParts::resolve(
            VersionSchema::Semver,
            "1.0.0-rc1+m",
            "",
            "2",
            "",
            "",
        )
        .unwrap();
        assert_eq!(v.rpm_version(), "1.0.0~rc1+m");
        assert_eq!(v.rpm_release(), "2");
    }

    #[test]
    fn epoch_is_prefixed_for_debian() {
        let v = VersionParts::resolve(VersionSchema::None, "1.2.3", "5", "1", "", "").unwrap();
        assert_eq!(v.debian_version(), "5:1.2.3-1");
    }

    #[test]
    fn apk_release_defaults_to_zero() {
        let v = VersionParts::resolve(VersionSchema::None, "1.2.3", "", "", "", "").unwrap();
        assert_eq!(v.apk_version(), "1.2.3-r0");
    }
}
