//! The APK packager. Spec §4.6.
//!
//! Container: three gzip streams concatenated back to back — an optional
//! signature tar, the control tar, and the data tar — each closed with a
//! single zero block so the streams can be concatenated without
//! interleaving EOF markers.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use crate::archive::compress::{Compressor, Level};
use crate::archive::tarw::{TarWriter, Trailer};
use crate::archive::{EntryKind, EntryMeta};
use crate::error::{ConfigError, ContentError, PkgError, PkgResult};
use crate::info::{Content, ContentType, Info, Overridables, VersionParts};
use crate::sign::{KeyMaterial, Signer};
use crate::util::archmap::apk_arch;
use crate::util::checksum::{sha1_bytes, sha256_hex};

use super::Packager;

/// Produces `.apk` archives.
pub struct ApkPackager;

impl Packager for ApkPackager {
    fn format(&self) -> &'static str {
        "apk"
    }

    fn conventional_file_name(&self, info: &Info) -> PkgResult<String> {
        let parts = info.version_parts()?;
        Ok(format!("{}-{}.apk", info.name, parts.apk_version()))
    }

    #[tracing::instrument(skip_all, fields(package = %info.name))]
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()> {
        let contents = crate::pipeline::prepare(info, "apk", env)?;
        let overridable = info.resolved_for("apk");
        let mtime = info.mtime.unwrap_or(0);
        let arch = resolve_arch(info);
        let parts = info.version_parts()?;

        let data_tar = build_data_tar(&contents, mtime)?;
        let datahash = sha256_hex(&data_tar);
        let total_size: u64 = contents
            .iter()
            .filter(|c| !c.is_dir() && c.r#type != ContentType::Symlink && c.r#type != ContentType::Ghost)
            .filter_map(|c| c.file_info.as_ref().and_then(|fi| fi.size))
            .sum();

        let control_tar = build_control_tar(
            info,
            &overridable,
            &parts,
            &arch,
            &datahash,
            total_size,
            mtime,
        )?;
        let signature_tar = build_signature_tar(info, &control_tar, mtime)?;

        if let Some(sig) = &signature_tar {
            gzip_and_write(writer, sig, mtime)?;
        }
        gzip_and_write(writer, &control_tar, mtime)?;
        gzip_and_write(writer, &data_tar, mtime)?;
        Ok(())
    }
}

fn resolve_arch(info: &Info) -> String {
    let raw = info.apk.arch.clone().unwrap_or_else(|| info.arch.clone());
    apk_arch(&raw)
}

fn relative_path(destination: &str) -> String {
    destination.trim_start_matches('/').to_string()
}

fn gzip_and_write(writer: &mut dyn Write, data: &[u8], mtime: i64) -> PkgResult<()> {
    let mut compressor = Compressor::new(crate::info::Compression::Gzip, Level::default(), mtime, Vec::new())
        .map_err(crate::error::ArchiveError::Write)?;
    compressor
        .write_all(data)
        .map_err(crate::error::ArchiveError::Write)?;
    let gz = compressor.finish()?;
    writer.write_all(&gz).map_err(crate::error::ArchiveError::Write)?;
    Ok(())
}

fn build_data_tar(contents: &[Content], mtime: i64) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut tar = TarWriter::new(&mut buf);
    for c in contents {
        if c.r#type == ContentType::Ghost {
            continue;
        }
        let rel = relative_path(&c.destination);
        let fi = c.file_info.clone().unwrap_or_default();
        let entry_mtime = fi.mtime.unwrap_or(mtime);
        match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => {
                let mut meta = EntryMeta::regular(rel, fi.mode.unwrap_or(0o755), entry_mtime);
                meta.kind = EntryKind::Directory;
                tar.add_entry(&meta, &[])?;
            }
            ContentType::Symlink => {
                let mut meta = EntryMeta::regular(rel, fi.mode.unwrap_or(0o777), entry_mtime);
                meta.kind = EntryKind::Symlink;
                meta.link_target = c.link_target().to_string();
                tar.add_entry(&meta, &[])?;
            }
            _ => {
                let data = std::fs::read(&c.source).map_err(|source| {
                    PkgError::Content(ContentError::SourceIo {
                        path: PathBuf::from(&c.source),
                        source,
                    })
                })?;
                let meta = EntryMeta::regular(rel, fi.mode.unwrap_or(0o644), entry_mtime);
                tar.add_entry(&meta, &data)?;
            }
        }
    }
    tar.close(Trailer::Single)?;
    Ok(buf)
}

fn render_pkginfo(
    info: &Info,
    overridable: &Overridables,
    parts: &VersionParts,
    arch: &str,
    datahash: &str,
    total_size: u64,
    mtime: i64,
) -> String {
    let mut out = String::new();
    let mut line = |k: &str, v: &str| {
        out.push_str(k);
        out.push_str(" = ");
        out.push_str(v);
        out.push('\n');
    };

    line("pkgname", &info.name);
    line("pkgver", &parts.apk_version());
    let pkgdesc = info.description.lines().next().unwrap_or("");
    line("pkgdesc", pkgdesc);
    if !info.homepage.is_empty() {
        line("url", &info.homepage);
    }
    line("builddate", &mtime.to_string());
    if !info.maintainer.is_empty() {
        line("packager", &info.maintainer);
    }
    line("size", &total_size.to_string());
    line("arch", arch);
    if let Some(origin) = &info.apk.origin {
        line("origin", origin);
    }
    if let Some(commit) = &info.apk.commit {
        line("commit", commit);
    }
    for dep in &overridable.depends {
        line("depend", dep);
    }
    for provide in &overridable.provides {
        line("provides", provide);
    }
    for replace in &overridable.replaces {
        line("replaces", replace);
    }
    line("datahash", datahash);
    out
}

fn build_control_tar(
    info: &Info,
    overridable: &Overridables,
    parts: &VersionParts,
    arch: &str,
    datahash: &str,
    total_size: u64,
    mtime: i64,
) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut tar = TarWriter::new(&mut buf);

    let pkginfo = render_pkginfo(info, overridable, parts, arch, datahash, total_size, mtime);
    let meta = EntryMeta::regular(".PKGINFO", 0o644, mtime);
    tar.add_entry(&meta, pkginfo.as_bytes())?;

    for (member, path) in [
        (".pre-install", info.scripts.preinstall.as_ref()),
        (".post-install", info.scripts.postinstall.as_ref()),
        (".pre-upgrade", info.scripts.preupgrade.as_ref()),
        (".post-upgrade", info.scripts.postupgrade.as_ref()),
        (".pre-deinstall", info.scripts.preremove.as_ref()),
        (".post-deinstall", info.scripts.postremove.as_ref()),
        (".trigger", info.apk.trigger.as_ref()),
    ] {
        if let Some(path) = path {
            let data = std::fs::read(path).map_err(|source| {
                PkgError::Content(ContentError::SourceIo {
                    path: path.as_std_path().to_path_buf(),
                    source,
                })
            })?;
            let meta = EntryMeta::regular(member, 0o755, mtime);
            tar.add_entry(&meta, &data)?;
        }
    }

    tar.close(Trailer::Single)?;
    Ok(buf)
}

fn maintainer_email(maintainer: &str) -> String {
    if let Some(start) = maintainer.find('<') {
        if let Some(len) = maintainer[start + 1..].find('>') {
            return maintainer[start + 1..start + 1 + len].to_string();
        }
    }
    "unknown@localhost".to_string()
}

fn build_signature_tar(info: &Info, control_tar: &[u8], mtime: i64) -> PkgResult<Option<Vec<u8>>> {
    let Some(sig_cfg) = &info.apk.signature else {
        return Ok(None);
    };
    if sig_cfg.dsa {
        return Err(PkgError::Config(ConfigError::InvalidSignatureType(
            "dsa".to_string(),
        )));
    }
    let key_path = sig_cfg
        .key_file
        .as_ref()
        .ok_or(ConfigError::MissingField("apk.signature.key_file"))?;
    let key_bytes = std::fs::read(key_path)?;
    let km = KeyMaterial {
        bytes: key_bytes,
        passphrase: sig_cfg.passphrase.clone(),
        key_id: None,
    };
    let signer = Signer::Keyring(km);
    let digest = sha1_bytes(control_tar);
    let sig_bytes = signer.rsa_sign_sha1_digest(&digest)?;

    let keyname = sig_cfg
        .key_name
        .clone()
        .unwrap_or_else(|| format!("{}.rsa.pub", maintainer_email(&info.maintainer)));
    let member = format!(".SIGN.RSA.{keyname}");

    let mut buf = Vec::new();
    let mut tar = TarWriter::new(&mut buf);
    let meta = EntryMeta::regular(member, 0o644, mtime);
    tar.add_entry(&meta, &sig_bytes)?;
    tar.close(Trailer::Single)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintainer_email_extracts_angle_bracket_address() {
        assert_eq!(
            maintainer_email("Jane Doe <jane@example.com>"),
            "jane@example.com"
        );
        assert_eq!(maintainer_email("Jane Doe"), "unknown@localhost");
    }

    #[test]
    fn conventional_file_name_uses_apk_release_format() {
        let info: Info = serde_yml::from_str("name: hello\narch: amd64\nversion: 1.0.0\n").unwrap();
        let packager = ApkPackager;
        assert_eq!(packager.conventional_file_name(&info).unwrap(), "hello-1.0.0-r0.apk");
    }

    #[test]
    fn package_writes_three_gzip_members_worth_of_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"binary").unwrap();

        let mut info: Info =
            serde_yml::from_str("name: hello\narch: amd64\nversion: 1.0.0\n").unwrap();
        info.overridable.contents = vec![Content::file(
            bin.to_string_lossy().to_string(),
            "/usr/bin/hello",
        )];

        let packager = ApkPackager;
        let mut out = Vec::new();
        let env = HashMap::new();
        packager.package(&info, &env, &mut out).unwrap();

        // Two gzip streams (no signature configured): each starts with the
        // gzip magic `1f 8b`.
        assert_eq!(&out[0..2], &[0x1f, 0x8b]);
    }
}
