//! The Debian `.deb` packager. Spec §4.4.
//!
//! Outer container is a plain Unix `ar` archive: `debian-binary`,
//! `control.tar.gz` (always gzip, regardless of `Info.deb.compression`),
//! `data.tar.<ext>`, and an optional detached-signature member.

use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};

use crate::archive::ar::ArWriter;
use crate::archive::compress::{Compressor, Level};
use crate::archive::tarw::{TarWriter, Trailer};
use crate::archive::{EntryKind, EntryMeta};
use crate::error::{ConfigError, PkgError, PkgResult};
use crate::info::{Content, ContentType, DebSignMethod, DebSignatureConfig, FileInfo, Info};
use crate::sign::{KeyMaterial, Signer};
use crate::util::archmap::deb_arch;
use crate::util::checksum::{md5_hex, TeeMd5};

use super::Packager;

/// Produces `.deb` archives.
pub struct DebPackager;

impl Packager for DebPackager {
    fn format(&self) -> &'static str {
        "deb"
    }

    fn conventional_file_name(&self, info: &Info) -> PkgResult<String> {
        let version = info.version_parts()?.debian_version();
        let arch = resolve_arch(info);
        Ok(format!("{}_{}_{}.deb", info.name, version, arch))
    }

    #[tracing::instrument(skip_all, fields(package = %info.name))]
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()> {
        let contents = crate::pipeline::prepare(info, "deb", env)?;
        let overridable = info.resolved_for("deb");
        let mtime = info.mtime.unwrap_or(0);
        let arch = resolve_arch(info);
        let version = info.version_parts()?.debian_version();

        let (data_tar, md5sums) = build_data_tar(&contents, info, mtime)?;
        let data_gz = Compressor::new(info.deb.compression, Level::default(), mtime, Vec::new())
            .map_err(crate::error::ArchiveError::Write)?
            .tap_write(&data_tar)?;

        let control_tar = build_control_tar(
            info,
            &overridable,
            &contents,
            &arch,
            &version,
            mtime,
            &md5sums,
        )?;
        let control_gz = gzip_bytes(&control_tar, mtime)?;

        let mut ar = ArWriter::new(Vec::new()).map_err(crate::error::ArchiveError::Write)?;
        ar.add_member("debian-binary", mtime, 0, 0, 0o100644, b"2.0\n")?;
        ar.add_member("control.tar.gz", mtime, 0, 0, 0o100644, &control_gz)?;
        let data_name = format!("data.tar.{}", info.deb.compression.extension());
        let data_name = if info.deb.compression.extension().is_empty() {
            "data.tar".to_string()
        } else {
            data_name
        };
        ar.add_member(&data_name, mtime, 0, 0, 0o100644, &data_gz)?;

        if let Some(sig_cfg) = &info.deb.signature {
            let signer = build_signer(sig_cfg)?;
            let signature_member = sign_members(
                &signer,
                sig_cfg,
                mtime,
                b"2.0\n",
                &control_gz,
                &data_gz,
                &data_name,
            )?;
            ar.add_member(
                &signature_member.0,
                mtime,
                0,
                0,
                0o100644,
                &signature_member.1,
            )?;
        }

        let bytes = ar.close();
        writer.write_all(&bytes).map_err(crate::error::ArchiveError::Write)?;
        Ok(())
    }
}

fn resolve_arch(info: &Info) -> String {
    let raw = info.deb.arch.clone().unwrap_or_else(|| info.arch.clone());
    deb_arch(&raw)
}

trait TapWrite {
    fn tap_write(self, data: &[u8]) -> PkgResult<Vec<u8>>;
}

impl TapWrite for Compressor<Vec<u8>> {
    fn tap_write(mut self, data: &[u8]) -> PkgResult<Vec<u8>> {
        self.write_all(data).map_err(crate::error::ArchiveError::Write)?;
        Ok(self.finish()?)
    }
}

fn gzip_bytes(data: &[u8], mtime: i64) -> PkgResult<Vec<u8>> {
    let mut c = Compressor::new(
        crate::info::Compression::Gzip,
        Level::default(),
        mtime,
        Vec::new(),
    )
    .map_err(crate::error::ArchiveError::Write)?;
    c.write_all(data).map_err(crate::error::ArchiveError::Write)?;
    Ok(c.finish()?)
}

/// Build `control.tar.gz`'s uncompressed tar: `control`, `md5sums`,
/// `conffiles`, maintainer scripts, `triggers`, `templates`, `config`.
fn build_control_tar(
    info: &Info,
    overridable: &crate::info::Overridables,
    contents: &[Content],
    arch: &str,
    version: &str,
    mtime: i64,
    md5sums: &str,
) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut tw = TarWriter::new(&mut buf);

    let control_text = render_control_file(info, overridable, contents, arch, version);
    tw.add_entry(
        &EntryMeta::regular("./control", 0o644, mtime),
        control_text.as_bytes(),
    )?;

    if !md5sums.is_empty() {
        tw.add_entry(
            &EntryMeta::regular("./md5sums", 0o644, mtime),
            md5sums.as_bytes(),
        )?;
    }

    let conffiles = render_conffiles(contents);
    if !conffiles.is_empty() {
        tw.add_entry(
            &EntryMeta::regular("./conffiles", 0o644, mtime),
            conffiles.as_bytes(),
        )?;
    }

    for (name, path) in [
        ("preinst", info.scripts.preinstall.as_ref()),
        ("postinst", info.scripts.postinstall.as_ref()),
        ("prerm", info.scripts.preremove.as_ref()),
        ("postrm", info.scripts.postremove.as_ref()),
    ] {
        if let Some(path) = path {
            let data = read_script(path)?;
            tw.add_entry(
                &EntryMeta::regular(format!("./{name}"), 0o755, mtime),
                &data,
            )?;
        }
    }

    for (name, path, mode) in [
        ("rules", info.deb.rules.as_ref(), 0o755),
        ("templates", info.deb.templates.as_ref(), 0o644),
        ("config", info.deb.config_script.as_ref(), 0o755),
    ] {
        if let Some(path) = path {
            let data = read_script(path)?;
            tw.add_entry(&EntryMeta::regular(format!("./{name}"), mode, mtime), &data)?;
        }
    }

    if let Some(triggers) = &info.deb.triggers {
        let data = read_script(triggers)?;
        tw.add_entry(
            &EntryMeta::regular("./triggers", 0o644, mtime),
            &data,
        )?;
    }

    tw.close(Trailer::Standard)?;
    Ok(buf)
}

fn read_script(path: &camino::Utf8Path) -> PkgResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        PkgError::Content(crate::error::ContentError::SourceIo {
            path: path.as_std_path().to_path_buf(),
            source,
        })
    })
}

fn render_control_file(
    info: &Info,
    overridable: &crate::info::Overridables,
    contents: &[Content],
    arch: &str,
    version: &str,
) -> String {
    let installed_size_kb: u64 = contents
        .iter()
        .filter(|c| !c.is_dir())
        .filter_map(|c| c.file_info.as_ref().and_then(|fi| fi.size))
        .sum::<u64>()
        .div_ceil(1024);

    let mut out = String::new();
    push_field(&mut out, "Package", &info.name);
    push_field(&mut out, "Version", version);
    if !info.section.is_empty() {
        push_field(&mut out, "Section", &info.section);
    }
    if !info.priority.is_empty() {
        push_field(&mut out, "Priority", &info.priority);
    }
    push_field(&mut out, "Architecture", arch);
    if !info.maintainer.is_empty() {
        push_field(&mut out, "Maintainer", &info.maintainer);
    }
    out.push_str(&format!("Installed-Size: {installed_size_kb}\n"));
    push_list_field(&mut out, "Replaces", &overridable.replaces);
    push_list_field(&mut out, "Provides", &overridable.provides);
    push_list_field(&mut out, "Depends", &overridable.depends);
    push_list_field(&mut out, "Recommends", &overridable.recommends);
    push_list_field(&mut out, "Suggests", &overridable.suggests);
    push_list_field(&mut out, "Conflicts", &overridable.conflicts);
    push_list_field(&mut out, "Breaks", &info.deb.breaks);
    if !info.homepage.is_empty() {
        push_field(&mut out, "Homepage", &info.homepage);
    }
    out.push_str(&render_description(info));
    for (key, value) in &info.deb.fields {
        push_field(&mut out, key, value);
    }
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn push_list_field(out: &mut String, key: &str, values: &[String]) {
    if !values.is_empty() {
        push_field(out, key, &values.join(", "));
    }
}

/// `Description:` plus continuation lines, each indented by one space;
/// blank lines in the source become a lone `.` (Debian control-file
/// convention).
fn render_description(info: &Info) -> String {
    let mut lines = info.description.lines();
    let Some(first) = lines.next() else {
        return String::new();
    };
    let mut out = format!("Description: {first}\n");
    for line in lines {
        if line.trim().is_empty() {
            out.push_str(" .\n");
        } else {
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn render_conffiles(contents: &[Content]) -> String {
    let mut out = String::new();
    for c in contents {
        if c.is_config() {
            out.push_str(&c.destination);
            out.push('\n');
        }
    }
    out
}

fn render_changelog(info: &Info) -> PkgResult<Option<String>> {
    let Some(path) = &info.changelog else {
        return Ok(None);
    };
    let data = read_script(path)?;
    Ok(Some(String::from_utf8_lossy(&data).into_owned()))
}

/// Build `data.tar`'s uncompressed content from the prepared install
/// tree, plus a `md5sums`-ready manifest built from the same read of each
/// file rather than a second pass over disk.
fn build_data_tar(contents: &[Content], info: &Info, mtime: i64) -> PkgResult<(Vec<u8>, String)> {
    let mut buf = Vec::new();
    let mut tw = TarWriter::new(&mut buf);
    let mut md5sums = String::new();
    for c in contents {
        let name = format!(".{}", c.destination);
        let fi = c.file_info.clone().unwrap_or_default();
        let entry_mtime = fi.mtime.unwrap_or(mtime);
        match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => {
                let meta = dir_meta(&name, &fi, entry_mtime);
                tw.add_entry(&meta, &[])?;
            }
            ContentType::Symlink => {
                let mut meta = EntryMeta::regular(name.clone(), fi.mode.unwrap_or(0o777), entry_mtime);
                meta.kind = EntryKind::Symlink;
                meta.link_target = c.link_target().to_string();
                tw.add_entry(&meta, &[])?;
            }
            ContentType::Ghost | ContentType::DebianChangelog => {
                // No payload byte is shipped for ghost entries.
            }
            _ => {
                let (data, digest) = read_and_hash(&c.source)?;
                let mode = fi.mode.unwrap_or(0o644);
                let meta = EntryMeta::regular(name.clone(), mode, entry_mtime);
                tw.add_entry(&meta, &data)?;
                let path = c.destination.trim_start_matches('/');
                md5sums.push_str(&format!("{digest}  {path}\n"));
            }
        }
    }

    if let Some(changelog_text) = render_changelog(info)? {
        // Zero gzip mtime regardless of the package's own, for byte
        // reproducibility (spec §9's changelog note).
        let gz = gzip_bytes(changelog_text.as_bytes(), 0)?;
        let dest = format!("./usr/share/doc/{}/changelog.Debian.gz", info.name);
        tw.add_entry(&EntryMeta::regular(dest, 0o644, mtime), &gz)?;
    }

    tw.close(Trailer::Standard)?;
    Ok((buf, md5sums))
}

/// Read a content source once, hashing it into an MD5 digest as the same
/// bytes are buffered for the tar entry.
fn read_and_hash(source: &str) -> PkgResult<(Vec<u8>, String)> {
    let mut file = std::fs::File::open(source).map_err(|source_err| {
        PkgError::Content(crate::error::ContentError::SourceIo {
            path: std::path::PathBuf::from(source),
            source: source_err,
        })
    })?;
    let mut tee = TeeMd5::new(Vec::new());
    std::io::copy(&mut file, &mut tee).map_err(|source_err| {
        PkgError::Content(crate::error::ContentError::SourceIo {
            path: std::path::PathBuf::from(source),
            source: source_err,
        })
    })?;
    Ok(tee.finish())
}

fn dir_meta(name: &str, fi: &FileInfo, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o755), mtime);
    meta.kind = EntryKind::Directory;
    meta
}

fn build_signer(cfg: &crate::info::DebSignatureConfig) -> PkgResult<Signer> {
    let bytes = match (&cfg.key_file, &cfg.key) {
        (Some(path), _) => std::fs::read(path)?,
        (None, Some(inline)) => inline.as_bytes().to_vec(),
        (None, None) => {
            return Err(PkgError::Config(ConfigError::MissingField(
                "deb.signature.key_file|key",
            )))
        }
    };
    Ok(Signer::Keyring(KeyMaterial {
        bytes,
        passphrase: cfg.passphrase.clone(),
        key_id: cfg.key_id.clone(),
    }))
}

/// Produce the `(member_name, member_bytes)` pair for `.deb` signing.
/// `Debsign` signs the concatenation of the three preceding members'
/// *data* bytes (not their `ar` headers); `DpkgSig` clearsigns a manifest
/// of per-member MD5s.
fn sign_members(
    signer: &Signer,
    sig_cfg: &DebSignatureConfig,
    mtime: i64,
    debian_binary: &[u8],
    control_gz: &[u8],
    data_gz: &[u8],
    data_name: &str,
) -> PkgResult<(String, Vec<u8>)> {
    match &sig_cfg.method {
        DebSignMethod::Debsign { origin_type } => {
            let mut message = Vec::new();
            message.extend_from_slice(debian_binary);
            message.extend_from_slice(control_gz);
            message.extend_from_slice(data_gz);
            let sig = signer.pgp_detached_armored(&message)?;
            Ok((format!("_gpg{}", origin_type.as_str()), sig))
        }
        DebSignMethod::DpkgSig => {
            let signer_field = sig_cfg.signer.as_deref().unwrap_or("");
            let role_field = sig_cfg.role.as_deref().unwrap_or("builder");
            let date_field = format_rfc1123z(mtime);
            let manifest = format!(
                "Version: 4\nSigner: {signer_field}\nDate: {date_field}\nRole: {role_field}\nFiles: \n\t{} {} debian-binary\n\t{} {} control.tar.gz\n\t{} {} {data_name}\n",
                md5_hex(debian_binary),
                debian_binary.len(),
                md5_hex(control_gz),
                control_gz.len(),
                md5_hex(data_gz),
                data_gz.len(),
            );
            let sig = signer.pgp_clearsigned(manifest.as_bytes())?;
            Ok(("_gpgbuilder".to_string(), sig))
        }
    }
}

/// Format a Unix timestamp as an RFC1123Z date (`Tue, 1 Jul 2003 10:52:37
/// +0000`), for `DpkgSig`'s `Date:` manifest field.
fn format_rfc1123z(mtime: i64) -> String {
    DateTime::<Utc>::from_timestamp(mtime, 0)
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_else(|| mtime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal_info() -> Info {
        serde_yml::from_str(
            r#"
name: hello
arch: amd64
version: 1.0.0
maintainer: Jane Doe <jane@example.com>
description: |
  A friendly greeting tool.

  Prints "hello" and exits.
"#,
        )
        .unwrap()
    }

    #[test]
    fn description_blank_line_becomes_dot() {
        let info = minimal_info();
        let rendered = render_description(&info);
        assert!(rendered.contains("\n .\n"));
        assert!(rendered.starts_with("Description: A friendly greeting tool.\n"));
    }

    #[test]
    fn package_writes_ar_magic_and_members() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"#!/bin/sh\necho hello\n").unwrap();

        let mut info = minimal_info();
        info.overridable.contents = vec![Content::file(
            bin.to_string_lossy().to_string(),
            "/usr/bin/hello",
        )];

        let packager = DebPackager;
        let mut out = Vec::new();
        let env = HashMap::new();
        packager.package(&info, &env, &mut out).unwrap();

        assert_eq!(&out[0..8], b"!<arch>\n");
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("debian-binary"));
        assert!(text.contains("control.tar.gz"));
        assert!(text.contains("data.tar.gz"));
    }

    #[test]
    fn conventional_file_name_uses_mapped_arch() {
        let info = minimal_info();
        let packager = DebPackager;
        let name = packager.conventional_file_name(&info).unwrap();
        assert_eq!(name, "hello_1.0.0_amd64.deb");
    }

    #[test]
    fn changelog_lands_in_data_tar_with_zero_gzip_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let changelog = dir.path().join("changelog");
        std::fs::write(
            &changelog,
            b"hello (1.0.0) unstable; urgency=low\n\n  * Initial release.\n",
        )
        .unwrap();

        let mut info = minimal_info();
        info.mtime = Some(1_700_000_000);
        info.changelog = Some(camino::Utf8PathBuf::from_path_buf(changelog).unwrap());

        let (data_tar, _) = build_data_tar(&[], &info, info.mtime.unwrap()).unwrap();
        let mut archive = tar::Archive::new(data_tar.as_slice());
        let mut member = None;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            if path.contains("usr/share/doc/hello/changelog.Debian.gz") {
                let mut buf = Vec::new();
                std::io::Read::read_to_end(&mut entry, &mut buf).unwrap();
                member = Some(buf);
            }
        }
        let gz = member.expect("changelog.Debian.gz should be present in data.tar");

        let mut decoder = flate2::read::GzDecoder::new(gz.as_slice());
        let mut discard = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut discard).unwrap();
        assert_eq!(decoder.header().unwrap().mtime(), 0);
        assert!(String::from_utf8_lossy(&discard).contains("Initial release"));
    }

    #[test]
    fn templates_script_uses_0o644_mode() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules");
        let templates = dir.path().join("templates");
        std::fs::write(&rules, b"#!/usr/bin/make -f\n").unwrap();
        std::fs::write(&templates, b"Template: hello/ask\n").unwrap();

        let mut info = minimal_info();
        info.deb.rules = Some(camino::Utf8PathBuf::from_path_buf(rules).unwrap());
        info.deb.templates = Some(camino::Utf8PathBuf::from_path_buf(templates).unwrap());

        let control_tar = build_control_tar(&info, &info.overridable, &[], "amd64", "1.0.0", 0, "").unwrap();
        let mut archive = tar::Archive::new(control_tar.as_slice());
        let mut modes = HashMap::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            modes.insert(path, entry.header().mode().unwrap() & 0o777);
        }
        assert_eq!(modes["./rules"], 0o755);
        assert_eq!(modes["./templates"], 0o644);
    }
}
