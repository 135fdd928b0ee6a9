//! The IPK packager. Spec §4.7.
//!
//! A minor variant of Debian: the outer container is a plain tar (not an
//! `ar` archive) gzip-wrapped as a whole, holding `debian-binary`,
//! `control.tar.gz`, and `data.tar.gz`. The control schema is a fixed,
//! restricted field list rather than Debian's open one.

use std::collections::HashMap;
use std::io::Write;

use crate::archive::compress::{Compressor, Level};
use crate::archive::tarw::{TarWriter, Trailer};
use crate::archive::{EntryKind, EntryMeta};
use crate::error::PkgResult;
use crate::info::{Content, ContentType, FileInfo, Info, Overridables};
use crate::util::archmap::ipk_arch;

use super::Packager;

/// Produces `.ipk` archives.
pub struct IpkPackager;

// `IpkConfig` has no open-ended extra-fields vector the way `DebConfig`
// does, so the fixed control schema is enforced structurally: there is no
// way to construct a field outside this list in the first place, let alone
// one that collides with a reserved name.

impl Packager for IpkPackager {
    fn format(&self) -> &'static str {
        "ipk"
    }

    fn conventional_file_name(&self, info: &Info) -> PkgResult<String> {
        let version = info.version_parts()?.debian_version();
        let arch = resolve_arch(info);
        Ok(format!("{}_{}_{}.ipk", info.name, version, arch))
    }

    #[tracing::instrument(skip_all, fields(package = %info.name))]
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()> {
        let contents = crate::pipeline::prepare(info, "ipk", env)?;
        let overridable = info.resolved_for("ipk");
        let mtime = info.mtime.unwrap_or(0);
        let arch = resolve_arch(info);
        let version = info.version_parts()?.debian_version();

        let control_tar = build_control_tar(info, &overridable, &contents, &arch, &version, mtime)?;
        let control_gz = gzip_bytes(&control_tar, mtime)?;

        let data_tar = build_data_tar(&contents, mtime)?;
        let data_gz = gzip_bytes(&data_tar, mtime)?;

        let mut outer = Vec::new();
        let mut tw = TarWriter::new(&mut outer);
        tw.add_entry(&EntryMeta::regular("debian-binary", 0o644, mtime), b"2.0\n")?;
        tw.add_entry(
            &EntryMeta::regular("control.tar.gz", 0o644, mtime),
            &control_gz,
        )?;
        tw.add_entry(&EntryMeta::regular("data.tar.gz", 0o644, mtime), &data_gz)?;
        tw.close(Trailer::Standard)?;

        let wrapped = gzip_bytes(&outer, mtime)?;
        writer
            .write_all(&wrapped)
            .map_err(crate::error::ArchiveError::Write)?;
        Ok(())
    }
}

fn resolve_arch(info: &Info) -> String {
    let raw = info.ipk.arch.clone().unwrap_or_else(|| info.arch.clone());
    ipk_arch(&raw)
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

fn build_control_tar(
    info: &Info,
    overridable: &Overridables,
    contents: &[Content],
    arch: &str,
    version: &str,
    mtime: i64,
) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut tw = TarWriter::new(&mut buf);

    let control_text = render_control_file(info, overridable, contents, arch, version);
    tw.add_entry(
        &EntryMeta::regular("./control", 0o644, mtime),
        control_text.as_bytes(),
    )?;

    for (name, path) in [
        ("preinst", info.scripts.preinstall.as_ref()),
        ("postinst", info.scripts.postinstall.as_ref()),
        ("prerm", info.scripts.preremove.as_ref()),
        ("postrm", info.scripts.postremove.as_ref()),
    ] {
        if let Some(path) = path {
            let data = std::fs::read(path).map_err(|source| {
                crate::error::PkgError::Content(crate::error::ContentError::SourceIo {
                    path: path.as_std_path().to_path_buf(),
                    source,
                })
            })?;
            tw.add_entry(
                &EntryMeta::regular(format!("./{name}"), 0o755, mtime),
                &data,
            )?;
        }
    }

    tw.close(Trailer::Standard)?;
    Ok(buf)
}

fn render_control_file(
    info: &Info,
    overridable: &Overridables,
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
    push_field(&mut out, "Architecture", arch);
    if !info.maintainer.is_empty() {
        push_field(&mut out, "Maintainer", &info.maintainer);
    }
    if !info.priority.is_empty() {
        push_field(&mut out, "Priority", &info.priority);
    }
    push_list_field(&mut out, "Depends", &overridable.depends);
    push_list_field(&mut out, "Recommends", &overridable.recommends);
    push_list_field(&mut out, "Suggests", &overridable.suggests);
    push_list_field(&mut out, "Conflicts", &overridable.conflicts);
    push_list_field(&mut out, "Replaces", &overridable.replaces);
    push_list_field(&mut out, "Provides", &overridable.provides);
    out.push_str(&render_description(info));
    if !info.section.is_empty() {
        push_field(&mut out, "Section", &info.section);
    }
    if !info.homepage.is_empty() {
        push_field(&mut out, "Homepage", &info.homepage);
    }
    if !info.license.is_empty() {
        push_field(&mut out, "License", &info.license);
    }
    if !info.vendor.is_empty() {
        push_field(&mut out, "Vendor", &info.vendor);
    }
    out.push_str(&format!("Installed-Size: {installed_size_kb}\n"));
    if let Some(abi) = &info.ipk.abi_version {
        push_field(&mut out, "ABIVersion", abi);
    }
    if !info.ipk.alternatives.is_empty() {
        let joined = info
            .ipk
            .alternatives
            .iter()
            .map(|a| format!("{}:{}:{}", a.priority, a.link, a.target))
            .collect::<Vec<_>>()
            .join(", ");
        push_field(&mut out, "Alternatives", &joined);
    }
    if let Some(auto_installed) = info.ipk.auto_installed {
        push_field(&mut out, "Auto-Installed", bool_str(auto_installed));
    }
    if let Some(essential) = info.ipk.essential {
        push_field(&mut out, "Essential", bool_str(essential));
    }
    push_list_field(&mut out, "Tags", &info.ipk.tags);
    out
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
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

fn build_data_tar(contents: &[Content], mtime: i64) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut tw = TarWriter::new(&mut buf);
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
            ContentType::Ghost | ContentType::DebianChangelog => {}
            _ => {
                let data = std::fs::read(&c.source).map_err(|source| {
                    crate::error::PkgError::Content(crate::error::ContentError::SourceIo {
                        path: std::path::PathBuf::from(&c.source),
                        source,
                    })
                })?;
                let mode = fi.mode.unwrap_or(0o644);
                let meta = EntryMeta::regular(name.clone(), mode, entry_mtime);
                tw.add_entry(&meta, &data)?;
            }
        }
    }
    tw.close(Trailer::Standard)?;
    Ok(buf)
}

fn dir_meta(name: &str, fi: &FileInfo, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o755), mtime);
    meta.kind = EntryKind::Directory;
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_info() -> Info {
        serde_yml::from_str(
            r#"
name: hello
arch: amd64
version: 1.0.0
maintainer: Jane Doe <jane@example.com>
description: A friendly greeting tool.
"#,
        )
        .unwrap()
    }

    #[test]
    fn conventional_file_name_uses_mapped_arch() {
        let info = minimal_info();
        let packager = IpkPackager;
        assert_eq!(
            packager.conventional_file_name(&info).unwrap(),
            "hello_1.0.0_amd64.ipk"
        );
    }

    #[test]
    fn package_produces_a_gzip_stream() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"binary").unwrap();

        let mut info = minimal_info();
        info.overridable.contents = vec![Content::file(
            bin.to_string_lossy().to_string(),
            "/usr/bin/hello",
        )];

        let packager = IpkPackager;
        let mut out = Vec::new();
        let env = HashMap::new();
        packager.package(&info, &env, &mut out).unwrap();

        assert_eq!(&out[0..2], &[0x1f, 0x8b]);
    }
}
