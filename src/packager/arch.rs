//! The Arch Linux packager. Spec §4.8.
//!
//! Container: a single zstd-compressed tar holding `.PKGINFO`, a
//! gzip-compressed `.MTREE`, an optional `.INSTALL` hook script, and the
//! install tree with relative paths. Arch exposes no native signing hook.

use std::collections::HashMap;
use std::io::Write;

use crate::archive::compress::{Compressor, Level};
use crate::archive::tarw::{TarWriter, Trailer};
use crate::archive::{EntryKind, EntryMeta};
use crate::error::{ContentError, PkgError, PkgResult};
use crate::info::{Content, ContentType, FileInfo, Info, Overridables, VersionParts};
use crate::util::archmap::arch_arch;
use crate::util::checksum::sha256_hex;

use super::Packager;

/// Produces `.pkg.tar.zst` archives.
pub struct ArchPackager;

impl Packager for ArchPackager {
    fn format(&self) -> &'static str {
        "archlinux"
    }

    fn conventional_file_name(&self, info: &Info) -> PkgResult<String> {
        let parts = info.version_parts()?;
        let arch = resolve_arch(info);
        Ok(format!("{}-{}-{}.pkg.tar.zst", info.name, parts.arch_version(), arch))
    }

    #[tracing::instrument(skip_all, fields(package = %info.name))]
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()> {
        let contents = crate::pipeline::prepare(info, "archlinux", env)?;
        let overridable = info.resolved_for("archlinux");
        let mtime = info.mtime.unwrap_or(0);
        let arch = resolve_arch(info);
        let parts = info.version_parts()?;

        let total_size: u64 = contents
            .iter()
            .filter(|c| !c.is_dir() && c.r#type != ContentType::Symlink)
            .filter_map(|c| c.file_info.as_ref().and_then(|fi| fi.size))
            .sum();

        let pkginfo = render_pkginfo(info, &overridable, &parts, &arch, total_size, mtime);
        let mtree = build_mtree(&contents, mtime)?;
        let mtree_gz = gzip_bytes(mtree.as_bytes(), mtime)?;
        let install_script = render_install(info);

        let mut buf = Vec::new();
        let mut tar = TarWriter::new(&mut buf);
        tar.add_entry(&EntryMeta::regular(".PKGINFO", 0o644, mtime), pkginfo.as_bytes())?;
        tar.add_entry(&EntryMeta::regular(".MTREE", 0o644, mtime), &mtree_gz)?;
        if let Some(install_script) = &install_script {
            tar.add_entry(
                &EntryMeta::regular(".INSTALL", 0o644, mtime),
                install_script.as_bytes(),
            )?;
        }

        for c in &contents {
            if c.r#type == ContentType::Ghost {
                continue;
            }
            let rel = relative_path(&c.destination);
            let fi = c.file_info.clone().unwrap_or_default();
            let entry_mtime = fi.mtime.unwrap_or(mtime);
            match c.r#type {
                ContentType::Dir | ContentType::ImplicitDir => {
                    let meta = dir_meta(&rel, &fi, entry_mtime);
                    tar.add_entry(&meta, &[])?;
                }
                ContentType::Symlink => {
                    let mut meta = EntryMeta::regular(rel.clone(), fi.mode.unwrap_or(0o777), entry_mtime);
                    meta.kind = EntryKind::Symlink;
                    meta.link_target = c.link_target().to_string();
                    tar.add_entry(&meta, &[])?;
                }
                _ => {
                    let data = read_content(c)?;
                    let meta = EntryMeta::regular(rel.clone(), fi.mode.unwrap_or(0o644), entry_mtime);
                    tar.add_entry(&meta, &data)?;
                }
            }
        }
        tar.close(Trailer::Standard)?;

        let mut compressor = Compressor::new(crate::info::Compression::Zstd, Level::default(), mtime, Vec::new())
            .map_err(crate::error::ArchiveError::Write)?;
        compressor.write_all(&buf).map_err(crate::error::ArchiveError::Write)?;
        let out = compressor.finish()?;
        writer.write_all(&out).map_err(crate::error::ArchiveError::Write)?;
        Ok(())
    }
}

fn resolve_arch(info: &Info) -> String {
    let raw = info.archlinux.arch.clone().unwrap_or_else(|| info.arch.clone());
    arch_arch(&raw)
}

fn relative_path(destination: &str) -> String {
    destination.trim_start_matches('/').to_string()
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

fn read_content(c: &Content) -> PkgResult<Vec<u8>> {
    std::fs::read(&c.source).map_err(|source| {
        PkgError::Content(ContentError::SourceIo {
            path: std::path::PathBuf::from(&c.source),
            source,
        })
    })
}

fn dir_meta(name: &str, fi: &FileInfo, mtime: i64) -> EntryMeta {
    let mut meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o755), mtime);
    meta.kind = EntryKind::Directory;
    meta
}

fn render_pkginfo(
    info: &Info,
    overridable: &Overridables,
    parts: &VersionParts,
    arch: &str,
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
    let pkgbase = info.archlinux.pkgbase.clone().unwrap_or_else(|| info.name.clone());
    line("pkgbase", &pkgbase);
    line("pkgver", &parts.arch_version());
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
    if !info.license.is_empty() {
        line("license", &info.license);
    }
    for dep in &overridable.depends {
        line("depend", dep);
    }
    for provide in &overridable.provides {
        line("provides", provide);
    }
    for conflict in &overridable.conflicts {
        line("conflict", conflict);
    }
    for replace in &overridable.replaces {
        line("replaces", replace);
    }
    out
}

fn build_mtree(contents: &[Content], mtime: i64) -> PkgResult<String> {
    let mut out = String::new();
    for c in contents {
        if c.r#type == ContentType::Ghost {
            continue;
        }
        let rel = relative_path(&c.destination);
        let fi = c.file_info.clone().unwrap_or_default();
        let entry_mtime = fi.mtime.unwrap_or(mtime);
        match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => {
                out.push_str(&format!(
                    "./{} time={} type=dir mode={:o} uid=0 gid=0\n",
                    rel,
                    entry_mtime,
                    fi.mode.unwrap_or(0o755)
                ));
            }
            ContentType::Symlink => {
                out.push_str(&format!(
                    "./{} time={} type=link mode={:o} uid=0 gid=0 link={}\n",
                    rel,
                    entry_mtime,
                    fi.mode.unwrap_or(0o777),
                    c.link_target()
                ));
            }
            _ => {
                let data = read_content(c)?;
                let digest = sha256_hex(&data);
                out.push_str(&format!(
                    "./{} time={} size={} type=file mode={:o} uid=0 gid=0 sha256digest={}\n",
                    rel,
                    entry_mtime,
                    data.len(),
                    fi.mode.unwrap_or(0o644),
                    digest
                ));
            }
        }
    }
    Ok(out)
}

/// Aggregate the lifecycle scripts into makepkg's `.INSTALL` shell-function
/// convention. Returns `None` when no lifecycle script is configured.
fn render_install(info: &Info) -> Option<String> {
    let hooks: [(&str, Option<&camino::Utf8PathBuf>); 4] = [
        ("pre_install", info.scripts.preinstall.as_ref()),
        ("post_install", info.scripts.postinstall.as_ref()),
        ("pre_upgrade", info.scripts.preupgrade.as_ref()),
        ("post_upgrade", info.scripts.postupgrade.as_ref()),
    ];
    let remove_hooks: [(&str, Option<&camino::Utf8PathBuf>); 2] = [
        ("pre_remove", info.scripts.preremove.as_ref()),
        ("post_remove", info.scripts.postremove.as_ref()),
    ];

    let mut out = String::new();
    for (name, path) in hooks.into_iter().chain(remove_hooks) {
        if let Some(path) = path {
            let body = std::fs::read_to_string(path).ok()?;
            out.push_str(name);
            out.push_str("() {\n");
            out.push_str(body.trim_end());
            out.push_str("\n}\n");
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
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
    fn conventional_file_name_maps_arch_and_release() {
        let info = minimal_info();
        let packager = ArchPackager;
        assert_eq!(
            packager.conventional_file_name(&info).unwrap(),
            "hello-1.0.0-1-x86_64.pkg.tar.zst"
        );
    }

    #[test]
    fn mtree_includes_sha256_for_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"binary").unwrap();
        let content = Content::file(bin.to_string_lossy().to_string(), "/usr/bin/hello");
        let mut content = content;
        content.file_info = Some(crate::info::FileInfo {
            mode: Some(0o755),
            mtime: Some(0),
            size: Some(6),
            ..Default::default()
        });
        let mtree = build_mtree(&[content], 0).unwrap();
        assert!(mtree.contains("./usr/bin/hello"));
        assert!(mtree.contains("sha256digest="));
    }

    #[test]
    fn package_produces_zstd_magic() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"binary").unwrap();

        let mut info = minimal_info();
        info.overridable.contents = vec![Content::file(
            bin.to_string_lossy().to_string(),
            "/usr/bin/hello",
        )];

        let packager = ArchPackager;
        let mut out = Vec::new();
        let env = HashMap::new();
        packager.package(&info, &env, &mut out).unwrap();

        assert_eq!(&out[0..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    }
}
