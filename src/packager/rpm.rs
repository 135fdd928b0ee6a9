//! The RPM packager. Spec §4.5.
//!
//! Container: a 96-byte lead, a signature header, the immutable header,
//! then a compressed cpio payload. The signature header covers the
//! immutable header's digest and, optionally, signatures over it and over
//! `header ‖ payload`.

use std::collections::HashMap;
use std::io::Write;

use crate::archive::compress::{Compressor, Level};
use crate::archive::cpio::CpioWriter;
use crate::archive::{EntryKind, EntryMeta};
use crate::error::{PkgError, PkgResult};
use crate::info::{Content, ContentType, Info};
use crate::rpmfmt::{self, tags, HeaderBuilder, TagValue};
use crate::sign::{KeyMaterial, Signer};
use crate::util::archmap::rpm_arch;
use crate::util::checksum::sha256_hex;

use super::Packager;

/// Produces `.rpm` archives.
pub struct RpmPackager;

impl Packager for RpmPackager {
    fn format(&self) -> &'static str {
        "rpm"
    }

    fn conventional_file_name(&self, info: &Info) -> PkgResult<String> {
        let parts = info.version_parts()?;
        let arch = resolve_arch(info);
        Ok(format!(
            "{}-{}-{}.{}.rpm",
            info.name,
            parts.rpm_version(),
            parts.rpm_release(),
            arch
        ))
    }

    #[tracing::instrument(skip_all, fields(package = %info.name))]
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()> {
        let contents = crate::pipeline::prepare(info, "rpm", env)?;
        let overridable = info.resolved_for("rpm");
        let mtime = info.mtime.unwrap_or(0);
        let arch = resolve_arch(info);
        let parts = info.version_parts()?;

        let raw_payload = build_cpio_payload(&contents, mtime)?;
        let compression = info.rpm.compression;
        let mut compressor = Compressor::new(compression, Level::default(), mtime, Vec::new())
            .map_err(crate::error::ArchiveError::Write)?;
        compressor
            .write_all(&raw_payload)
            .map_err(crate::error::ArchiveError::Write)?;
        let payload = compressor.finish()?;

        let immutable =
            build_immutable_header(info, &overridable, &contents, &arch, &parts, mtime, &payload)?;
        let signature = build_signature_header(info, &immutable, &raw_payload, &payload)?;

        rpmfmt::write_lead(writer, &info.name).map_err(crate::error::ArchiveError::Write)?;
        writer.write_all(&signature).map_err(crate::error::ArchiveError::Write)?;
        writer.write_all(&immutable).map_err(crate::error::ArchiveError::Write)?;
        writer.write_all(&payload).map_err(crate::error::ArchiveError::Write)?;
        Ok(())
    }
}

fn resolve_arch(info: &Info) -> String {
    let raw = info.rpm.arch.clone().unwrap_or_else(|| info.arch.clone());
    rpm_arch(&raw)
}

fn build_cpio_payload(contents: &[Content], mtime: i64) -> PkgResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cpio = CpioWriter::new(&mut buf);
    for c in contents {
        if c.r#type == ContentType::Ghost {
            continue;
        }
        let name = format!(".{}", c.destination);
        let fi = c.file_info.clone().unwrap_or_default();
        let entry_mtime = fi.mtime.unwrap_or(mtime);
        match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => {
                let mut meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o755), entry_mtime);
                meta.kind = EntryKind::Directory;
                cpio.add_entry(&meta, &[])?;
            }
            ContentType::Symlink => {
                let mut meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o777), entry_mtime);
                meta.kind = EntryKind::Symlink;
                meta.link_target = c.link_target().to_string();
                cpio.add_entry(&meta, &[])?;
            }
            _ => {
                let data = std::fs::read(&c.source).map_err(|source| {
                    PkgError::Content(crate::error::ContentError::SourceIo {
                        path: std::path::PathBuf::from(&c.source),
                        source,
                    })
                })?;
                let meta = EntryMeta::regular(name, fi.mode.unwrap_or(0o644), entry_mtime);
                cpio.add_entry(&meta, &data)?;
            }
        }
    }
    cpio.close()?;
    Ok(buf)
}

fn split_path(destination: &str) -> (String, String) {
    match destination.rsplit_once('/') {
        Some((dir, base)) => {
            let dir = if dir.is_empty() { "/".to_string() } else { format!("{dir}/") };
            (dir, base.to_string())
        }
        None => ("/".to_string(), destination.to_string()),
    }
}

#[derive(Default)]
struct FileGroups {
    dirnames: Vec<String>,
    dirindexes: Vec<i32>,
    basenames: Vec<String>,
    sizes: Vec<i32>,
    modes: Vec<u16>,
    usernames: Vec<String>,
    groupnames: Vec<String>,
    mtimes: Vec<i32>,
    digests: Vec<String>,
    linktos: Vec<String>,
    flags: Vec<i32>,
    inodes: Vec<i32>,
}

fn build_file_groups(contents: &[Content], default_mtime: i64) -> FileGroups {
    let mut groups = FileGroups::default();
    let mut dir_index_of: HashMap<String, i32> = HashMap::new();

    for (i, c) in contents.iter().enumerate() {
        let (dir, base) = split_path(&c.destination);
        let dir_idx = *dir_index_of.entry(dir.clone()).or_insert_with(|| {
            groups.dirnames.push(dir.clone());
            (groups.dirnames.len() - 1) as i32
        });
        groups.dirindexes.push(dir_idx);
        groups.basenames.push(base);

        let fi = c.file_info.clone().unwrap_or_default();
        let type_bits: u16 = match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => 0o040000,
            ContentType::Symlink => 0o120000,
            _ => 0o100000,
        };
        groups.modes.push(type_bits | (fi.mode.unwrap_or(0o644) as u16 & 0o7777));
        groups
            .usernames
            .push(fi.owner.clone().unwrap_or_else(|| "root".to_string()));
        groups
            .groupnames
            .push(fi.group.clone().unwrap_or_else(|| "root".to_string()));
        groups
            .mtimes
            .push(fi.mtime.unwrap_or(default_mtime) as i32);
        groups.inodes.push((i + 1) as i32);

        let (size, digest, linkto) = match c.r#type {
            ContentType::Dir | ContentType::ImplicitDir => (4096i32, String::new(), String::new()),
            ContentType::Symlink => (
                c.link_target().len() as i32,
                String::new(),
                c.link_target().to_string(),
            ),
            ContentType::Ghost => (fi.size.unwrap_or(0) as i32, String::new(), String::new()),
            _ => {
                let data = std::fs::read(&c.source).unwrap_or_default();
                (data.len() as i32, sha256_hex(&data), String::new())
            }
        };
        groups.sizes.push(size);
        groups.digests.push(digest);
        groups.linktos.push(linkto);

        let mut flag_bits = 0i32;
        match c.r#type {
            ContentType::Config => flag_bits |= tags::file_flags::CONFIG as i32,
            ContentType::ConfigNoReplace => {
                flag_bits |= (tags::file_flags::CONFIG | tags::file_flags::NOREPLACE) as i32
            }
            ContentType::Doc => flag_bits |= tags::file_flags::DOC as i32,
            ContentType::Licence => flag_bits |= tags::file_flags::LICENSE as i32,
            ContentType::Readme => flag_bits |= tags::file_flags::README as i32,
            ContentType::Ghost => flag_bits |= tags::file_flags::GHOST as i32,
            _ => {}
        }
        groups.flags.push(flag_bits);
    }
    groups
}

/// Parse one relation string (`"foo"`, `"foo >= 1.0"`, or a parenthesised
/// rich boolean dependency) into `(name, version, sense_flags)`.
fn parse_relation(raw: &str) -> (String, String, i32) {
    let trimmed = raw.trim();
    if trimmed.starts_with('(') {
        return (trimmed.to_string(), String::new(), tags::sense::ANY);
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() >= 3 {
        let sense = match tokens[1] {
            ">=" => tags::sense::GREATER | tags::sense::EQUAL,
            "<=" => tags::sense::LESS | tags::sense::EQUAL,
            "=" | "==" => tags::sense::EQUAL,
            ">" => tags::sense::GREATER,
            "<" => tags::sense::LESS,
            _ => tags::sense::ANY,
        };
        return (tokens[0].to_string(), tokens[2].to_string(), sense);
    }
    (trimmed.to_string(), String::new(), tags::sense::ANY)
}

fn relation_arrays(relations: &[String]) -> (Vec<String>, Vec<String>, Vec<i32>) {
    let mut names = Vec::new();
    let mut versions = Vec::new();
    let mut flags = Vec::new();
    for r in relations {
        let (n, v, f) = parse_relation(r);
        names.push(n);
        versions.push(v);
        flags.push(f);
    }
    (names, versions, flags)
}

fn build_immutable_header(
    info: &Info,
    overridable: &crate::info::Overridables,
    contents: &[Content],
    arch: &str,
    parts: &crate::info::VersionParts,
    mtime: i64,
    payload: &[u8],
) -> PkgResult<Vec<u8>> {
    let mut h = HeaderBuilder::new(tags::HEADER_IMMUTABLE);
    let full_version = format!("{}-{}", parts.rpm_version(), parts.rpm_release());

    h.push(tags::NAME, TagValue::Str(info.name.clone()));
    h.push(tags::VERSION, TagValue::Str(parts.rpm_version()));
    h.push(tags::RELEASE, TagValue::Str(parts.rpm_release()));
    if !parts.epoch.is_empty() {
        if let Ok(epoch) = parts.epoch.parse::<i32>() {
            h.push(tags::EPOCH, TagValue::Int32(epoch));
        }
    }
    let summary = info.description.lines().next().unwrap_or("").to_string();
    h.push(tags::SUMMARY, TagValue::Str(summary));
    h.push(tags::DESCRIPTION, TagValue::Str(info.description.clone()));
    if mtime != 0 {
        h.push(tags::BUILDTIME, TagValue::Int32(mtime as i32));
    }
    h.push(
        tags::BUILDHOST,
        TagValue::Str(info.rpm.buildhost.clone().unwrap_or_else(|| "localhost".to_string())),
    );
    h.push(
        tags::SOURCERPM,
        TagValue::Str(format!("{}-{}.src.rpm", info.name, full_version)),
    );
    let packager = info
        .rpm
        .packager
        .clone()
        .unwrap_or_else(|| info.maintainer.clone());
    if !packager.is_empty() {
        h.push(tags::PACKAGER, TagValue::Str(packager));
    }
    if !info.vendor.is_empty() {
        h.push(tags::VENDOR, TagValue::Str(info.vendor.clone()));
    }
    if !info.license.is_empty() {
        h.push(tags::LICENSE, TagValue::Str(info.license.clone()));
    }
    let group = info.rpm.group.clone().unwrap_or_else(|| "Applications/System".to_string());
    h.push(tags::GROUP, TagValue::Str(group));
    if !info.homepage.is_empty() {
        h.push(tags::URL, TagValue::Str(info.homepage.clone()));
    }
    h.push(tags::ARCH, TagValue::Str(arch.to_string()));
    h.push(
        tags::OS,
        TagValue::Str(info.rpm.os.clone().unwrap_or_else(|| "linux".to_string())),
    );
    if let Some(dist) = &info.rpm.distribution {
        h.push(tags::DISTRIBUTION, TagValue::Str(dist.clone()));
    }

    h.push(tags::PAYLOADFORMAT, TagValue::Str("cpio".to_string()));
    h.push(
        tags::PAYLOADCOMPRESSOR,
        TagValue::Str(payload_compressor_name(info.rpm.compression).to_string()),
    );
    h.push(
        tags::PAYLOADFLAGS,
        TagValue::Str(info.rpm.compression_level.clone().unwrap_or_else(|| "9".to_string())),
    );
    h.push(tags::PAYLOADDIGEST, TagValue::StringArray(vec![sha256_hex(payload)]));
    h.push(tags::PAYLOADDIGESTALGO, TagValue::Int32(8));

    let groups = build_file_groups(contents, mtime);
    h.push(tags::DIRNAMES, TagValue::StringArray(groups.dirnames));
    h.push(tags::DIRINDEXES, TagValue::Int32Array(groups.dirindexes));
    h.push(tags::BASENAMES, TagValue::StringArray(groups.basenames));
    h.push(tags::FILESIZES, TagValue::Int32Array(groups.sizes));
    h.push(tags::FILEMODES, TagValue::Int16Array(groups.modes));
    h.push(tags::FILEUSERNAME, TagValue::StringArray(groups.usernames));
    h.push(tags::FILEGROUPNAME, TagValue::StringArray(groups.groupnames));
    h.push(tags::FILEMTIMES, TagValue::Int32Array(groups.mtimes));
    h.push(tags::FILEDIGESTS, TagValue::StringArray(groups.digests));
    h.push(tags::FILELINKTOS, TagValue::StringArray(groups.linktos));
    h.push(tags::FILEFLAGS, TagValue::Int32Array(groups.flags));
    h.push(tags::FILEINODE, TagValue::Int32Array(groups.inodes.clone()));
    h.push(
        tags::FILEDIGESTALGO,
        TagValue::Int32Array(vec![8; groups.inodes.len()]),
    );
    h.push(
        tags::FILEVERIFYFLAGS,
        TagValue::Int32Array(vec![-1; groups.inodes.len()]),
    );
    h.push(
        tags::FILERDEVS,
        TagValue::Int16Array(vec![0; groups.inodes.len()]),
    );
    h.push(
        tags::FILELANGS,
        TagValue::StringArray(vec![String::new(); groups.inodes.len()]),
    );

    // A package always provides itself.
    let mut provide_names = vec![info.name.clone()];
    let mut provide_versions = vec![full_version.clone()];
    let mut provide_flags = vec![tags::sense::EQUAL];
    let (mut pn, mut pv, mut pf) = relation_arrays(&overridable.provides);
    provide_names.append(&mut pn);
    provide_versions.append(&mut pv);
    provide_flags.append(&mut pf);
    h.push(tags::PROVIDENAME, TagValue::StringArray(provide_names));
    h.push(tags::PROVIDEVERSION, TagValue::StringArray(provide_versions));
    h.push(tags::PROVIDEFLAGS, TagValue::Int32Array(provide_flags));

    let (rn, rv, rf) = relation_arrays(&overridable.depends);
    if !rn.is_empty() {
        h.push(tags::REQUIRENAME, TagValue::StringArray(rn));
        h.push(tags::REQUIREVERSION, TagValue::StringArray(rv));
        h.push(tags::REQUIREFLAGS, TagValue::Int32Array(rf));
    }

    let (cn, cv, cf) = relation_arrays(&overridable.conflicts);
    if !cn.is_empty() {
        h.push(tags::CONFLICTNAME, TagValue::StringArray(cn));
        h.push(tags::CONFLICTVERSION, TagValue::StringArray(cv));
        h.push(tags::CONFLICTFLAGS, TagValue::Int32Array(cf));
    }

    let (on, ov, of) = relation_arrays(&info.rpm.obsoletes);
    if !on.is_empty() {
        h.push(tags::OBSOLETENAME, TagValue::StringArray(on));
        h.push(tags::OBSOLETEVERSION, TagValue::StringArray(ov));
        h.push(tags::OBSOLETEFLAGS, TagValue::Int32Array(of));
    }

    let (sn, sv, sf) = relation_arrays(&overridable.suggests);
    if !sn.is_empty() {
        h.push(tags::SUGGESTNAME, TagValue::StringArray(sn));
        h.push(tags::SUGGESTVERSION, TagValue::StringArray(sv));
        h.push(tags::SUGGESTFLAGS, TagValue::Int32Array(sf));
    }

    let (ren, rev, ref_) = relation_arrays(&overridable.recommends);
    if !ren.is_empty() {
        h.push(tags::RECOMMENDNAME, TagValue::StringArray(ren));
        h.push(tags::RECOMMENDVERSION, TagValue::StringArray(rev));
        h.push(tags::RECOMMENDFLAGS, TagValue::Int32Array(ref_));
    }

    for (script_tag, prog_tag, path) in [
        (tags::PRETRANS, tags::PRETRANSPROG, info.scripts.pretrans.as_ref()),
        (tags::PREIN, tags::PREINPROG, info.scripts.preinstall.as_ref()),
        (tags::POSTIN, tags::POSTINPROG, info.scripts.postinstall.as_ref()),
        (tags::PREUN, tags::PREUNPROG, info.scripts.preremove.as_ref()),
        (tags::POSTUN, tags::POSTUNPROG, info.scripts.postremove.as_ref()),
        (tags::POSTTRANS, tags::POSTTRANSPROG, info.scripts.posttrans.as_ref()),
    ] {
        if let Some(path) = path {
            let data = std::fs::read_to_string(path).map_err(|source| {
                PkgError::Content(crate::error::ContentError::SourceIo {
                    path: path.as_std_path().to_path_buf(),
                    source,
                })
            })?;
            h.push(script_tag, TagValue::Str(data));
            h.push(prog_tag, TagValue::Str("/bin/sh".to_string()));
        }
    }

    Ok(h.build())
}

fn payload_compressor_name(compression: crate::info::Compression) -> &'static str {
    match compression {
        crate::info::Compression::Gzip => "gzip",
        crate::info::Compression::Xz => "xz",
        crate::info::Compression::Lzma => "lzma",
        crate::info::Compression::Zstd => "zstd",
        crate::info::Compression::None => "none",
    }
}

fn build_signature_header(
    info: &Info,
    immutable: &[u8],
    raw_payload: &[u8],
    payload: &[u8],
) -> PkgResult<Vec<u8>> {
    let mut h = HeaderBuilder::new(tags::HEADER_SIGNATURES);
    // archive-size: the compressed payload, as it will sit on disk.
    h.push(tags::sig::SIZE, TagValue::Int32(payload.len() as i32));
    // installed-size: the uncompressed cpio stream.
    h.push(tags::sig::PAYLOADSIZE, TagValue::Int32(raw_payload.len() as i32));
    h.push(tags::sig::SHA256, TagValue::Str(sha256_hex(immutable)));

    if let Some(sig_cfg) = &info.rpm.signature {
        if let Some(rsa_key) = &sig_cfg.rsa_key_file {
            let digest = crate::util::checksum::sha1_bytes(immutable);
            let km = KeyMaterial {
                bytes: std::fs::read(rsa_key)?,
                passphrase: sig_cfg.passphrase.clone(),
                key_id: sig_cfg.key_id.clone(),
            };
            let signer = Signer::Keyring(km);
            let rsa_sig = signer.rsa_sign_sha1_digest(&digest)?;
            h.push(tags::sig::RSA, TagValue::Bin(rsa_sig));
        }
        let pgp_bytes = match (&sig_cfg.pgp_key_file, &sig_cfg.pgp_key) {
            (Some(path), _) => Some(std::fs::read(path)?),
            (None, Some(inline)) => Some(inline.as_bytes().to_vec()),
            (None, None) => None,
        };
        if let Some(bytes) = pgp_bytes {
            let km = KeyMaterial {
                bytes,
                passphrase: sig_cfg.passphrase.clone(),
                key_id: sig_cfg.key_id.clone(),
            };
            let signer = Signer::Keyring(km);
            let mut header_and_payload = Vec::with_capacity(immutable.len() + payload.len());
            header_and_payload.extend_from_slice(immutable);
            header_and_payload.extend_from_slice(payload);
            let sig = signer.pgp_detached_binary(&header_and_payload)?;
            h.push(tags::sig::PGP, TagValue::Bin(sig));
        }
    }

    let mut bytes = h.build();
    rpmfmt::pad8(&mut bytes);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_parses_versioned_dependency() {
        let (name, version, flags) = parse_relation("libfoo >= 1.2.3");
        assert_eq!(name, "libfoo");
        assert_eq!(version, "1.2.3");
        assert_eq!(flags, tags::sense::GREATER | tags::sense::EQUAL);
    }

    #[test]
    fn relation_without_version_is_sense_any() {
        let (name, version, flags) = parse_relation("libbar");
        assert_eq!(name, "libbar");
        assert_eq!(version, "");
        assert_eq!(flags, tags::sense::ANY);
    }

    #[test]
    fn conventional_file_name_uses_rpm_arch_mapping() {
        let info: Info = serde_yml::from_str("name: hello\narch: amd64\nversion: 1.0.0\n").unwrap();
        let packager = RpmPackager;
        let name = packager.conventional_file_name(&info).unwrap();
        assert_eq!(name, "hello-1.0.0-1.x86_64.rpm");
    }

    #[test]
    fn package_writes_lead_and_header_magics() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("hello");
        std::fs::write(&bin, b"binary").unwrap();

        let mut info: Info =
            serde_yml::from_str("name: hello\narch: amd64\nversion: 1.0.0\n").unwrap();
        info.overridable.contents = vec![Content::file(
            bin.to_string_lossy().to_string(),
            "/usr/bin/hello",
        )];

        let packager = RpmPackager;
        let mut out = Vec::new();
        let env = HashMap::new();
        packager.package(&info, &env, &mut out).unwrap();

        assert!(out.len() > 96);
        assert_eq!(&out[0..4], &[0xed, 0xab, 0xee, 0xdb]);
        // Signature header starts right after the 96-byte lead.
        assert_eq!(&out[96..100], &[0x8e, 0xad, 0xe8, 0x01]);
    }
}
