//! End-to-end scenarios, spec §8.

use std::collections::HashMap;
use std::io::Read;

use pkgforge::info::Content;
use pkgforge::packager::apk::ApkPackager;
use pkgforge::packager::deb::DebPackager;
use pkgforge::packager::rpm::RpmPackager;
use pkgforge::packager::Packager;
use pkgforge::Info;

fn load(yaml: &str) -> Info {
    serde_yml::from_str(yaml).unwrap()
}

fn ungzip(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
    out
}

/// Scenario 1: minimal Debian package installs a single executable at the
/// mode its source file carried on disk.
#[test]
fn minimal_debian_installs_executable_at_source_mode() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("fake");
    std::fs::write(&bin, b"#!/bin/sh\necho fake\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let mut info = load("name: foo\narch: amd64\nversion: 1.0.0\n");
    info.overridable.contents = vec![Content::file(bin.to_string_lossy().to_string(), "/usr/bin/fake")];

    let packager = DebPackager;
    let mut out = Vec::new();
    packager.package(&info, &HashMap::new(), &mut out).unwrap();

    assert_eq!(&out[0..8], b"!<arch>\n");
    assert_eq!(
        packager.conventional_file_name(&info).unwrap(),
        "foo_1.0.0_amd64.deb"
    );

    let data_gz = extract_ar_member(&out, "data.tar.gz");
    let data_tar = ungzip(&data_gz);
    let mut archive = tar::Archive::new(data_tar.as_slice());
    let mut found = false;
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path.contains("usr/bin/fake") {
            found = true;
            #[cfg(unix)]
            assert_eq!(entry.header().mode().unwrap() & 0o777, 0o755);
        }
    }
    assert!(found, "data.tar.gz should contain usr/bin/fake");
}

/// Scenario 2: a content marked `config` sets RPM's config file-flag bit.
#[test]
fn rpm_config_file_sets_config_flag_bit() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("foo.conf");
    std::fs::write(&conf, b"key=value\n").unwrap();

    let mut info = load("name: foo\narch: amd64\nversion: 1.0.0\n");
    info.overridable.contents = vec![{
        let mut c = Content::file(conf.to_string_lossy().to_string(), "/etc/foo.conf");
        c.r#type = pkgforge::info::ContentType::Config;
        c
    }];

    let packager = RpmPackager;
    let mut out = Vec::new();
    packager.package(&info, &HashMap::new(), &mut out).unwrap();

    assert_eq!(&out[0..4], &[0xed, 0xab, 0xee, 0xdb]);
    let flags = read_rpm_int32_array(&out, rpmforge_file_flags_tag());
    assert_eq!(flags, vec![1]); // FILEFLAGS bit 0 = config
}

/// Scenario 5: a symlink content lands in the APK data tar as a symlink
/// entry pointing at its source.
#[test]
fn apk_symlink_content_round_trips() {
    let mut info = load("name: foo\narch: amd64\nversion: 1.0.0\n");
    info.overridable.contents = vec![{
        let mut c = Content::file("/etc/foo.conf", "/path/to/symlink");
        c.r#type = pkgforge::info::ContentType::Symlink;
        c
    }];

    let packager = ApkPackager;
    let mut out = Vec::new();
    packager.package(&info, &HashMap::new(), &mut out).unwrap();

    // Two gzip streams back to back (no signature configured): split at
    // the second gzip magic to isolate the data tar.
    let second_magic = out
        .windows(2)
        .enumerate()
        .skip(2)
        .find(|(_, w)| *w == [0x1f, 0x8b])
        .map(|(i, _)| i)
        .expect("two gzip streams expected");
    let data_tar = ungzip(&out[second_magic..]);

    let mut archive = tar::Archive::new(data_tar.as_slice());
    let mut found = false;
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path.contains("path/to/symlink") {
            found = true;
            assert_eq!(entry.header().entry_type(), tar::EntryType::Symlink);
            assert_eq!(
                entry.link_name().unwrap().unwrap().to_string_lossy(),
                "/etc/foo.conf"
            );
        }
    }
    assert!(found, "data tar should contain the symlink entry");
}

/// Scenario 6: building twice with the same `mtime` yields byte-identical
/// output.
#[test]
fn reproducible_build_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("fake");
    std::fs::write(&bin, b"#!/bin/sh\necho fake\n").unwrap();

    let mut info = load("name: foo\narch: amd64\nversion: 1.0.0\nmtime: 1700000000\n");
    info.overridable.contents = vec![Content::file(bin.to_string_lossy().to_string(), "/usr/bin/fake")];

    let packager = DebPackager;
    let mut first = Vec::new();
    let mut second = Vec::new();
    packager.package(&info, &HashMap::new(), &mut first).unwrap();
    packager.package(&info, &HashMap::new(), &mut second).unwrap();

    assert_eq!(first, second);
}

fn extract_ar_member(archive: &[u8], name: &str) -> Vec<u8> {
    let mut pos = 8; // skip "!<arch>\n"
    while pos + 60 <= archive.len() {
        let header = &archive[pos..pos + 60];
        let member_name = std::str::from_utf8(&header[0..16]).unwrap().trim_end();
        let size: usize = std::str::from_utf8(&header[48..58])
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let data_start = pos + 60;
        let data = &archive[data_start..data_start + size];
        if member_name == name {
            return data.to_vec();
        }
        pos = data_start + size + (size % 2);
    }
    panic!("member {name} not found");
}

fn rpmforge_file_flags_tag() -> u32 {
    1037
}

/// Minimal reader for this crate's own RPM header encoding, just enough to
/// pull one `Int32`-typed tag's values back out for assertions.
fn read_rpm_int32_array(rpm_bytes: &[u8], tag: u32) -> Vec<i32> {
    let sig_start = 96;
    let (sig_count, sig_size) = header_count_size(rpm_bytes, sig_start);
    let sig_raw_len = 16 + sig_count * 16 + sig_size;
    let sig_padded_len = sig_raw_len.div_ceil(8) * 8;
    let hdr_start = sig_start + sig_padded_len;

    let (count, _size) = header_count_size(rpm_bytes, hdr_start);
    let index_start = hdr_start + 16;
    let store_start = index_start + count * 16;

    for i in 0..count {
        let entry = &rpm_bytes[index_start + i * 16..index_start + i * 16 + 16];
        let entry_tag = u32::from_be_bytes(entry[0..4].try_into().unwrap());
        let entry_type = u32::from_be_bytes(entry[4..8].try_into().unwrap());
        let offset = u32::from_be_bytes(entry[8..12].try_into().unwrap()) as usize;
        let num_items = u32::from_be_bytes(entry[12..16].try_into().unwrap()) as usize;
        if entry_tag == tag && entry_type == 4 {
            let mut values = Vec::with_capacity(num_items);
            for j in 0..num_items {
                let start = store_start + offset + j * 4;
                values.push(i32::from_be_bytes(
                    rpm_bytes[start..start + 4].try_into().unwrap(),
                ));
            }
            return values;
        }
    }
    panic!("tag {tag} not found in RPM header");
}

fn header_count_size(bytes: &[u8], start: usize) -> (usize, usize) {
    let count = u32::from_be_bytes(bytes[start + 8..start + 12].try_into().unwrap()) as usize;
    let size = u32::from_be_bytes(bytes[start + 12..start + 16].try_into().unwrap()) as usize;
    (count, size)
}
