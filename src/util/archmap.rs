//! Per-format architecture name mapping tables, spec §4.4/§4.5.

/// Map a generic architecture name onto Debian/IPK's naming (spec §4.4).
pub fn deb_arch(arch: &str) -> String {
    match arch {
        "386" => "i386",
        "arm5" => "armel",
        "arm6" | "arm7" => "armhf",
        "mips64le" => "mips64el",
        "mipsle" => "mipsel",
        "ppc64le" => "ppc64el",
        "s390" => "s390x",
        "arm64" => "arm64",
        other => other,
    }
    .to_string()
}

/// Map a generic architecture name onto RPM's naming (spec §4.5).
pub fn rpm_arch(arch: &str) -> String {
    match arch {
        "386" => "i386",
        "arm5" => "armel",
        "arm6" | "arm7" => "armhfp",
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        "mips64le" => "mips64el",
        "ppc64le" => "ppc64le",
        "all" | "noarch" => "noarch",
        other => other,
    }
    .to_string()
}

/// APK uses the same generic names `nfpm`-style tools already pass in, no
/// additional remapping is specified beyond `all`/`noarch` normalisation.
pub fn apk_arch(arch: &str) -> String {
    match arch {
        "all" => "noarch",
        other => other,
    }
    .to_string()
}

/// IPK follows the Debian table (spec §4.7: "a minor variant of Debian").
pub fn ipk_arch(arch: &str) -> String {
    deb_arch(arch)
}

/// Arch Linux uses `x86_64`/`aarch64`/`any` conventions; map the common
/// generic spellings onto them, falling back to the input unchanged.
pub fn arch_arch(arch: &str) -> String {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        "all" | "noarch" => "any",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deb_mapping_table() {
        assert_eq!(deb_arch("386"), "i386");
        assert_eq!(deb_arch("arm6"), "armhf");
        assert_eq!(deb_arch("arm7"), "armhf");
        assert_eq!(deb_arch("s390"), "s390x");
        assert_eq!(deb_arch("amd64"), "amd64");
    }

    #[test]
    fn rpm_mapping_table() {
        assert_eq!(rpm_arch("amd64"), "x86_64");
        assert_eq!(rpm_arch("arm64"), "aarch64");
        assert_eq!(rpm_arch("all"), "noarch");
        assert_eq!(rpm_arch("noarch"), "noarch");
    }
}
