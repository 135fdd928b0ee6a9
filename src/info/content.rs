//! The file model: [`Content`] and [`FileInfo`], spec §3.

use serde::{Deserialize, Serialize};

/// One entry in a package's installation tree, before or after the
/// content pipeline has expanded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Content {
    /// Path on the builder host. Empty for synthetic entries (implicit
    /// directories, the Debian changelog).
    #[serde(default)]
    pub source: String,

    /// Absolute install path. Normalised by the content pipeline; may
    /// arrive un-normalised from user config.
    pub destination: String,

    /// What kind of entry this is.
    #[serde(default)]
    pub r#type: ContentType,

    /// Metadata for the installed file (mode/owner/group/mtime/size).
    #[serde(default)]
    pub file_info: Option<FileInfo>,

    /// Restrict this entry to one target format. `None` means "every
    /// format".
    #[serde(default)]
    pub packager: Option<String>,

    /// If true, `${VAR}`/`$VAR` references in `source`/`destination` are
    /// expanded before use.
    #[serde(default)]
    pub expand: bool,
}

impl Content {
    /// Build a minimal regular-file content entry, the common case in
    /// tests and examples.
    pub fn file(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Content {
            source: source.into(),
            destination: destination.into(),
            r#type: ContentType::File,
            file_info: None,
            packager: None,
            expand: false,
        }
    }

    /// A synthetic implicit-directory entry at `destination`, per spec §4.1
    /// step 6.
    pub fn implicit_dir(destination: impl Into<String>) -> Self {
        Content {
            source: String::new(),
            destination: destination.into(),
            r#type: ContentType::ImplicitDir,
            file_info: Some(FileInfo {
                mode: Some(0o755),
                owner: Some("root".into()),
                group: Some("root".into()),
                mtime: None,
                size: Some(0),
                mode_explicit: false,
            }),
            packager: None,
            expand: false,
        }
    }

    /// True if this entry's destination marks it as a configuration file
    /// for the purposes of Debian `conffiles` / RPM file-flags.
    pub fn is_config(&self) -> bool {
        matches!(
            self.r#type,
            ContentType::Config | ContentType::ConfigNoReplace
        )
    }

    /// True for entries that contribute a directory to the tar/cpio
    /// stream (explicit or synthesised).
    pub fn is_dir(&self) -> bool {
        matches!(self.r#type, ContentType::Dir | ContentType::ImplicitDir)
    }

    /// For `type == Symlink`, the link target text. Symlinks record their
    /// target in `source` rather than reading anything from the build
    /// host, since the target need not exist there (spec §8 scenario 5).
    pub fn link_target(&self) -> &str {
        &self.source
    }
}

/// The kind of a [`Content`] entry, spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    /// A plain installed file.
    #[default]
    File,
    /// A file the installer should treat as user-editable, replaced on
    /// upgrade.
    Config,
    /// A file the installer should treat as user-editable, *never*
    /// replaced on upgrade once it exists.
    #[serde(rename = "config|noreplace")]
    ConfigNoReplace,
    /// A symbolic link; `link_target` holds the target.
    Symlink,
    /// An explicit directory entry.
    Dir,
    /// `source` is a directory; every descendant is expanded into its own
    /// entry by the content pipeline.
    Tree,
    /// RPM-only: a placeholder path the package owns without shipping
    /// content for it.
    Ghost,
    /// Documentation file (sets RPM doc file-flag).
    Doc,
    /// Licence file (sets RPM licence file-flag).
    Licence,
    /// Readme file (sets RPM readme file-flag).
    Readme,
    /// Synthesised Debian changelog entry.
    DebianChangelog,
    /// Synthesised parent directory, inserted by the content pipeline.
    ImplicitDir,
}

/// Per-file metadata. Any field left `None` is defaulted by the content
/// pipeline's "Apply FileInfo defaults" step (spec §4.1 step 4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileInfo {
    /// Unix permission bits, including setuid/setgid/sticky.
    #[serde(default)]
    pub mode: Option<u32>,

    /// Owning user name.
    #[serde(default)]
    pub owner: Option<String>,

    /// Owning group name.
    #[serde(default)]
    pub group: Option<String>,

    /// Modification time, Unix seconds.
    #[serde(default)]
    pub mtime: Option<i64>,

    /// File size in bytes.
    #[serde(default)]
    pub size: Option<u64>,

    /// True if `mode` was supplied explicitly by the caller rather than
    /// defaulted from a `stat()` of the source file. Needed because every
    /// mode, explicit or defaulted, is still masked by `umask` (spec §3
    /// invariant 3), but scripts (`preinst` et al.) must keep their
    /// caller-specified `0o755` untouched by the *content* pipeline
    /// (script modes are applied directly by each packager instead).
    #[serde(skip)]
    pub mode_explicit: bool,
}

impl FileInfo {
    /// Apply `umask` to `mode`, masking away the bits the umask clears
    /// while preserving file-type and setuid/setgid/sticky bits (the type
    /// bits are not present in `mode` as modelled here; only mode-and-special
    /// bits are, so this is a plain permission mask).
    pub fn masked_mode(&self, umask: u32) -> u32 {
        self.mode.unwrap_or(0) & !umask
    }
}
