//! Per-format packagers: translate an [`Info`] + its prepared contents
//! into one format's exact container. Spec §4.4-§4.8 and §4.9's "thin
//! polymorphism" note — the five packagers share only
//! `{conventional_file_name, package}`, so this is a tagged-variant-style
//! trait rather than a class hierarchy.

pub mod apk;
pub mod arch;
pub mod deb;
pub mod ipk;
pub mod rpm;

use std::collections::HashMap;
use std::io::Write;

use crate::error::PkgResult;
use crate::info::Info;

/// A format-specific package assembler.
pub trait Packager: Send + Sync {
    /// The format key this packager answers to, e.g. `"deb"`. Matches the
    /// key used in `Info.overrides` and in each `Content.packager` tag.
    fn format(&self) -> &'static str;

    /// The conventional output filename for `info`, e.g.
    /// `foo_1.0.0_amd64.deb` (spec §4.9).
    fn conventional_file_name(&self, info: &Info) -> PkgResult<String>;

    /// Run the content pipeline against `info` (scoped to this format)
    /// and write the finished package to `writer`.
    fn package(
        &self,
        info: &Info,
        env: &HashMap<String, String>,
        writer: &mut dyn Write,
    ) -> PkgResult<()>;
}
