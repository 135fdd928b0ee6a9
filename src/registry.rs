//! The packager registry & driver, spec §4.9 and §5.
//!
//! Spec §9 flags the process-global registry as "an incidental design
//! artefact" of the tool this crate's behaviour is modelled on, and
//! recommends passing the set of available packagers explicitly instead.
//! We keep the global [`Registry`] as a thin parity shim (so a
//! `packager_name`-keyed YAML field can still resolve one) but recommend
//! [`package_with`] as the primary entry point.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{PkgError, PkgResult};
use crate::info::Info;
use crate::packager::Packager;

/// A process-wide, mutex-guarded map from format key to packager. Spec
/// §5: "the only shared mutable state is the packager registry... it is
/// protected by a mutex; reads and writes are serialised."
pub struct Registry {
    inner: Mutex<HashMap<&'static str, Arc<dyn Packager>>>,
}

impl Registry {
    fn new() -> Self {
        Registry {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static Registry {
        static INSTANCE: OnceLock<Registry> = OnceLock::new();
        INSTANCE.get_or_init(Registry::new)
    }

    /// Register `packager` under its own `format()` key, replacing any
    /// packager previously registered for that key.
    pub fn register(&self, packager: Arc<dyn Packager>) {
        let mut map = self.inner.lock().expect("registry mutex poisoned");
        map.insert(packager.format(), packager);
    }

    /// Empty the registry. Intended for test isolation between cases that
    /// each want a clean registry.
    pub fn clear(&self) {
        self.inner.lock().expect("registry mutex poisoned").clear();
    }

    /// Look up the packager registered for `format`.
    pub fn get(&self, format: &str) -> PkgResult<Arc<dyn Packager>> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .get(format)
            .cloned()
            .ok_or_else(|| PkgError::NoSuchFormat(format.to_string()))
    }
}

/// Populate [`Registry::global`] with the five built-in packagers. Safe
/// to call more than once (later calls just re-insert the same entries).
pub fn register_builtin_packagers() {
    let registry = Registry::global();
    registry.register(Arc::new(crate::packager::deb::DebPackager));
    registry.register(Arc::new(crate::packager::rpm::RpmPackager));
    registry.register(Arc::new(crate::packager::apk::ApkPackager));
    registry.register(Arc::new(crate::packager::ipk::IpkPackager));
    registry.register(Arc::new(crate::packager::arch::ArchPackager));
}

/// Look up `format` in the global registry, run the content pipeline
/// against `info`, and write the finished package to `writer`. Spec
/// §4.9's `package(info, format, writer)`.
pub fn package(
    info: &Info,
    format: &str,
    env: &HashMap<String, String>,
    writer: &mut dyn Write,
) -> PkgResult<()> {
    let packager = Registry::global().get(format)?;
    packager.package(info, env, writer)
}

/// The conventional filename `Registry::global()`'s packager for
/// `format` would produce for `info`.
pub fn conventional_file_name(info: &Info, format: &str) -> PkgResult<String> {
    Registry::global().get(format)?.conventional_file_name(info)
}

/// Package `info` with an explicitly supplied slice of packagers,
/// touching no global state. This is the preferred entry point (spec §9
/// design note); [`package`] exists only for parity with a
/// `packager_name`-keyed configuration field.
pub fn package_with(
    packagers: &[&dyn Packager],
    info: &Info,
    format: &str,
    env: &HashMap<String, String>,
    writer: &mut dyn Write,
) -> PkgResult<()> {
    let packager = packagers
        .iter()
        .find(|p| p.format() == format)
        .ok_or_else(|| PkgError::NoSuchFormat(format.to_string()))?;
    packager.package(info, env, writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_format_is_an_error() {
        let registry = Registry::new();
        let err = registry.get("made-up-format").unwrap_err();
        assert!(matches!(err, PkgError::NoSuchFormat(_)));
    }

    #[test]
    fn builtin_packagers_resolve_by_format() {
        register_builtin_packagers();
        for fmt in ["deb", "rpm", "apk", "ipk", "archlinux"] {
            Registry::global().get(fmt).unwrap();
        }
    }
}
