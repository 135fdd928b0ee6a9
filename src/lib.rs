//! # pkgforge
//!
//! A self-contained multi-format Linux package assembler. Builds `.deb`,
//! `.rpm`, `.apk`, `.ipk`, and `.pkg.tar.zst` packages from one
//! format-neutral [`info::Info`] model, writing every container format's
//! bytes directly rather than shelling out to `dpkg-deb`, `rpmbuild`,
//! `abuild`, or `makepkg`.
//!
//! The five packagers in [`packager`] share only the small [`packager::Packager`]
//! trait; [`registry`] is the driver that picks one by format key and runs
//! the shared content pipeline ([`pipeline`]) against it.

pub mod archive;
pub mod error;
pub mod info;
pub mod packager;
pub mod pipeline;
pub mod registry;
pub mod rpmfmt;
pub mod sign;
pub mod util;

pub use error::{PkgError, PkgResult};
pub use info::Info;
