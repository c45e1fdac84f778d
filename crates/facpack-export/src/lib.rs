//! This crate is a part of **facpack**.
//!
//! ## What's in here?
//!
//! Turning modpacks into a portable export file and back:
//!
//! - [`export`] walks a [`ModCollection`](facpack_mod::ModCollection) and
//!   builds a flat, deduplicated [`ExportTemplate`], staging the files of
//!   included mods along the way.
//! - [`package`] zips a template together with its staged files, and
//!   [`read_template`] / [`extract_included`] read such a package back.
//! - [`import`] resolves a template against a library and recreates the
//!   modpacks it describes.
//! - [`ExportTemplate::from_json`] reads both the current format and the
//!   older [`legacy`] one.

use std::io;
use std::path::PathBuf;

use facpack_mod::{ModId, ModpackId};

mod builder;
mod importer;
pub mod legacy;
mod mode;
mod package;
mod staging;
mod template;
mod uid;

pub use builder::*;
pub use importer::*;
pub use mode::*;
pub use package::*;
pub use staging::*;
pub use template::*;
pub use uid::*;

/// Identifier of a mod or modpack inside a single export file.
///
/// Mod and modpack Uids live in separate spaces, both counting up from `0`.
pub type Uid = i32;

/// Everything that can go wrong while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Modpacks contain each other: {}", modpacks.join(", "))]
    CyclicDependency { modpacks: Vec<String> },
    #[error("Export data is corrupt: {0}")]
    CorruptExportData(String),
    #[error("No modpack with id {0}")]
    UnknownModpack(ModpackId),
    #[error("No mod with id {0}")]
    UnknownMod(ModId),
    #[error("Failed to stage {path:?}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Some files of {path:?} could not be staged")]
    PartialCopy {
        path: PathBuf,
        error_list: Vec<io::Error>,
    },
    #[error("An I/O error occurred (path: {path:?})")]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Walkdir(#[from] walkdir::Error),
}

/// Everything that can go wrong while reading or importing an export file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Export data is corrupt: {0}")]
    CorruptExportData(String),
    #[error("Unsupported export format version {0}")]
    UnsupportedFormat(u64),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("An I/O error occurred (path: {path:?})")]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}
