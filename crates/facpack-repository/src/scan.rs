use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use facpack_mod::{AccurateVersion, GameVersion, Mod, ModName};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::Error;

/// Name of the metadata file every mod carries.
pub const INFO_FILE_NAME: &str = "info.json";

/// The game version mods target when their `info.json` doesn't say.
const DEFAULT_FACTORIO_VERSION: GameVersion = GameVersion::new(0, 12);

/// The fields of `info.json` that matter to a library.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModInfo {
    pub name: ModName,
    pub version: AccurateVersion,
    #[serde(default)]
    pub factorio_version: Option<GameVersion>,
}

impl ModInfo {
    fn into_mod(self, path: &Path) -> Mod {
        Mod {
            name: self.name,
            version: self.version,
            factorio_version: self.factorio_version.unwrap_or(DEFAULT_FACTORIO_VERSION),
            path: path.to_path_buf(),
        }
    }
}

/// Reads every mod found directly inside `directory`: zip archives and
/// unpacked mod directories. Entries that aren't mods, or can't be read, are
/// skipped.
///
/// # Errors
///
/// Fails only if `directory` itself can't be listed.
#[instrument]
pub fn scan_mods(directory: &Path) -> Result<Vec<Mod>, Error> {
    let mut mods = vec![];
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();

        let info = if entry.file_type().is_dir() {
            read_directory_info(path)
        } else if path.extension().is_some_and(|extension| extension == "zip") {
            read_zip_info(path)
        } else {
            debug!(?path, "Not a mod, skipping");
            continue;
        };

        match info {
            Ok(info) => mods.push(info.into_mod(path)),
            Err(error) => warn!(?path, %error, "Skipping unreadable mod"),
        }
    }

    Ok(mods)
}

fn read_directory_info(directory: &Path) -> Result<ModInfo, Error> {
    let path = directory.join(INFO_FILE_NAME);
    let json = fs::read_to_string(&path).map_err(|source| Error::Io {
        source,
        path: Some(path),
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Mod archives hold `info.json` either at their root or inside a single
/// top-level directory.
fn read_zip_info(archive_path: &Path) -> Result<ModInfo, Error> {
    let file = File::open(archive_path).map_err(|source| Error::Io {
        source,
        path: Some(archive_path.to_path_buf()),
    })?;
    let mut archive = ZipArchive::new(file)?;

    let info_entry = archive
        .file_names()
        .filter(|name| {
            let mut parts = name.split('/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(INFO_FILE_NAME), None, None) | (Some(_), Some(INFO_FILE_NAME), None) => true,
                _ => false,
            }
        })
        .min_by_key(|name| name.len())
        .map(ToString::to_string)
        .ok_or_else(|| Error::MissingInfo(archive_path.to_path_buf()))?;

    let mut json = String::new();
    archive
        .by_name(&info_entry)?
        .read_to_string(&mut json)
        .map_err(|source| Error::Io {
            source,
            path: Some(archive_path.to_path_buf()),
        })?;
    Ok(serde_json::from_str(&json)?)
}
