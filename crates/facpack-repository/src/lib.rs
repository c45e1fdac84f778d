//! This crate is a part of **facpack**.
//!
//! ## What's in here?
//!
//! The on-disk side of a mod library. A library root looks like this:
//!
//! ```text
//! <root>/
//! ├── modpacks.yml           # modpack definitions
//! └── mods/
//!     ├── flib_0.12.9.zip    # mods, zipped...
//!     ├── rso-mod/           # ...or unpacked
//!     └── mod-settings.dat   # the game's binary settings file
//! ```
//!
//! [`LocalRepository::open`] loads all of that into a
//! [`ModCollection`](facpack_mod::ModCollection).

use std::io;
use std::path::{Path, PathBuf};

use facpack_mod::ModCollection;
use facpack_settings::{CodecError, SettingsFile, codec};
use tracing::{info, instrument};

mod modpacks;
pub mod persist;
mod scan;
pub use modpacks::*;
pub use scan::*;

use crate::persist::{PersistError, PersistedEntity};

#[derive(Debug, Clone)]
pub struct LocalRepository {
    root_directory: PathBuf,
    pub collection: ModCollection,
}

impl LocalRepository {
    pub const MODS_DIRECTORY: &str = "mods";
    pub const SETTINGS_FILE_NAME: &str = "mod-settings.dat";

    /// "Open" a local library in `root_directory`: scan its mods and load its
    /// modpack definitions.
    ///
    /// # Errors
    ///
    /// This function will return an error if `root_directory` can't be
    /// canonicalized, its mods directory can't be listed, or `modpacks.yml`
    /// is unreadable.
    #[instrument(skip_all, fields(root = ?root_directory.as_ref()))]
    pub fn open(root_directory: impl AsRef<Path>) -> Result<Self, Error> {
        let root_directory = root_directory
            .as_ref()
            .canonicalize()
            .map_err(|source| Error::Io {
                source,
                path: Some(root_directory.as_ref().to_path_buf()),
            })?;

        let mut collection = ModCollection::new();
        let mods_directory = root_directory.join(Self::MODS_DIRECTORY);
        if mods_directory.is_dir() {
            for installed in scan_mods(&mods_directory)? {
                collection.add_mod(installed);
            }
        }

        ModpackDefinitions::read_from(&root_directory)?.apply(&mut collection);
        info!(
            mods = collection.mods().count(),
            modpacks = collection.modpacks().count(),
            "Opened library"
        );

        Ok(Self {
            root_directory,
            collection,
        })
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    #[must_use]
    pub fn mods_directory(&self) -> PathBuf {
        self.root_directory.join(Self::MODS_DIRECTORY)
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.mods_directory().join(Self::SETTINGS_FILE_NAME)
    }

    /// Writes the modpacks of [`Self::collection`] to `modpacks.yml`.
    ///
    /// # Errors
    ///
    /// See [`PersistedEntity::write_to`].
    pub fn save_modpacks(&self) -> Result<(), Error> {
        ModpackDefinitions::from_collection(&self.collection).write_to(&self.root_directory)?;
        Ok(())
    }

    /// Reads and decodes `mods/mod-settings.dat`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file can't be read, [`Error::Codec`] if it
    /// can't be decoded.
    pub fn read_settings(&self) -> Result<SettingsFile, Error> {
        let path = self.settings_path();
        let bytes = std::fs::read(&path).map_err(|source| Error::Io {
            source,
            path: Some(path),
        })?;
        Ok(codec::decode(&bytes)?)
    }

    /// Encodes `settings` into `mods/mod-settings.dat`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if `settings` can't be encoded, [`Error::Io`]
    /// if the file can't be written.
    pub fn write_settings(&self, settings: &SettingsFile) -> Result<(), Error> {
        let bytes = codec::encode(settings)?;
        let path = self.settings_path();
        std::fs::create_dir_all(self.mods_directory()).map_err(|source| Error::Io {
            source,
            path: Some(self.mods_directory()),
        })?;
        std::fs::write(&path, bytes).map_err(|source| Error::Io {
            source,
            path: Some(path),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("An I/O error occurred (path: {path:?})")]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },
    #[error(transparent)]
    Walkdir(#[from] walkdir::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to parse a mod's info.json")]
    Json(#[from] serde_json::Error),
    #[error("{0:?} has no info.json")]
    MissingInfo(PathBuf),
    #[error("Failed to read from or write to a persistent file")]
    Persistence(#[from] PersistError),
    #[error("Failed to read or write the settings file")]
    Codec(#[from] CodecError),
}
