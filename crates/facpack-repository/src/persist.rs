use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
#[must_use]
pub enum PersistError {
    #[error("An I/O error occurred, path at fault: {path:?}")]
    Io {
        source: io::Error,
        path: Option<PathBuf>,
    },

    #[error("Failed to (de)serialize data to/from YAML")]
    SerdeYml(#[from] serde_yml::Error),
}

impl PersistError {
    pub const fn io(source: io::Error, path: PathBuf) -> Self {
        Self::Io {
            source,
            path: Some(path),
        }
    }
}

/// An entity (type) that is persisted in a YAML file inside a library.
pub trait PersistedEntity: Serialize + for<'de> Deserialize<'de> + Default {
    /// Path of the file, relative to the library root.
    const FILE_PATH: &'static str;

    fn path_in(root: &Path) -> PathBuf {
        root.join(Self::FILE_PATH)
    }

    /// Deserializes an instance of [`Self`] from [`Self::FILE_PATH`] under
    /// `root`. A missing file yields [`Default::default`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the file exists but can't be
    /// read, or an error occurs when deserializing its contents into
    /// [`Self`].
    fn read_from(root: &Path) -> Result<Self, PersistError> {
        let path = Self::path_in(root);
        let yml = match fs::read_to_string(&path) {
            Ok(yml) => yml,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(PersistError::io(source, path)),
        };
        let entity = serde_yml::from_str(&yml)?;
        Ok(entity)
    }

    /// Serialize `self` into a string and write it to [`Self::FILE_PATH`]
    /// under `root`.
    ///
    /// # Errors
    ///
    /// This function will return an error if an error occurs while serializing
    /// [`self`](Self) to a string or while writing that string to the file.
    fn write_to(&self, root: &Path) -> Result<(), PersistError> {
        let path = Self::path_in(root);
        let yml = serde_yml::to_string(self)?;
        fs::write(&path, yml).map_err(|source| PersistError::io(source, path))?;
        Ok(())
    }
}
