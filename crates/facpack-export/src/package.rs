use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::template::ExportTemplate;
use crate::{ExportError, ImportError};

/// Name of the template inside a package.
pub const TEMPLATE_FILE_NAME: &str = "pack.json";

/// Writes `template` and every `staged` entry into a zip archive at `output`.
///
/// Staged entries land at the archive root under their own file name,
/// directories with all of their contents. A half-written archive is removed.
///
/// # Errors
///
/// Returns [`ExportError::Io`], [`ExportError::Zip`] or
/// [`ExportError::Walkdir`] if reading the staged entries or writing the
/// archive fails.
#[instrument(skip(template, staged), fields(staged = staged.len()))]
pub fn package(
    template: &ExportTemplate,
    staged: &[PathBuf],
    output: &Path,
) -> Result<(), ExportError> {
    info!(message = "Writing package", ?output);
    let result = write_package(template, staged, output);
    if result.is_err() && output.exists() {
        if let Err(error) = fs::remove_file(output) {
            warn!(?error, ?output, "Failed to remove a broken package");
        }
    }
    result
}

fn write_package(
    template: &ExportTemplate,
    staged: &[PathBuf],
    output: &Path,
) -> Result<(), ExportError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| ExportError::Io {
            source,
            path: Some(path),
        }
    };

    let json = template.to_json_pretty()?;
    let file = File::create(output).map_err(io_error(output))?;
    let mut archive = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    archive.start_file(TEMPLATE_FILE_NAME, options)?;
    archive
        .write_all(json.as_bytes())
        .map_err(io_error(output))?;

    for entry in staged {
        let Some(base) = entry.parent() else {
            continue;
        };

        for item in WalkDir::new(entry).sort_by_file_name() {
            let item = item?;
            let name = archive_name(item.path().strip_prefix(base).unwrap_or(item.path()));
            if item.file_type().is_dir() {
                archive.add_directory(name, options)?;
            } else {
                let contents = fs::read(item.path()).map_err(io_error(item.path()))?;
                archive.start_file(name, options)?;
                archive
                    .write_all(&contents)
                    .map_err(io_error(output))?;
            }
        }
    }

    archive.finish()?;
    Ok(())
}

/// Reads the template out of a package, or out of a bare JSON export file.
///
/// # Errors
///
/// Returns [`ImportError::Io`] or [`ImportError::Zip`] if the file can't be
/// read, and any error of [`ExportTemplate::from_json`].
pub fn read_template(path: &Path) -> Result<ExportTemplate, ImportError> {
    let io_error = |source: io::Error| ImportError::Io {
        source,
        path: Some(path.to_path_buf()),
    };

    let bytes = fs::read(path).map_err(io_error)?;
    let json = if bytes.starts_with(&ZIP_MAGIC) {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut json = String::new();
        archive
            .by_name(TEMPLATE_FILE_NAME)?
            .read_to_string(&mut json)
            .map_err(io_error)?;
        json
    } else {
        String::from_utf8(bytes)
            .map_err(|_| ImportError::CorruptExportData("export file is not UTF-8".into()))?
    };

    ExportTemplate::from_json(&json)
}

/// Whether `path` is a zip package rather than a bare JSON export file.
///
/// # Errors
///
/// Returns [`ImportError::Io`] if the file can't be opened.
pub fn is_package(path: &Path) -> Result<bool, ImportError> {
    let mut file = File::open(path).map_err(|source| ImportError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut magic = [0; 4];
    Ok(file.read_exact(&mut magic).is_ok() && magic == ZIP_MAGIC)
}

/// Copies the files of included mods out of a package into
/// `mods_directory`, dropping the `{uid}+` prefix of their names.
///
/// Mods that already exist in `mods_directory` are left alone. Returns the
/// path of every extracted mod. If extraction fails, every mod it created so
/// far is removed again.
///
/// # Errors
///
/// Returns [`ImportError::Io`] or [`ImportError::Zip`] if the package can't be
/// read or a file can't be written.
#[instrument]
pub fn extract_included(package: &Path, mods_directory: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let mut extracted = vec![];
    match extract_entries(package, mods_directory, &mut extracted) {
        Ok(()) => Ok(extracted),
        Err(error) => {
            remove_extracted(&extracted);
            Err(error)
        }
    }
}

/// Removes mods returned by [`extract_included`]. Failures are logged, not
/// returned.
pub fn remove_extracted(extracted: &[PathBuf]) {
    for path in extracted {
        let removed = match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => Err(error),
        };
        match removed {
            Ok(()) => debug!(?path, "Removed extracted mod"),
            Err(error) => warn!(?error, ?path, "Failed to remove an extracted mod"),
        }
    }
}

fn extract_entries(
    package: &Path,
    mods_directory: &Path,
    extracted: &mut Vec<PathBuf>,
) -> Result<(), ImportError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| ImportError::Io {
            source,
            path: Some(path),
        }
    };

    let file = File::open(package).map_err(io_error(package))?;
    let mut archive = ZipArchive::new(file)?;
    let mut wanted: HashMap<String, bool> = HashMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "Skipping an entry with an unsafe path");
            continue;
        };

        let mut components = relative.components();
        let Some(first) = components.next() else {
            continue;
        };
        let first = first.as_os_str().to_string_lossy();
        let Some((_, mod_name)) = first.split_once('+') else {
            continue;
        };

        let root = mods_directory.join(mod_name);
        let is_wanted = *wanted.entry(mod_name.to_string()).or_insert_with(|| {
            let exists = root.exists();
            if exists {
                debug!(?root, "Mod already exists, not extracting it");
            } else {
                extracted.push(root.clone());
            }
            !exists
        });
        if !is_wanted {
            continue;
        }

        let target = root.join(components.as_path());
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut output = File::create(&target).map_err(io_error(&target))?;
        io::copy(&mut entry, &mut output).map_err(io_error(&target))?;
    }

    Ok(())
}

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Zip entry names always use forward slashes.
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
