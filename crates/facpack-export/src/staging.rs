use std::path::{Path, PathBuf};
use std::{fs, io, thread};

use tracing::{debug, instrument, warn};

use crate::ExportError;

/// A single file or directory to copy into the staging directory.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StagingJob {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Copies every job's source to its target, all at once.
///
/// Either every target ends up staged, or none of them do: if any copy
/// fails, everything staged by this call is removed again and the first
/// failure is returned. Targets must not exist beforehand.
///
/// # Errors
///
/// Returns [`ExportError::Staging`] if a target already exists or a copy
/// fails, [`ExportError::PartialCopy`] if only parts of a directory could be
/// copied, and [`ExportError::Io`] if a target directory can't be created.
#[instrument(skip_all, fields(jobs = jobs.len()))]
pub fn stage_all(jobs: &[StagingJob]) -> Result<Vec<PathBuf>, ExportError> {
    if let Some(job) = jobs.iter().find(|job| job.target.exists()) {
        return Err(ExportError::Staging {
            path: job.target.clone(),
            source: io::Error::from(io::ErrorKind::AlreadyExists),
        });
    }

    for parent in jobs.iter().filter_map(|job| job.target.parent()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            source,
            path: Some(parent.to_path_buf()),
        })?;
    }

    let results = thread::scope(|scope| {
        let handles = jobs
            .iter()
            .map(|job| scope.spawn(move || stage(job)))
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .zip(jobs)
            .map(|(handle, job)| {
                handle.join().unwrap_or_else(|_| {
                    Err(ExportError::Staging {
                        path: job.source.clone(),
                        source: io::Error::other("staging thread panicked"),
                    })
                })
            })
            .collect::<Vec<_>>()
    });

    if let Some(error) = results.into_iter().find_map(Result::err) {
        warn!(?error, "Staging failed, cleaning up");
        jobs.iter().for_each(|job| remove_staged(&job.target));
        return Err(error);
    }

    Ok(jobs.iter().map(|job| job.target.clone()).collect())
}

fn stage(job: &StagingJob) -> Result<(), ExportError> {
    debug!(source = ?job.source, target = ?job.target, "Staging");
    if job.source.is_dir() {
        match copy_dir::copy_dir(&job.source, &job.target) {
            Err(source) => {
                return Err(ExportError::Staging {
                    path: job.source.clone(),
                    source,
                });
            }
            Ok(error_list) if !error_list.is_empty() => {
                return Err(ExportError::PartialCopy {
                    path: job.source.clone(),
                    error_list,
                });
            }
            Ok(_) => {}
        }
    } else {
        fs::copy(&job.source, &job.target).map_err(|source| ExportError::Staging {
            path: job.source.clone(),
            source,
        })?;
    }

    Ok(())
}

fn remove_staged(target: &Path) {
    let result = if target.is_dir() {
        fs::remove_dir_all(target)
    } else if target.exists() {
        fs::remove_file(target)
    } else {
        return;
    };

    if let Err(error) = result {
        warn!(?error, ?target, "Failed to remove a staged entry");
    }
}
