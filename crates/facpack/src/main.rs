mod cli;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use color_eyre::Section;
use color_eyre::eyre::Report;
use color_eyre::owo_colors::OwoColorize;
use eyre::{Context, eyre};
use facpack_export::{
    ExportError, ExportMode, ExportOptions, ExportTemplate, ImportError, ImportReport,
    UnresolvedMod, VersionPolicy,
};
use facpack_mod::AccurateVersion;
use facpack_repository::LocalRepository;
use facpack_repository::persist::PersistError;
use facpack_settings::{CodecError, ModSettings, codec};
use facpack_update::{UpdateGraph, UpdateStep, UpdateTarget};
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, instrument};

use crate::cli::{Options, OutputFormat, SettingsAction, Subcommand, UpdateAction};

fn main() -> Result<(), Report> {
    let options = Options::parse();
    color_eyre::install()?;
    install_tracing()?;

    let status = run_with_options(options);
    if let Err(mut report) = status {
        if let Some(error) = report.downcast_ref::<facpack_repository::Error>() {
            report = match error {
                facpack_repository::Error::Io { .. } | facpack_repository::Error::Walkdir(_) => report
                    .with_note(|| "facpack encountered an I/O error while reading the library.")
                    .with_suggestion(|| "Check that --root points at a library and that you have enough permissions."),
                facpack_repository::Error::Persistence(_) => report
                    .with_suggestion(|| "Check modpacks.yml in the library root for syntax errors."),
                facpack_repository::Error::Codec(_) => report
                    .with_note(|| "The library's mod-settings.dat could not be decoded."),
                _ => report,
            };
        }

        if let Some(error) = report.downcast_ref::<PersistError>() {
            report = match error {
                PersistError::Io { .. } => report
                    .with_note(|| "facpack encountered an I/O error.")
                    .with_suggestion(|| "Ensure you're in the right directory and have enough permissions."),
                PersistError::SerdeYml(_) => report
                    .with_note(|| "facpack had an error while (de)serializing YAML.")
                    .with_suggestion(|| "Check modpacks.yml in the library root for syntax errors."),
            };
        }

        if let Some(error) = report.downcast_ref::<CodecError>() {
            report = match error {
                CodecError::UnsupportedVersion { .. } => report
                    .with_suggestion(|| "Launch the game once to have it rewrite the file in a newer format."),
                CodecError::MalformedData { .. } | CodecError::UnexpectedEof { .. } => report
                    .with_note(|| "The file is not a settings file, or it is damaged."),
                _ => report,
            };
        }

        if let Some(error) = report.downcast_ref::<ExportError>() {
            report = match error {
                ExportError::CyclicDependency { .. } => report
                    .with_suggestion(|| "Remove one of the nested modpack references in modpacks.yml."),
                ExportError::Staging { .. } | ExportError::PartialCopy { .. } => report
                    .with_note(|| "Nothing was left behind in the staging directory."),
                _ => report,
            };
        }

        if let Some(error) = report.downcast_ref::<ImportError>() {
            report = match error {
                ImportError::CorruptExportData(_) => report
                    .with_note(|| "No modpack was created and no mod was extracted.")
                    .with_suggestion(|| "Ask for the export to be made again."),
                ImportError::UnsupportedFormat(_) => report
                    .with_suggestion(|| "The file may come from a newer version of facpack."),
                _ => report,
            };
        }

        return Err(report);
    }

    Ok(())
}

#[instrument(name = "action_handling", skip(options))]
fn run_with_options(options: Options) -> Result<(), Report> {
    let format = options.output_format;
    match options.subcommand {
        Subcommand::Export {
            root,
            output,
            include,
            download_newer,
            mode,
            settings,
            yes,
            modpacks,
        } => {
            let default_mode = ExportMode::new(mode)
                .included(include)
                .download_newer(download_newer);
            export_modpacks(format, &root, &output, default_mode, settings, yes, &modpacks)
        }

        Subcommand::Import { root, save, file } => import_package(format, &root, &file, save),

        Subcommand::Settings { action } => match action {
            SettingsAction::Decode { file } => {
                let bytes = fs::read(&file).wrap_err_with(|| format!("Failed to read {file:?}"))?;
                let (version, json) = codec::decode_json(&bytes)?;
                match format {
                    OutputFormat::Human => {
                        eprintln!("Written by version {}", version.bold());
                        println!("{}", serde_json::to_string_pretty(&json)?);
                    }
                    _ => emit(
                        format,
                        &DecodedSettings {
                            version,
                            settings: json,
                        },
                    )?,
                }
                Ok(())
            }

            SettingsAction::Encode {
                json,
                output,
                game_version,
            } => {
                let text = read_input(&json)?;
                let bytes = codec::encode_json_str(game_version, &text)?;
                fs::write(&output, bytes).wrap_err_with(|| format!("Failed to write {output:?}"))?;
                info!(?output, %game_version, "Wrote settings file");
                Ok(())
            }

            SettingsAction::Show { root } => {
                let repository = LocalRepository::open(&root)?;
                let file = repository.read_settings()?;
                let settings = ModSettings::from_tree(&file.tree);
                match format {
                    OutputFormat::Human => {
                        for (load_time, name, value) in settings.iter() {
                            println!("{:<17} {} = {value}", load_time.blue(), name.bold());
                        }
                    }
                    _ => emit(format, &settings)?,
                }
                Ok(())
            }
        },

        Subcommand::Update { action } => match action {
            UpdateAction::Targets {
                current,
                installed,
                steps,
            } => update_targets(format, current, &installed, &steps),
        },

        Subcommand::Completions { shell } => {
            let mut command = Options::command();
            let bin_name = env!("CARGO_CRATE_NAME");
            let mut stdout = std::io::stdout();
            clap_complete::generate(shell, &mut command, bin_name, &mut stdout);
            Ok(())
        }
    }
}

#[instrument(skip(format, modpacks))]
fn export_modpacks(
    format: OutputFormat,
    root: &Path,
    output: &Path,
    default_mode: ExportMode,
    include_settings: bool,
    yes: bool,
    modpacks: &[String],
) -> Result<(), Report> {
    let repository = LocalRepository::open(root)?;
    let collection = &repository.collection;
    let selection = modpacks
        .iter()
        .map(|name| {
            collection.find_modpack(name).ok_or_else(|| {
                eyre!("There is no modpack named {name:?}")
                    .with_suggestion(|| "Modpack names are case sensitive, see modpacks.yml.")
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !yes && output.exists() {
        let confirmed = inquire::Confirm::new(&format!(
            "{} already exists, are you sure you wish to overwrite it?",
            output.display()
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false);

        if !confirmed {
            return Ok(());
        }
    }

    let staging_directory = staging_directory_for(output);
    if staging_directory.exists() {
        return Err(eyre!("Staging directory {staging_directory:?} already exists")
            .with_suggestion(|| "It is left over from an interrupted export, remove it and try again."));
    }

    let options = ExportOptions::builder()
        .default_mode(default_mode)
        .include_settings(include_settings)
        .staging_directory(staging_directory.clone())
        .build();

    let packaged = facpack_export::export(collection, &selection, &options).and_then(|outcome| {
        facpack_export::package(&outcome.template, &outcome.staged, output)?;
        Ok(outcome.template)
    });
    if staging_directory.exists() {
        fs::remove_dir_all(&staging_directory)
            .wrap_err_with(|| format!("Failed to remove {staging_directory:?}"))?;
    }
    let template = packaged?;

    match format {
        OutputFormat::Human => println!(
            "Exported {} mods and {} modpacks to {}",
            template.mods.len().bold(),
            template.modpacks.len().bold(),
            output.display().green()
        ),
        _ => emit(format, &template)?,
    }
    Ok(())
}

#[instrument(skip(format))]
fn import_package(format: OutputFormat, root: &Path, file: &Path, save: bool) -> Result<(), Report> {
    let repository = LocalRepository::open(root)?;
    let template = facpack_export::read_template(file)?;
    facpack_export::validate(&template)?;

    let extracted = if facpack_export::is_package(file)? {
        facpack_export::extract_included(file, &repository.mods_directory())?
    } else {
        vec![]
    };

    let imported = reopen_and_import(root, repository, &template, &extracted, save);
    let (repository, report) = match imported {
        Ok(imported) => imported,
        Err(error) => {
            facpack_export::remove_extracted(&extracted);
            return Err(error);
        }
    };

    let created = report
        .modpacks
        .iter()
        .filter_map(|id| repository.collection.modpack(*id))
        .map(|modpack| modpack.name.as_str())
        .collect_vec();

    match format {
        OutputFormat::Human => {
            for path in &extracted {
                println!("Extracted {}", path.display().cyan());
            }
            for name in &created {
                println!("Created modpack {}", name.bold().green());
            }
            for missing in &report.unresolved {
                println!("{} {}", "Missing".red().bold(), describe_unresolved(missing));
            }
            if !save && !created.is_empty() {
                eprintln!("Pass --save to keep the imported modpacks.");
            }
        }
        _ => emit(
            format,
            &ImportSummary {
                extracted,
                modpacks: created,
                unresolved: &report.unresolved,
            },
        )?,
    }
    Ok(())
}

/// Imports `template` into the library, rescanning it first if mods were
/// extracted into it.
fn reopen_and_import(
    root: &Path,
    mut repository: LocalRepository,
    template: &ExportTemplate,
    extracted: &[PathBuf],
    save: bool,
) -> Result<(LocalRepository, ImportReport), Report> {
    if !extracted.is_empty() {
        info!(extracted = extracted.len(), "Rescanning the library for extracted mods");
        repository = LocalRepository::open(root)?;
    }

    let report = facpack_export::import(template, &mut repository.collection)?;
    if save {
        repository.save_modpacks()?;
    }
    Ok((repository, report))
}

#[instrument(skip(format, installed))]
fn update_targets(
    format: OutputFormat,
    current: AccurateVersion,
    installed: &[AccurateVersion],
    steps: &Path,
) -> Result<(), Report> {
    let json = fs::read_to_string(steps).wrap_err_with(|| format!("Failed to read {steps:?}"))?;
    let steps: Vec<UpdateStep> = serde_json::from_str(&json)
        .wrap_err("Failed to parse the list of update steps")
        .with_suggestion(|| r#"Steps are a JSON array of { "from", "to", "is_stable" } objects."#)?;

    let resolution = UpdateGraph::new(steps).update_targets(current, installed);
    let unreachable = resolution.unreachable.iter().map(ToString::to_string).collect_vec();

    match format {
        OutputFormat::Human => {
            if resolution.targets.is_empty() {
                println!("{current} is up to date.");
            }
            for target in &resolution.targets {
                println!("{}", target.bold());
                for step in &target.steps {
                    println!("  {step}");
                }
            }
            for error in &unreachable {
                eprintln!("{} {error}", "Unreachable:".yellow());
            }
        }
        _ => emit(
            format,
            &UpdateSummary {
                targets: &resolution.targets,
                unreachable,
            },
        )?,
    }
    Ok(())
}

#[derive(Serialize, Debug)]
struct DecodedSettings {
    version: AccurateVersion,
    settings: serde_json::Value,
}

#[derive(Serialize, Debug)]
struct ImportSummary<'a> {
    extracted: Vec<PathBuf>,
    modpacks: Vec<&'a str>,
    unresolved: &'a [UnresolvedMod],
}

#[derive(Serialize, Debug)]
struct UpdateSummary<'a> {
    targets: &'a [UpdateTarget],
    unreachable: Vec<String>,
}

/// Prints `value` in one of the machine-readable formats.
fn emit<T: Serialize>(format: OutputFormat, value: &T) -> Result<(), Report> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(value)?),
        OutputFormat::Json | OutputFormat::Human => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

fn describe_unresolved(missing: &UnresolvedMod) -> String {
    let mode = missing.export_mode;
    let pinned = mode.policy == VersionPolicy::SpecificVersion || mode.included;
    match missing.version {
        Some(version) if pinned && mode.download_newer => {
            format!("{} {version} or newer", missing.name)
        }
        Some(version) if pinned => format!("{} {version}", missing.name),
        _ if mode.policy == VersionPolicy::FactorioVersion => {
            format!("{} (newest for its game version)", missing.name)
        }
        _ => format!("{} (any version)", missing.name),
    }
}

/// Included mods are staged next to the package they end up in.
fn staging_directory_for(output: &Path) -> PathBuf {
    let file_name = output
        .file_name()
        .map_or_else(|| "package".into(), |name| name.to_string_lossy());
    output.with_file_name(format!(".{file_name}.staging"))
}

/// Reads a whole file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> Result<String, Report> {
    let mut text = String::new();
    if path == Path::new("-") {
        io::stdin().read_to_string(&mut text)?;
    } else {
        text = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {path:?}"))?;
    }
    Ok(text)
}

fn install_tracing() -> Result<(), Report> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    let format_layer = fmt::layer().pretty().without_time().with_writer(io::stderr);
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}
