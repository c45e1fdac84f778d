use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;

use bon::Builder;
use facpack_mod::{Mod, ModCollection, ModId, ModpackId};
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::mode::{ExportMode, VersionPolicy};
use crate::staging::{StagingJob, stage_all};
use crate::template::{ExportTemplate, ModExportTemplate, ModpackExportTemplate};
use crate::{ExportError, Uid, UidAllocator};

/// What to export and how.
#[derive(Builder, Clone, Default, Debug)]
#[must_use]
pub struct ExportOptions {
    /// Mode of every mod missing from [`Self::mod_modes`].
    #[builder(default)]
    pub default_mode: ExportMode,
    #[builder(default)]
    pub mod_modes: HashMap<ModId, ExportMode>,
    /// Whether modpack settings are written into the templates.
    #[builder(default)]
    pub include_settings: bool,
    /// Where the files of included mods are copied to. Required if any mod
    /// is included.
    pub staging_directory: Option<PathBuf>,
}

impl ExportOptions {
    #[must_use]
    pub fn mode_of(&self, id: ModId) -> ExportMode {
        self.mod_modes.get(&id).copied().unwrap_or(self.default_mode)
    }
}

/// The result of a successful [`export`].
#[derive(Clone, PartialEq, Debug)]
pub struct ExportOutcome {
    pub template: ExportTemplate,
    /// Every file or directory copied into the staging directory.
    pub staged: Vec<PathBuf>,
}

/// Builds the export template for `selection` and everything nested in it.
///
/// The output is deterministic: exporting the same modpacks with the same
/// options always yields the same Uids.
///
/// # Errors
///
/// Fails with [`ExportError::CyclicDependency`] if the modpacks contain each
/// other, [`ExportError::UnknownModpack`] or [`ExportError::UnknownMod`] for
/// dangling ids, and any staging error (see [`stage_all`]). Nothing is left
/// in the staging directory on failure.
#[instrument(skip_all, fields(selected = selection.len()))]
pub fn export(
    collection: &ModCollection,
    selection: &[ModpackId],
    options: &ExportOptions,
) -> Result<ExportOutcome, ExportError> {
    let modpacks = collect_modpacks(collection, selection)?;
    let order = dependency_order(collection, modpacks)?;

    let mut session = Session::new(collection, options);
    for id in order {
        session.emit_modpack(id)?;
    }

    let staged = stage_all(&session.jobs)?;
    debug!(
        mods = session.template.mods.len(),
        modpacks = session.template.modpacks.len(),
        staged = staged.len(),
        "Export finished"
    );

    Ok(ExportOutcome {
        template: session.template,
        staged,
    })
}

/// Every modpack reachable from `selection`, in discovery order.
fn collect_modpacks(
    collection: &ModCollection,
    selection: &[ModpackId],
) -> Result<Vec<ModpackId>, ExportError> {
    let mut found = vec![];
    let mut queue = selection.iter().copied().collect::<VecDeque<_>>();
    while let Some(id) = queue.pop_front() {
        if found.contains(&id) {
            continue;
        }

        let modpack = collection
            .modpack(id)
            .ok_or(ExportError::UnknownModpack(id))?;
        found.push(id);
        queue.extend(modpack.modpack_ids());
    }

    Ok(found)
}

/// Orders `modpacks` so that every modpack comes after the ones it contains.
///
/// Each pass moves every modpack whose children are all placed; a pass that
/// places nothing means the rest contain each other.
fn dependency_order(
    collection: &ModCollection,
    mut remaining: Vec<ModpackId>,
) -> Result<Vec<ModpackId>, ExportError> {
    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|&id| {
            let ready = collection
                .modpack(id)
                .is_some_and(|modpack| modpack.modpack_ids().all(|child| order.contains(&child)));
            if ready {
                order.push(id);
            }
            !ready
        });

        if remaining.len() == before {
            let modpacks = remaining
                .iter()
                .filter_map(|&id| collection.modpack(id))
                .map(|modpack| modpack.name.clone())
                .collect();
            return Err(ExportError::CyclicDependency { modpacks });
        }
    }

    Ok(order)
}

/// Decides whether two mods can share one template.
///
/// Mods with the same version must agree on every export flag. Mods with
/// different versions only match if both leave the release open (newest, or
/// newest for the same game version) and neither pins its own file.
fn is_same_export(first: &Mod, first_mode: ExportMode, second: &Mod, second_mode: ExportMode) -> bool {
    if first.name != second.name {
        return false;
    }

    if first.version == second.version {
        return first_mode == second_mode;
    }

    let open_release = match (first_mode.policy, second_mode.policy) {
        (VersionPolicy::NewestVersion, VersionPolicy::NewestVersion) => true,
        (VersionPolicy::FactorioVersion, VersionPolicy::FactorioVersion) => {
            first.factorio_version == second.factorio_version
        }
        _ => false,
    };

    open_release && first_mode.allows_other_release() && second_mode.allows_other_release()
}

/// An emitted mod template, with the live mod it was created from.
struct EmittedMod {
    source: ModId,
    mode: ExportMode,
    uid: Uid,
}

struct Session<'a> {
    collection: &'a ModCollection,
    options: &'a ExportOptions,
    uids: UidAllocator,
    template: ExportTemplate,
    emitted_mods: Vec<EmittedMod>,
    /// Every live mod that was resolved so far, including deduplicated ones.
    resolved_mods: HashMap<ModId, Uid>,
    emitted_modpacks: HashMap<ModpackId, Uid>,
    jobs: Vec<StagingJob>,
}

impl<'a> Session<'a> {
    fn new(collection: &'a ModCollection, options: &'a ExportOptions) -> Self {
        Self {
            collection,
            options,
            uids: UidAllocator::new(),
            template: ExportTemplate::default(),
            emitted_mods: vec![],
            resolved_mods: HashMap::new(),
            emitted_modpacks: HashMap::new(),
            jobs: vec![],
        }
    }

    fn emit_modpack(&mut self, id: ModpackId) -> Result<(), ExportError> {
        let collection = self.collection;
        let modpack = collection
            .modpack(id)
            .ok_or(ExportError::UnknownModpack(id))?;

        let mod_ids = modpack
            .mod_ids()
            .map(|mod_id| self.mod_uid(mod_id))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unique()
            .collect();
        let modpack_ids = modpack
            .modpack_ids()
            .map(|child| {
                self.emitted_modpacks.get(&child).copied().ok_or_else(|| {
                    ExportError::CorruptExportData(format!(
                        "{child} is nested in {:?} but was not exported before it",
                        modpack.name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uid = self.uids.next_modpack_uid();
        debug!(name = %modpack.name, uid, "Emitting modpack");
        self.emitted_modpacks.insert(id, uid);
        self.template.modpacks.push(ModpackExportTemplate {
            uid,
            name: modpack.name.clone(),
            mod_ids,
            modpack_ids,
            mod_settings: modpack
                .settings
                .clone()
                .filter(|_| self.options.include_settings),
        });

        Ok(())
    }

    /// Resolves a live mod to the Uid of its template, creating the template
    /// if no existing one matches.
    fn mod_uid(&mut self, id: ModId) -> Result<Uid, ExportError> {
        if let Some(&uid) = self.resolved_mods.get(&id) {
            return Ok(uid);
        }

        let collection = self.collection;
        let installed = collection.get_mod(id).ok_or(ExportError::UnknownMod(id))?;
        let mode = self.options.mode_of(id);

        let existing = self.emitted_mods.iter().find(|emitted| {
            collection
                .get_mod(emitted.source)
                .is_some_and(|other| is_same_export(installed, mode, other, emitted.mode))
        });
        if let Some(existing) = existing {
            debug!(%installed, uid = existing.uid, "Reusing mod template");
            let uid = existing.uid;
            self.resolved_mods.insert(id, uid);
            return Ok(uid);
        }

        let uid = self.uids.next_mod_uid();
        debug!(%installed, uid, "Emitting mod template");
        if mode.included {
            self.schedule_staging(installed, uid)?;
        }

        self.template.mods.push(ModExportTemplate {
            uid,
            name: installed.name.clone(),
            export_mode: mode,
            version: (mode.policy == VersionPolicy::SpecificVersion || mode.included)
                .then_some(installed.version),
            factorio_version: (mode.policy == VersionPolicy::FactorioVersion)
                .then_some(installed.factorio_version),
        });
        self.emitted_mods.push(EmittedMod {
            source: id,
            mode,
            uid,
        });
        self.resolved_mods.insert(id, uid);
        Ok(uid)
    }

    fn schedule_staging(&mut self, installed: &Mod, uid: Uid) -> Result<(), ExportError> {
        let missing = |reason: &str| ExportError::Staging {
            path: installed.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
        };

        let directory = self
            .options
            .staging_directory
            .as_ref()
            .ok_or_else(|| missing("no staging directory to include the mod into"))?;
        let file_name = installed
            .file_name()
            .ok_or_else(|| missing("the mod's path has no file name"))?;

        self.jobs.push(StagingJob {
            source: installed.path.clone(),
            target: directory.join(format!("{uid}+{}", file_name.to_string_lossy())),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    use color_eyre::Report;
    use facpack_mod::{
        AccurateVersion, GameVersion, Mod, ModCollection, ModId, ModName, Modpack, ModpackId,
        Reference,
    };
    use rstest::{fixture, rstest};
    use tempdir::TempDir;

    use super::{ExportOptions, export, is_same_export};
    use crate::ExportError;
    use crate::mode::{ExportMode, VersionPolicy};

    fn installed(name: &str, version: &str) -> Mod {
        let version: AccurateVersion = version.parse().unwrap();
        Mod {
            name: ModName::from(name.to_string()),
            version,
            factorio_version: version.family(),
            path: PathBuf::from(format!("mods/{name}_{version}.zip")),
        }
    }

    fn modpack(name: &str, references: Vec<Reference>) -> Modpack {
        let mut modpack = Modpack::new(name);
        modpack.references = references;
        modpack
    }

    struct Library {
        collection: ModCollection,
        flib: ModId,
        rso: ModId,
        libraries: ModpackId,
        run: ModpackId,
    }

    /// `Run` contains `rso-mod`, `flib` and the `Libraries` modpack, which
    /// contains `flib` again. `Run` is added first.
    #[fixture]
    fn library() -> Library {
        let mut collection = ModCollection::new();
        let flib = collection.add_mod(installed("flib", "0.12.9"));
        let rso = collection.add_mod(installed("rso-mod", "6.2.23"));

        let run = collection.add_modpack(Modpack::new("Run"));
        let libraries = collection.add_modpack(modpack("Libraries", vec![Reference::Mod(flib)]));
        if let Some(run) = collection.modpack_mut(run) {
            run.references = vec![
                Reference::Mod(rso),
                Reference::Modpack(libraries),
                Reference::Mod(flib),
            ];
        }

        Library {
            collection,
            flib,
            rso,
            libraries,
            run,
        }
    }

    #[rstest]
    fn nested_modpacks_come_first(library: Library) -> Result<(), Report> {
        let outcome = export(&library.collection, &[library.run], &ExportOptions::default())?;
        let template = outcome.template;

        let names = template
            .modpacks
            .iter()
            .map(|modpack| modpack.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Libraries", "Run"]);

        for (index, modpack) in template.modpacks.iter().enumerate() {
            for child in &modpack.modpack_ids {
                let position = template
                    .modpacks
                    .iter()
                    .position(|other| other.uid == *child)
                    .unwrap();
                assert!(position < index);
            }
        }

        // `flib` is shared by both modpacks but exported once.
        assert_eq!(template.mods.len(), 2);
        assert_eq!(template.modpacks[0].mod_ids, [0]);
        assert_eq!(template.modpacks[1].mod_ids, [1, 0]);
        assert_eq!(template.modpacks[1].modpack_ids, [0]);
        assert!(outcome.staged.is_empty());
        Ok(())
    }

    #[rstest]
    fn uids_are_deterministic(library: Library) -> Result<(), Report> {
        let options = ExportOptions::default();
        let first = export(&library.collection, &[library.run, library.libraries], &options)?;
        let second = export(&library.collection, &[library.run, library.libraries], &options)?;
        assert_eq!(first.template, second.template);

        let uids = |template: &crate::ExportTemplate| {
            template
                .mods
                .iter()
                .map(|template| template.uid)
                .chain(template.modpacks.iter().map(|template| template.uid))
                .collect::<Vec<_>>()
        };
        assert_eq!(uids(&first.template), [0, 1, 0, 1]);
        assert_eq!(uids(&first.template), uids(&second.template));
        Ok(())
    }

    #[rstest]
    fn template_fields_follow_the_mode(library: Library) -> Result<(), Report> {
        let options = ExportOptions::builder()
            .mod_modes(HashMap::from([
                (library.flib, ExportMode::new(VersionPolicy::SpecificVersion)),
                (library.rso, ExportMode::new(VersionPolicy::FactorioVersion)),
            ]))
            .build();
        let template = export(&library.collection, &[library.run], &options)?.template;

        let flib = template.find_mod(0).unwrap();
        assert_eq!(flib.name, ModName::from("flib".to_string()));
        assert_eq!(flib.version, Some(AccurateVersion::new(0, 12, 9, 0)));
        assert_eq!(flib.factorio_version, None);

        let rso = template.find_mod(1).unwrap();
        assert_eq!(rso.version, None);
        assert_eq!(rso.factorio_version, Some(GameVersion::new(6, 2)));
        Ok(())
    }

    #[test]
    fn settings_are_only_carried_on_request() -> Result<(), Report> {
        let mut collection = ModCollection::new();
        let mut with_settings = Modpack::new("Tuned");
        with_settings.settings = Some("{\"startup\":{}}".into());
        let id = collection.add_modpack(with_settings);

        let without = export(&collection, &[id], &ExportOptions::default())?;
        assert_eq!(without.template.modpacks[0].mod_settings, None);

        let options = ExportOptions::builder().include_settings(true).build();
        let with = export(&collection, &[id], &options)?;
        assert_eq!(
            with.template.modpacks[0].mod_settings.as_deref(),
            Some("{\"startup\":{}}")
        );
        Ok(())
    }

    #[test]
    fn cycles_are_reported() {
        let mut collection = ModCollection::new();
        let first = collection.add_modpack(Modpack::new("First"));
        let second = collection.add_modpack(modpack("Second", vec![Reference::Modpack(first)]));
        let lonely = collection.add_modpack(Modpack::new("Lonely"));
        if let Some(first) = collection.modpack_mut(first) {
            first.references.push(Reference::Modpack(second));
        }

        let error = export(&collection, &[lonely, first], &ExportOptions::default()).unwrap_err();
        let ExportError::CyclicDependency { modpacks } = &error else {
            panic!("expected a cycle, got {error:?}");
        };
        assert_eq!(modpacks, &["First", "Second"]);
    }

    #[test]
    fn unknown_modpacks_are_reported() {
        let collection = ModCollection::new();
        assert!(matches!(
            export(&collection, &[ModpackId(3)], &ExportOptions::default()),
            Err(ExportError::UnknownModpack(ModpackId(3)))
        ));
    }

    #[rstest]
    #[case::same_version_same_mode("1.0.0", 0, "1.0.0", 0, true)]
    #[case::same_version_other_flags("1.0.0", 0, "1.0.0", 0b1000, false)]
    #[case::newest_both("1.0.0", 0, "1.1.0", 0, true)]
    #[case::newest_but_included("1.0.0", 0b0100, "1.1.0", 0, false)]
    #[case::newest_included_download_newer("1.0.0", 0b1100, "1.1.0", 0, true)]
    #[case::specific_versions("1.0.0", 1, "1.1.0", 1, false)]
    #[case::factorio_same_game("1.1.0", 2, "1.1.5", 2, true)]
    #[case::factorio_other_game("1.1.0", 2, "2.0.0", 2, false)]
    #[case::mixed_policies("1.0.0", 0, "1.1.0", 2, false)]
    fn deduplication(
        #[case] first_version: &str,
        #[case] first_bits: u32,
        #[case] second_version: &str,
        #[case] second_bits: u32,
        #[case] expected: bool,
    ) {
        let first = installed("flib", first_version);
        let second = installed("flib", second_version);
        let first_mode = ExportMode::from_bits(first_bits).unwrap();
        let second_mode = ExportMode::from_bits(second_bits).unwrap();
        assert_eq!(is_same_export(&first, first_mode, &second, second_mode), expected);
        assert_eq!(is_same_export(&second, second_mode, &first, first_mode), expected);
    }

    #[test]
    fn different_names_never_match() {
        let mode = ExportMode::default();
        assert!(!is_same_export(
            &installed("flib", "1.0.0"),
            mode,
            &installed("rso-mod", "1.0.0"),
            mode
        ));
    }

    #[test]
    fn included_mods_are_staged() -> Result<(), Report> {
        let library = TempDir::new("facpack-library")?;
        let staging = TempDir::new("facpack-staging")?;

        let mut flib = installed("flib", "0.12.9");
        flib.path = library.path().join("flib_0.12.9.zip");
        fs::write(&flib.path, b"zip bytes")?;

        let mut collection = ModCollection::new();
        let flib = collection.add_mod(flib);
        let id = collection.add_modpack(modpack("Libraries", vec![Reference::Mod(flib)]));

        let options = ExportOptions::builder()
            .default_mode(ExportMode::default().included(true))
            .staging_directory(staging.path().to_path_buf())
            .build();
        let outcome = export(&collection, &[id], &options)?;

        assert_eq!(outcome.staged, [staging.path().join("0+flib_0.12.9.zip")]);
        assert_eq!(
            outcome.template.mods[0].version,
            Some(AccurateVersion::new(0, 12, 9, 0))
        );
        Ok(())
    }

    #[test]
    fn failed_staging_leaves_nothing_behind() -> Result<(), Report> {
        let library = TempDir::new("facpack-library")?;
        let staging = TempDir::new("facpack-staging")?;

        let mut present = installed("flib", "0.12.9");
        present.path = library.path().join("flib_0.12.9.zip");
        fs::write(&present.path, b"zip bytes")?;
        let mut missing = installed("rso-mod", "6.2.23");
        missing.path = library.path().join("rso-mod_6.2.23.zip");

        let mut collection = ModCollection::new();
        let present = collection.add_mod(present);
        let missing = collection.add_mod(missing);
        let id = collection.add_modpack(modpack(
            "Run",
            vec![Reference::Mod(present), Reference::Mod(missing)],
        ));

        let options = ExportOptions::builder()
            .default_mode(ExportMode::default().included(true))
            .staging_directory(staging.path().to_path_buf())
            .build();
        assert!(export(&collection, &[id], &options).is_err());
        assert_eq!(fs::read_dir(staging.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn including_without_staging_directory_fails() {
        let mut collection = ModCollection::new();
        let flib = collection.add_mod(installed("flib", "0.12.9"));
        let id = collection.add_modpack(modpack("Libraries", vec![Reference::Mod(flib)]));

        let options = ExportOptions::builder()
            .default_mode(ExportMode::default().included(true))
            .build();
        assert!(matches!(
            export(&collection, &[id], &options),
            Err(ExportError::Staging { .. })
        ));
    }
}
