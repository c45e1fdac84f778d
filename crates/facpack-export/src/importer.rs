use std::collections::{HashMap, HashSet};

use facpack_mod::{
    AccurateVersion, ModCollection, ModId, ModLibrary, ModName, Modpack, ModpackId, Reference,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::mode::{ExportMode, VersionPolicy};
use crate::template::{ExportTemplate, ModExportTemplate};
use crate::{ImportError, Uid};

/// A mod template that no installed mod satisfies.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
pub struct UnresolvedMod {
    pub uid: Uid,
    pub name: ModName,
    pub version: Option<AccurateVersion>,
    pub export_mode: ExportMode,
}

/// What [`import`] did.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
#[must_use]
pub struct ImportReport {
    /// The created modpacks, in template order.
    pub modpacks: Vec<ModpackId>,
    /// Mods that were left out of the created modpacks, one per template.
    pub unresolved: Vec<UnresolvedMod>,
}

/// Finds the installed mod that best satisfies `template`.
///
/// Pinned templates (a specific version, or a shipped file) want exactly
/// their version, falling back to the newest release only if they allow a
/// newer download.
pub fn resolve_mod(library: &impl ModLibrary, template: &ModExportTemplate) -> Option<ModId> {
    let mode = template.export_mode;
    let name = &template.name;
    let exact = || template.version.and_then(|version| library.find_exact(name, version));

    if mode.policy == VersionPolicy::SpecificVersion || mode.included {
        return exact().or_else(|| {
            mode.download_newer
                .then(|| library.find_newest(name))
                .flatten()
        });
    }

    match mode.policy {
        VersionPolicy::FactorioVersion => template
            .factorio_version
            .and_then(|game_version| library.find_newest_for(name, game_version)),
        VersionPolicy::NewestVersion | VersionPolicy::SpecificVersion => library.find_newest(name),
    }
}

/// Checks that `template` can be imported, without looking at any library.
///
/// # Errors
///
/// Returns [`ImportError::CorruptExportData`] if two mod templates or two
/// modpack templates share a Uid, or if a modpack references a mod template
/// that does not exist or a modpack that does not come before it.
pub fn validate(template: &ExportTemplate) -> Result<(), ImportError> {
    let mut mod_uids = HashSet::new();
    for mod_template in &template.mods {
        if !mod_uids.insert(mod_template.uid) {
            return Err(ImportError::CorruptExportData(format!(
                "mod {} reuses Uid {}",
                mod_template.name, mod_template.uid
            )));
        }
    }

    let mut modpack_uids = HashSet::new();
    for modpack in &template.modpacks {
        if !modpack_uids.insert(modpack.uid) {
            return Err(ImportError::CorruptExportData(format!(
                "modpack {:?} reuses Uid {}",
                modpack.name, modpack.uid
            )));
        }
    }

    let unresolved: HashMap<Uid, Option<ModId>> = mod_uids.into_iter().map(|uid| (uid, None)).collect();
    plan_modpacks(template, &unresolved)?;
    Ok(())
}

/// Recreates the modpacks of `template` inside `collection`.
///
/// The template is [validated](validate) before anything is added, so a
/// corrupt template leaves `collection` untouched. Modpacks whose name is
/// taken get a numeric suffix.
///
/// # Errors
///
/// See [`validate`].
#[instrument(skip_all, fields(mods = template.mods.len(), modpacks = template.modpacks.len()))]
pub fn import(
    template: &ExportTemplate,
    collection: &mut ModCollection,
) -> Result<ImportReport, ImportError> {
    validate(template)?;
    let mut report = ImportReport::default();

    let mut resolved: HashMap<Uid, Option<ModId>> = HashMap::new();
    for mod_template in &template.mods {
        let id = resolve_mod(&*collection, mod_template);
        match id {
            Some(id) => debug!(name = %mod_template.name, %id, "Resolved mod"),
            None => {
                warn!(name = %mod_template.name, uid = mod_template.uid, "No installed mod matches");
                report.unresolved.push(UnresolvedMod {
                    uid: mod_template.uid,
                    name: mod_template.name.clone(),
                    version: mod_template.version,
                    export_mode: mod_template.export_mode,
                });
            }
        }
        resolved.insert(mod_template.uid, id);
    }

    let plans = plan_modpacks(template, &resolved)?;

    for (modpack_template, plan) in template.modpacks.iter().zip(plans) {
        let references = plan
            .into_iter()
            .map(|planned| match planned {
                Planned::Mod(id) => Reference::Mod(id),
                Planned::Modpack(index) => Reference::Modpack(report.modpacks[index]),
            })
            .collect();

        let mut modpack = Modpack::new(collection.unique_modpack_name(&modpack_template.name));
        modpack.references = references;
        modpack.settings.clone_from(&modpack_template.mod_settings);
        debug!(name = %modpack.name, "Adding modpack");
        report.modpacks.push(collection.add_modpack(modpack));
    }

    Ok(report)
}

/// A reference of a modpack about to be created.
enum Planned {
    Mod(ModId),
    /// Index into the template's modpacks.
    Modpack(usize),
}

/// Checks every reference of every modpack template and turns them into
/// [`Planned`] references. Unresolved mods are left out.
fn plan_modpacks(
    template: &ExportTemplate,
    resolved: &HashMap<Uid, Option<ModId>>,
) -> Result<Vec<Vec<Planned>>, ImportError> {
    let mut plans = Vec::with_capacity(template.modpacks.len());
    for (index, modpack) in template.modpacks.iter().enumerate() {
        let mut plan = vec![];
        for uid in &modpack.mod_ids {
            let id = resolved.get(uid).ok_or_else(|| {
                ImportError::CorruptExportData(format!(
                    "modpack {:?} references unknown mod {uid}",
                    modpack.name
                ))
            })?;
            plan.extend(id.map(Planned::Mod));
        }

        for uid in &modpack.modpack_ids {
            let position = template.modpacks[..index]
                .iter()
                .position(|earlier| earlier.uid == *uid)
                .ok_or_else(|| {
                    ImportError::CorruptExportData(format!(
                        "modpack {:?} references modpack {uid}, which does not come before it",
                        modpack.name
                    ))
                })?;
            plan.push(Planned::Modpack(position));
        }

        plans.push(plan);
    }

    Ok(plans)
}
