//! The first export format, still found in the wild.
//!
//! It has no Uids: mods are identified by name and version, nested modpacks
//! by name, and modpacks come in any order.

use std::collections::HashMap;

use facpack_mod::{AccurateVersion, ModName};
use serde::{Deserialize, Serialize};

use crate::mode::{ExportMode, VersionPolicy};
use crate::template::{ExportTemplate, ModExportTemplate, ModpackExportTemplate};
use crate::{ImportError, Uid, UidAllocator};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyModTemplate {
    pub name: ModName,
    #[serde(default)]
    pub version: Option<AccurateVersion>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyModpackTemplate {
    pub name: String,
    #[serde(default)]
    pub mods: Vec<LegacyModTemplate>,
    /// Names of nested modpacks.
    #[serde(default)]
    pub modpacks: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyExportTemplate {
    /// Versions are only meaningful when this is not `false`.
    #[serde(default)]
    pub includes_version_info: Option<bool>,
    #[serde(default)]
    pub mods: Vec<LegacyModTemplate>,
    #[serde(default)]
    pub modpacks: Vec<LegacyModpackTemplate>,
}

impl LegacyExportTemplate {
    /// Converts this template into the current format.
    ///
    /// Mods that carry a version are pinned with
    /// [`VersionPolicy::SpecificVersion`], the rest follow the newest release.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::CorruptExportData`] if a modpack references an
    /// unknown modpack name, or if modpacks reference each other in a cycle.
    pub fn upgrade(self) -> Result<ExportTemplate, ImportError> {
        let mut uids = UidAllocator::new();
        let mut template = ExportTemplate::default();

        for legacy in &self.mods {
            self.mod_uid(&mut template, &mut uids, legacy);
        }

        let order = self.dependency_order()?;
        let mut modpack_uids: HashMap<&str, Uid> = HashMap::new();
        for index in order {
            let legacy = &self.modpacks[index];
            let mod_ids = legacy
                .mods
                .iter()
                .map(|legacy_mod| self.mod_uid(&mut template, &mut uids, legacy_mod))
                .collect();
            let modpack_ids = legacy
                .modpacks
                .iter()
                .filter_map(|name| modpack_uids.get(name.as_str()).copied())
                .collect();

            let uid = uids.next_modpack_uid();
            modpack_uids.insert(&legacy.name, uid);
            template.modpacks.push(ModpackExportTemplate {
                uid,
                name: legacy.name.clone(),
                mod_ids,
                modpack_ids,
                mod_settings: None,
            });
        }

        Ok(template)
    }

    /// Finds the template already emitted for `legacy`, or emits a new one.
    fn mod_uid(
        &self,
        template: &mut ExportTemplate,
        uids: &mut UidAllocator,
        legacy: &LegacyModTemplate,
    ) -> Uid {
        let version = legacy
            .version
            .filter(|_| self.includes_version_info != Some(false));
        if let Some(existing) = template
            .mods
            .iter()
            .find(|existing| existing.name == legacy.name && existing.version == version)
        {
            return existing.uid;
        }

        let policy = if version.is_some() {
            VersionPolicy::SpecificVersion
        } else {
            VersionPolicy::NewestVersion
        };
        let uid = uids.next_mod_uid();
        template.mods.push(ModExportTemplate {
            uid,
            name: legacy.name.clone(),
            export_mode: ExportMode::new(policy),
            version,
            factorio_version: None,
        });
        uid
    }

    /// Indices of [`Self::modpacks`], ordered so that every modpack comes
    /// after the modpacks it names.
    fn dependency_order(&self) -> Result<Vec<usize>, ImportError> {
        for modpack in &self.modpacks {
            if let Some(unknown) = modpack
                .modpacks
                .iter()
                .find(|name| !self.modpacks.iter().any(|other| &other.name == *name))
            {
                return Err(ImportError::CorruptExportData(format!(
                    "modpack {:?} references unknown modpack {unknown:?}",
                    modpack.name
                )));
            }
        }

        let mut order: Vec<usize> = Vec::with_capacity(self.modpacks.len());
        let mut remaining: Vec<usize> = (0..self.modpacks.len()).collect();
        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|&index| {
                let ready = self.modpacks[index].modpacks.iter().all(|name| {
                    order
                        .iter()
                        .any(|&placed| &self.modpacks[placed].name == name)
                });
                if ready {
                    order.push(index);
                }
                !ready
            });

            if remaining.len() == before {
                let names = remaining
                    .iter()
                    .map(|&index| self.modpacks[index].name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ImportError::CorruptExportData(format!(
                    "modpacks reference each other in a cycle: {names}"
                )));
            }
        }

        Ok(order)
    }
}
