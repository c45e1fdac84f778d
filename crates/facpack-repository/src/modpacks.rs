use std::collections::HashMap;

use facpack_mod::{AccurateVersion, ModCollection, ModLibrary, ModName, Modpack, Reference};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::persist::PersistedEntity;

/// Every modpack of a library, as stored in `modpacks.yml`.
///
/// Mods are referenced by name and version, nested modpacks by name.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default, Debug)]
pub struct ModpackDefinitions {
    #[serde(default)]
    pub modpacks: Vec<ModpackDefinition>,
}

impl PersistedEntity for ModpackDefinitions {
    const FILE_PATH: &'static str = "modpacks.yml";
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModpackDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mods: Vec<ModReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modpacks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModReference {
    pub name: ModName,
    pub version: AccurateVersion,
}

impl ModpackDefinitions {
    pub fn from_collection(collection: &ModCollection) -> Self {
        let modpacks = collection
            .modpacks()
            .map(|(_, modpack)| ModpackDefinition {
                name: modpack.name.clone(),
                mods: modpack
                    .mod_ids()
                    .filter_map(|id| collection.get_mod(id))
                    .map(|installed| ModReference {
                        name: installed.name.clone(),
                        version: installed.version,
                    })
                    .collect(),
                modpacks: modpack
                    .modpack_ids()
                    .filter_map(|id| collection.modpack(id))
                    .map(|nested| nested.name.clone())
                    .collect(),
                settings: modpack.settings.clone(),
            })
            .collect();

        Self { modpacks }
    }

    /// Adds every defined modpack to `collection`, which must already hold
    /// the installed mods. References to mods or modpacks that don't exist
    /// are dropped.
    pub fn apply(&self, collection: &mut ModCollection) {
        let mut ids = HashMap::new();
        for definition in &self.modpacks {
            let mut modpack = Modpack::new(definition.name.clone());
            modpack.settings.clone_from(&definition.settings);
            ids.insert(definition.name.as_str(), collection.add_modpack(modpack));
        }

        for definition in &self.modpacks {
            let mut references = vec![];
            for reference in &definition.mods {
                match collection.find_exact(&reference.name, reference.version) {
                    Some(id) => references.push(Reference::Mod(id)),
                    None => warn!(
                        modpack = %definition.name,
                        name = %reference.name,
                        version = %reference.version,
                        "Dropping a reference to a mod that is not installed"
                    ),
                }
            }
            for name in &definition.modpacks {
                match ids.get(name.as_str()) {
                    Some(&id) => references.push(Reference::Modpack(id)),
                    None => warn!(
                        modpack = %definition.name,
                        nested = %name,
                        "Dropping a reference to an unknown modpack"
                    ),
                }
            }

            if let Some(modpack) = ids
                .get(definition.name.as_str())
                .and_then(|&id| collection.modpack_mut(id))
            {
                modpack.references = references;
            }
        }
    }
}
