use crate::{AccurateVersion, GameVersion, Mod, ModCollection, ModId, ModName};

/// Lookup interface over a set of installed mods.
///
/// Only [`Self::mods_named`] must be provided, the other lookups are derived
/// from it.
pub trait ModLibrary {
    /// Every installed release of the mod called `name`.
    fn mods_named(&self, name: &ModName) -> Vec<(ModId, &Mod)>;

    /// The release of `name` with exactly this `version`.
    fn find_exact(&self, name: &ModName, version: AccurateVersion) -> Option<ModId> {
        self.mods_named(name)
            .into_iter()
            .find(|(_, installed)| installed.version == version)
            .map(|(id, _)| id)
    }

    /// The newest installed release of `name`.
    fn find_newest(&self, name: &ModName) -> Option<ModId> {
        self.mods_named(name)
            .into_iter()
            .max_by_key(|(_, installed)| installed.version)
            .map(|(id, _)| id)
    }

    /// The newest installed release of `name` that targets `game_version`.
    fn find_newest_for(&self, name: &ModName, game_version: GameVersion) -> Option<ModId> {
        self.mods_named(name)
            .into_iter()
            .filter(|(_, installed)| installed.factorio_version == game_version)
            .max_by_key(|(_, installed)| installed.version)
            .map(|(id, _)| id)
    }
}

impl ModLibrary for ModCollection {
    fn mods_named(&self, name: &ModName) -> Vec<(ModId, &Mod)> {
        self.mods()
            .filter(|(_, installed)| &installed.name == name)
            .collect()
    }
}
