//! This crate is a part of **facpack**.
//!
//! ## What's in here?
//!
//! The live, in-memory side of a mod library: installed [`Mod`]s, user-made
//! [`Modpack`]s and the [`Reference`]s between them, all owned by a
//! [`ModCollection`] arena and addressed by [`ModId`] / [`ModpackId`].
//!
//! This crate does not persist or export anything by itself, it only provides
//! types to be used by other parts of **facpack**.

use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;

use nutype::nutype;
use serde::{Deserialize, Serialize};

mod library;
pub mod version;
pub use library::*;
pub use version::{AccurateVersion, GameVersion};

/// The internal name of a [`Mod`], as found in its `info.json`.
#[nutype(
    sanitize(trim),
    derive(
        From,
        Into,
        Serialize,
        Deserialize,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Clone,
        Debug,
    )
)]
pub struct ModName(String);

/// An **installed mod** - one release of a mod that lives in the library.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[must_use]
pub struct Mod {
    pub name: ModName,
    pub version: AccurateVersion,
    /// The game release this mod was made for.
    pub factorio_version: GameVersion,
    /// Path to the mod's zip archive or unpacked directory.
    pub path: PathBuf,
}

impl Mod {
    /// Returns the file (or directory) name of this mod on disk, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

impl fmt::Display for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A user-defined group of mods and other modpacks.
#[derive(Clone, PartialEq, Eq, Debug)]
#[must_use]
pub struct Modpack {
    pub name: String,
    /// Children of this modpack, in display order.
    pub references: Vec<Reference>,
    /// Opaque serialized mod settings attached to this modpack.
    pub settings: Option<String>,
}

impl Modpack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            references: vec![],
            settings: None,
        }
    }

    /// Iterates over the mods directly referenced by this modpack.
    pub fn mod_ids(&self) -> impl Iterator<Item = ModId> + '_ {
        self.references.iter().filter_map(|reference| match reference {
            Reference::Mod(id) => Some(*id),
            Reference::Modpack(_) => None,
        })
    }

    /// Iterates over the modpacks nested directly inside this modpack.
    pub fn modpack_ids(&self) -> impl Iterator<Item = ModpackId> + '_ {
        self.references.iter().filter_map(|reference| match reference {
            Reference::Modpack(id) => Some(*id),
            Reference::Mod(_) => None,
        })
    }
}

/// A child of a [`Modpack`]: either a mod or a nested modpack.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Reference {
    Mod(ModId),
    Modpack(ModpackId),
}

/// Index of a [`Mod`] inside a [`ModCollection`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ModId(pub usize);

/// Index of a [`Modpack`] inside a [`ModCollection`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ModpackId(pub usize);

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mod#{}", self.0)
    }
}

impl fmt::Display for ModpackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modpack#{}", self.0)
    }
}

/// The live object graph: every known [`Mod`] and [`Modpack`].
///
/// Ids are plain indices and stay valid for the lifetime of the collection,
/// since nothing is ever removed from it.
#[derive(Clone, Default, Debug)]
#[must_use]
pub struct ModCollection {
    mods: Vec<Mod>,
    modpacks: Vec<Modpack>,
}

impl ModCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mod(&mut self, installed_mod: Mod) -> ModId {
        self.mods.push(installed_mod);
        ModId(self.mods.len() - 1)
    }

    pub fn add_modpack(&mut self, modpack: Modpack) -> ModpackId {
        self.modpacks.push(modpack);
        ModpackId(self.modpacks.len() - 1)
    }

    #[must_use]
    pub fn get_mod(&self, id: ModId) -> Option<&Mod> {
        self.mods.get(id.0)
    }

    #[must_use]
    pub fn modpack(&self, id: ModpackId) -> Option<&Modpack> {
        self.modpacks.get(id.0)
    }

    #[must_use]
    pub fn modpack_mut(&mut self, id: ModpackId) -> Option<&mut Modpack> {
        self.modpacks.get_mut(id.0)
    }

    pub fn mods(&self) -> impl Iterator<Item = (ModId, &Mod)> {
        self.mods.iter().enumerate().map(|(index, m)| (ModId(index), m))
    }

    pub fn modpacks(&self) -> impl Iterator<Item = (ModpackId, &Modpack)> {
        self.modpacks
            .iter()
            .enumerate()
            .map(|(index, modpack)| (ModpackId(index), modpack))
    }

    #[must_use]
    pub fn find_modpack(&self, name: &str) -> Option<ModpackId> {
        self.modpacks()
            .find(|(_, modpack)| modpack.name == name)
            .map(|(id, _)| id)
    }

    /// Returns `name` if no modpack uses it yet, otherwise the first free
    /// `name (N)` starting from `N = 2`.
    #[must_use]
    pub fn unique_modpack_name(&self, name: &str) -> String {
        if self.find_modpack(name).is_none() {
            return name.to_string();
        }

        (2..)
            .map(|suffix| format!("{name} ({suffix})"))
            .find(|candidate| self.find_modpack(candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }
}
