//! This crate is a part of **facpack**.
//!
//! ## Settings files
//!
//! The game persists mod settings (`mod-settings.dat`) in a small tagged
//! binary format - a **property tree** of booleans, numbers, strings, lists and
//! dictionaries, preceded by the version of the game that wrote it. The
//! [`codec`] module reads and writes that format, [`PropertyTree`] is its
//! in-memory form, and [`ModSettings`] is the typed view mod managers actually
//! care about: which setting has which [`SettingValue`].

pub mod codec;
mod mod_settings;
mod tree;
mod value;
pub use codec::{CodecError, SettingsFile};
pub use mod_settings::*;
pub use tree::*;
pub use value::*;
