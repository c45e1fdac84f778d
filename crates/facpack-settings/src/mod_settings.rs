use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::{PropertyTree, SettingValue, WrongType};

/// The key every setting's value is wrapped under.
pub const VALUE_KEY: &str = "value";

/// When the game reads a setting. Each one is a top-level section of
/// `mod-settings.dat`.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Debug,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LoadTime {
    Startup,
    RuntimeGlobal,
    RuntimePerUser,
}

/// Typed view of a mod settings tree.
///
/// On disk every section maps a setting name to `{ "value": X }`. Sections
/// and settings keep the order they were read or inserted in.
#[derive(Serialize, Deserialize, Clone, PartialEq, Default, Debug)]
#[serde(transparent)]
#[must_use]
pub struct ModSettings {
    sections: IndexMap<LoadTime, IndexMap<String, SettingValue>>,
}

impl ModSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the settings out of a decoded tree, skipping (and logging)
    /// anything that is not a plain setting.
    pub fn from_tree(tree: &PropertyTree) -> Self {
        let mut settings = Self::new();
        let PropertyTree::Dictionary(sections) = tree else {
            if *tree != PropertyTree::None {
                warn!(tag = %tree.tag(), "Settings root is not a dictionary, ignoring it");
            }
            return settings;
        };

        for (section_name, section) in sections {
            let Ok(load_time) = LoadTime::from_str(section_name) else {
                warn!(section = %section_name, "Skipping unknown settings section");
                continue;
            };
            let PropertyTree::Dictionary(entries) = section else {
                warn!(section = %section_name, "Settings section is not a dictionary");
                continue;
            };

            for (name, wrapper) in entries {
                match wrapper.get(VALUE_KEY).and_then(setting_from_node) {
                    Some(value) => settings.insert(load_time, name.clone(), value),
                    None => warn!(%load_time, setting = %name, "Skipping setting of unsupported shape"),
                }
            }
        }

        settings
    }

    /// Builds the on-disk tree shape of these settings.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn to_tree(&self) -> PropertyTree {
        let sections = self
            .sections
            .iter()
            .map(|(load_time, entries)| {
                let entries = entries
                    .iter()
                    .map(|(name, value)| {
                        let node = match value {
                            SettingValue::Boolean(value) => PropertyTree::Bool(*value),
                            SettingValue::Integer(value) => PropertyTree::Number(*value as f64),
                            SettingValue::FloatingPoint(value) => PropertyTree::Number(*value),
                            SettingValue::String(value) => PropertyTree::String(value.clone()),
                        };
                        let wrapper = PropertyTree::Dictionary(vec![(VALUE_KEY.to_string(), node)]);
                        (name.clone(), wrapper)
                    })
                    .collect();
                (load_time.to_string(), PropertyTree::Dictionary(entries))
            })
            .collect();
        PropertyTree::Dictionary(sections)
    }

    #[must_use]
    pub fn get(&self, load_time: LoadTime, name: &str) -> Option<&SettingValue> {
        self.sections.get(&load_time)?.get(name)
    }

    /// Inserts or replaces a setting regardless of its previous kind.
    pub fn insert(&mut self, load_time: LoadTime, name: impl Into<String>, value: SettingValue) {
        self.sections
            .entry(load_time)
            .or_default()
            .insert(name.into(), value);
    }

    /// Updates an existing setting in place, keeping its kind, or inserts a
    /// new one.
    ///
    /// # Errors
    ///
    /// Returns [`WrongType`] if the setting exists with an incompatible kind.
    pub fn set(
        &mut self,
        load_time: LoadTime,
        name: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), WrongType> {
        let section = self.sections.entry(load_time).or_default();
        match section.get_mut(name) {
            Some(existing) => existing.set(value),
            None => {
                section.insert(name.to_string(), value.into());
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, load_time: LoadTime, name: &str) -> Option<SettingValue> {
        self.sections.get_mut(&load_time)?.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoadTime, &str, &SettingValue)> {
        self.sections.iter().flat_map(|(load_time, entries)| {
            entries
                .iter()
                .map(move |(name, value)| (*load_time, name.as_str(), value))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes these settings into the opaque blob stored with modpacks.
    ///
    /// # Errors
    ///
    /// Fails only if [`serde_json`] does.
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns an error if `blob` isn't a valid settings blob.
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }
}

#[expect(clippy::cast_possible_truncation)]
fn setting_from_node(node: &PropertyTree) -> Option<SettingValue> {
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;
    match node {
        PropertyTree::Bool(value) => Some(SettingValue::Boolean(*value)),
        PropertyTree::Number(number) if number.fract() == 0.0 && number.abs() < EXACT_INTEGER_LIMIT => {
            Some(SettingValue::Integer(*number as i64))
        }
        PropertyTree::Number(number) => Some(SettingValue::FloatingPoint(*number)),
        PropertyTree::String(value) => Some(SettingValue::String(value.clone())),
        PropertyTree::None | PropertyTree::List(_) | PropertyTree::Dictionary(_) => None,
    }
}

/// Two-layer settings lookup: values set here shadow the ones in `base`,
/// which is never modified.
#[derive(Clone, Debug)]
#[must_use]
pub struct LayeredSettings<'base> {
    base: &'base ModSettings,
    overrides: ModSettings,
}

impl<'base> LayeredSettings<'base> {
    pub fn new(base: &'base ModSettings) -> Self {
        Self {
            base,
            overrides: ModSettings::new(),
        }
    }

    #[must_use]
    pub fn get(&self, load_time: LoadTime, name: &str) -> Option<&SettingValue> {
        self.overrides
            .get(load_time, name)
            .or_else(|| self.base.get(load_time, name))
    }

    /// Overrides a setting. The override keeps the kind of the base value.
    ///
    /// # Errors
    ///
    /// Returns [`WrongType`] if `value` is incompatible with the current value.
    pub fn set(
        &mut self,
        load_time: LoadTime,
        name: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), WrongType> {
        let Some(mut updated) = self.get(load_time, name).cloned() else {
            return self.overrides.set(load_time, name, value);
        };
        updated.set(value)?;
        self.overrides.insert(load_time, name, updated);
        Ok(())
    }

    /// Drops the override for a setting, exposing the base value again.
    pub fn reset(&mut self, load_time: LoadTime, name: &str) {
        self.overrides.remove(load_time, name);
    }

    #[must_use]
    pub fn is_overridden(&self, load_time: LoadTime, name: &str) -> bool {
        self.overrides.get(load_time, name).is_some()
    }

    pub const fn overrides(&self) -> &ModSettings {
        &self.overrides
    }

    /// Merges both layers into a standalone [`ModSettings`].
    pub fn flatten(&self) -> ModSettings {
        let mut merged = self.base.clone();
        for (load_time, name, value) in self.overrides.iter() {
            merged.insert(load_time, name, value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use facpack_mod::AccurateVersion;

    use super::{LayeredSettings, LoadTime, ModSettings};
    use crate::codec::{SettingsFile, decode, encode};
    use crate::{PropertyTree, SettingKind, SettingValue, WrongType};

    fn wrapped(node: PropertyTree) -> PropertyTree {
        PropertyTree::Dictionary(vec![("value".into(), node)])
    }

    fn sample() -> ModSettings {
        let tree = PropertyTree::Dictionary(vec![
            (
                "startup".into(),
                PropertyTree::Dictionary(vec![
                    ("size".into(), wrapped(PropertyTree::Number(3.0))),
                    ("ratio".into(), wrapped(PropertyTree::Number(0.25))),
                    ("color".into(), wrapped(PropertyTree::Dictionary(vec![]))),
                ]),
            ),
            (
                "runtime-per-user".into(),
                PropertyTree::Dictionary(vec![
                    ("enabled".into(), wrapped(PropertyTree::Bool(true))),
                    ("mode".into(), wrapped(PropertyTree::String("fast".into()))),
                ]),
            ),
            ("bogus".into(), PropertyTree::Dictionary(vec![])),
        ]);
        ModSettings::from_tree(&tree)
    }

    #[test]
    fn typed_view_of_a_tree() {
        let settings = sample();
        assert_eq!(settings.len(), 4);
        assert_eq!(
            settings.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(3))
        );
        assert_eq!(
            settings.get(LoadTime::Startup, "ratio").map(SettingValue::kind),
            Some(SettingKind::FloatingPoint)
        );
        assert_eq!(settings.get(LoadTime::Startup, "color"), None);
        assert_eq!(
            settings
                .get(LoadTime::RuntimePerUser, "mode")
                .and_then(|value| value.as_str().ok()),
            Some("fast")
        );
    }

    #[test]
    fn survives_the_binary_codec() {
        let settings = sample();
        let bytes = encode(&SettingsFile {
            version: AccurateVersion::new(1, 1, 0, 0),
            tree: settings.to_tree(),
        })
        .unwrap();
        let decoded = ModSettings::from_tree(&decode(&bytes).unwrap().tree);
        assert_eq!(decoded, settings);
    }

    #[test]
    fn file_order_is_kept() {
        let tree = PropertyTree::Dictionary(vec![
            (
                "runtime-global".into(),
                PropertyTree::Dictionary(vec![
                    ("zeta".into(), wrapped(PropertyTree::Bool(false))),
                    ("alpha".into(), wrapped(PropertyTree::Number(1.0))),
                ]),
            ),
            (
                "startup".into(),
                PropertyTree::Dictionary(vec![("middle".into(), wrapped(PropertyTree::Number(2.5)))]),
            ),
        ]);
        let mut settings = ModSettings::from_tree(&tree);
        assert_eq!(settings.to_tree(), tree);

        settings.remove(LoadTime::RuntimeGlobal, "zeta");
        settings.insert(LoadTime::RuntimeGlobal, "beta", SettingValue::Boolean(true));
        let names = settings.iter().map(|(_, name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, ["alpha", "beta", "middle"]);
    }

    #[test]
    fn blob_round_trip() {
        let settings = sample();
        let blob = settings.to_blob().unwrap();
        assert!(blob.contains("\"runtime-per-user\""));
        assert_eq!(ModSettings::from_blob(&blob).unwrap(), settings);
    }

    #[test]
    fn set_respects_existing_kinds() {
        let mut settings = sample();
        settings.set(LoadTime::Startup, "ratio", 2_i64).unwrap();
        assert_eq!(
            settings.get(LoadTime::Startup, "ratio"),
            Some(&SettingValue::FloatingPoint(2.0))
        );
        assert_eq!(
            settings.set(LoadTime::RuntimePerUser, "enabled", "yes"),
            Err(WrongType {
                expected: SettingKind::Boolean,
                actual: SettingKind::String,
            })
        );
        settings.set(LoadTime::RuntimeGlobal, "new", 1.5).unwrap();
        assert_eq!(settings.len(), 5);
    }

    #[test]
    fn layered_lookup() {
        let base = sample();
        let mut layered = LayeredSettings::new(&base);
        assert_eq!(
            layered.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(3))
        );

        layered.set(LoadTime::Startup, "size", 8_i64).unwrap();
        assert!(layered.is_overridden(LoadTime::Startup, "size"));
        assert_eq!(
            layered.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(8))
        );
        assert_eq!(
            base.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(3))
        );
        assert!(layered.set(LoadTime::Startup, "size", false).is_err());

        let flattened = layered.flatten();
        assert_eq!(
            flattened.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(8))
        );
        assert_eq!(flattened.len(), base.len());

        layered.reset(LoadTime::Startup, "size");
        assert_eq!(
            layered.get(LoadTime::Startup, "size"),
            Some(&SettingValue::Integer(3))
        );
        assert!(layered.overrides().is_empty());
    }
}
