use facpack_mod::{AccurateVersion, GameVersion, ModName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use tracing::debug;

use crate::legacy::LegacyExportTemplate;
use crate::mode::ExportMode;
use crate::{ImportError, Uid};

/// Uid of a template that was never assigned one. Left out of export files.
pub const MISSING_UID: Uid = -1;

const fn missing_uid() -> Uid {
    MISSING_UID
}

#[expect(clippy::trivially_copy_pass_by_ref, reason = "serde passes fields by reference")]
const fn is_missing_uid(uid: &Uid) -> bool {
    *uid == MISSING_UID
}

/// An exported mod.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
#[must_use]
pub struct ModExportTemplate {
    #[serde(default = "missing_uid", skip_serializing_if = "is_missing_uid")]
    pub uid: Uid,
    pub name: ModName,
    #[serde(default, skip_serializing_if = "ExportMode::is_default")]
    pub export_mode: ExportMode,
    pub version: Option<AccurateVersion>,
    pub factorio_version: Option<GameVersion>,
}

impl PartialEq for ModExportTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

/// An exported modpack. Children are referenced by [`Uid`].
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
#[must_use]
pub struct ModpackExportTemplate {
    #[serde(default = "missing_uid", skip_serializing_if = "is_missing_uid")]
    pub uid: Uid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mod_ids: Vec<Uid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modpack_ids: Vec<Uid>,
    pub mod_settings: Option<String>,
}

impl PartialEq for ModpackExportTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// The root of an export file.
///
/// `modpacks` is always in dependency order: a modpack only references
/// modpacks that come before it.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
#[must_use]
pub struct ExportTemplate {
    pub version: u64,
    #[serde(default)]
    pub mods: Vec<ModExportTemplate>,
    #[serde(default)]
    pub modpacks: Vec<ModpackExportTemplate>,
}

impl Default for ExportTemplate {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            mods: vec![],
            modpacks: vec![],
        }
    }
}

impl ExportTemplate {
    pub const CURRENT_VERSION: u64 = 2;
    pub const LEGACY_VERSION: u64 = 1;

    /// Parses an export file, upgrading the legacy (version 1) shape.
    ///
    /// Files with `Version` 1, no `Version` at all, or an
    /// `IncludesVersionInfo` key are taken to be legacy files.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::UnsupportedFormat`] for unknown format versions,
    /// [`ImportError::Json`] for malformed JSON and
    /// [`ImportError::CorruptExportData`] for legacy files that can't be
    /// upgraded.
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let value: Value = serde_json::from_str(json)?;
        let version = match value.get("Version") {
            None | Some(Value::Null) => None,
            Some(version) => Some(
                version
                    .as_u64()
                    .ok_or_else(|| ImportError::CorruptExportData(format!("format version {version} is not a number")))?,
            ),
        };

        let is_legacy = match version {
            _ if value.get("IncludesVersionInfo").is_some() => true,
            Some(Self::CURRENT_VERSION) => false,
            Some(Self::LEGACY_VERSION) | None => true,
            Some(unsupported) => return Err(ImportError::UnsupportedFormat(unsupported)),
        };

        if is_legacy {
            debug!("Upgrading a legacy export template");
            serde_json::from_value::<LegacyExportTemplate>(value)?.upgrade()
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// # Errors
    ///
    /// Fails only if [`serde_json`] does.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn find_mod(&self, uid: Uid) -> Option<&ModExportTemplate> {
        self.mods.iter().find(|template| template.uid == uid)
    }

    #[must_use]
    pub fn find_modpack(&self, uid: Uid) -> Option<&ModpackExportTemplate> {
        self.modpacks.iter().find(|template| template.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use facpack_mod::{AccurateVersion, GameVersion, ModName};
    use indoc::indoc;
    use serde_json::json;

    use super::{ExportTemplate, ModExportTemplate, ModpackExportTemplate};
    use crate::ImportError;
    use crate::mode::{ExportMode, VersionPolicy};

    fn sample() -> ExportTemplate {
        ExportTemplate {
            version: ExportTemplate::CURRENT_VERSION,
            mods: vec![
                ModExportTemplate {
                    uid: 0,
                    name: ModName::from("flib".to_string()),
                    export_mode: ExportMode::default(),
                    version: None,
                    factorio_version: None,
                },
                ModExportTemplate {
                    uid: 1,
                    name: ModName::from("rso-mod".to_string()),
                    export_mode: ExportMode::new(VersionPolicy::FactorioVersion),
                    version: None,
                    factorio_version: Some(GameVersion::new(1, 1)),
                },
            ],
            modpacks: vec![
                ModpackExportTemplate {
                    uid: 0,
                    name: "Libraries".into(),
                    mod_ids: vec![0],
                    modpack_ids: vec![],
                    mod_settings: None,
                },
                ModpackExportTemplate {
                    uid: 1,
                    name: "Run".into(),
                    mod_ids: vec![1],
                    modpack_ids: vec![0],
                    mod_settings: Some("{}".into()),
                },
            ],
        }
    }

    #[test]
    fn sparse_serialization() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "Version": 2,
                "Mods": [
                    { "Uid": 0, "Name": "flib" },
                    { "Uid": 1, "Name": "rso-mod", "ExportMode": 2, "FactorioVersion": "1.1" },
                ],
                "Modpacks": [
                    { "Uid": 0, "Name": "Libraries", "ModIds": [0] },
                    { "Uid": 1, "Name": "Run", "ModIds": [1], "ModpackIds": [0], "ModSettings": "{}" },
                ],
            })
        );
    }

    #[test]
    fn round_trip() {
        let template = sample();
        let json = template.to_json_pretty().unwrap();
        assert_eq!(ExportTemplate::from_json(&json).unwrap(), template);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let template = ExportTemplate::from_json(indoc! {r#"
            {
                "Version": 2,
                "Mods": [{ "Name": "flib", "Version": "0.12.9" }],
                "Modpacks": [{ "Name": "Empty" }]
            }
        "#})
        .unwrap();

        let flib = &template.mods[0];
        assert_eq!(flib.uid, -1);
        assert_eq!(flib.export_mode, ExportMode::default());
        assert_eq!(flib.version, Some(AccurateVersion::new(0, 12, 9, 0)));
        assert!(template.modpacks[0].mod_ids.is_empty());
        assert!(template.modpacks[0].mod_settings.is_none());
    }

    #[test]
    fn template_equality() {
        let mut first = sample().mods.remove(0);
        let mut second = first.clone();
        second.uid = 7;
        second.export_mode = ExportMode::default().included(true);
        assert_eq!(first, second);
        first.version = Some(AccurateVersion::new(1, 0, 0, 0));
        assert_ne!(first, second);

        let modpacks = sample().modpacks;
        let mut renamed = modpacks[0].clone();
        renamed.mod_ids.clear();
        assert_eq!(modpacks[0], renamed);
        assert_ne!(modpacks[0], modpacks[1]);
    }

    #[test]
    fn unknown_versions_are_rejected() {
        assert!(matches!(
            ExportTemplate::from_json(r#"{ "Version": 3 }"#),
            Err(ImportError::UnsupportedFormat(3))
        ));
        assert!(matches!(
            ExportTemplate::from_json(r#"{ "Version": "two" }"#),
            Err(ImportError::CorruptExportData(_))
        ));
        assert!(matches!(
            ExportTemplate::from_json("not json"),
            Err(ImportError::Json(_))
        ));
    }
}
