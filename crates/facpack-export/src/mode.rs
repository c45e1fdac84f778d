use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How an exported mod's version should be picked when the export is imported.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumIter,
    EnumString,
    Debug,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum VersionPolicy {
    /// Whatever the newest available release is.
    #[default]
    #[strum(to_string = "newest", serialize = "newest-version")]
    NewestVersion,
    /// Exactly the exported release.
    #[strum(to_string = "specific", serialize = "specific-version")]
    SpecificVersion,
    /// The newest release made for the same game version.
    #[strum(to_string = "factorio", serialize = "factorio-version")]
    FactorioVersion,
}

impl VersionPolicy {
    const fn bits(self) -> u32 {
        match self {
            Self::NewestVersion => 0,
            Self::SpecificVersion => 1,
            Self::FactorioVersion => 2,
        }
    }
}

/// Per-mod export flags, stored as a small integer in export files.
///
/// | bits     | meaning                                     |
/// |----------|---------------------------------------------|
/// | `0b0011` | [`VersionPolicy`]                           |
/// | `0b0100` | the mod's file is included in the package   |
/// | `0b1000` | a newer release may be downloaded instead   |
///
/// `0` (newest version, nothing included) is the default and is left out of
/// export files.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
#[serde(try_from = "u32", into = "u32")]
#[must_use]
pub struct ExportMode {
    pub policy: VersionPolicy,
    pub included: bool,
    pub download_newer: bool,
}

/// An integer that does not describe a valid [`ExportMode`].
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("{0:#06b} is not a valid export mode")]
pub struct InvalidExportMode(pub u32);

impl ExportMode {
    pub const POLICY_MASK: u32 = 0b0011;
    pub const INCLUDED: u32 = 0b0100;
    pub const DOWNLOAD_NEWER: u32 = 0b1000;

    pub const fn new(policy: VersionPolicy) -> Self {
        Self {
            policy,
            included: false,
            download_newer: false,
        }
    }

    pub const fn included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    pub const fn download_newer(mut self, download_newer: bool) -> Self {
        self.download_newer = download_newer;
        self
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        let mut bits = self.policy.bits();
        if self.included {
            bits |= Self::INCLUDED;
        }
        if self.download_newer {
            bits |= Self::DOWNLOAD_NEWER;
        }
        bits
    }

    /// # Errors
    ///
    /// Returns [`InvalidExportMode`] for unknown bits or policy values.
    pub const fn from_bits(bits: u32) -> Result<Self, InvalidExportMode> {
        let known = Self::POLICY_MASK | Self::INCLUDED | Self::DOWNLOAD_NEWER;
        if bits & !known != 0 {
            return Err(InvalidExportMode(bits));
        }

        let policy = match bits & Self::POLICY_MASK {
            0 => VersionPolicy::NewestVersion,
            1 => VersionPolicy::SpecificVersion,
            2 => VersionPolicy::FactorioVersion,
            _ => return Err(InvalidExportMode(bits)),
        };

        Ok(Self {
            policy,
            included: bits & Self::INCLUDED != 0,
            download_newer: bits & Self::DOWNLOAD_NEWER != 0,
        })
    }

    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.bits() == 0
    }

    /// Whether an import may settle for a release other than the exported
    /// one: the file is not shipped with the export, or a newer one is wanted
    /// anyway.
    #[must_use]
    pub const fn allows_other_release(self) -> bool {
        !self.included || self.download_newer
    }
}

impl TryFrom<u32> for ExportMode {
    type Error = InvalidExportMode;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<ExportMode> for u32 {
    fn from(mode: ExportMode) -> Self {
        mode.bits()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::{ExportMode, InvalidExportMode, VersionPolicy};

    #[rstest]
    #[case(0, ExportMode::new(VersionPolicy::NewestVersion))]
    #[case(1, ExportMode::new(VersionPolicy::SpecificVersion))]
    #[case(0b0110, ExportMode::new(VersionPolicy::FactorioVersion).included(true))]
    #[case(0b1101, ExportMode::new(VersionPolicy::SpecificVersion).included(true).download_newer(true))]
    fn bit_layout(#[case] bits: u32, #[case] mode: ExportMode) {
        assert_eq!(mode.bits(), bits);
        assert_eq!(ExportMode::from_bits(bits), Ok(mode));
    }

    #[rstest]
    #[case(0b0011)]
    #[case(0b1_0000)]
    fn invalid_bits(#[case] bits: u32) {
        assert_eq!(ExportMode::from_bits(bits), Err(InvalidExportMode(bits)));
    }

    #[test]
    fn serde_as_integer() {
        let mode = ExportMode::new(VersionPolicy::SpecificVersion).included(true);
        assert_eq!(serde_json::to_string(&mode).unwrap(), "5");
        assert_eq!(serde_json::from_str::<ExportMode>("5").unwrap(), mode);
        assert!(serde_json::from_str::<ExportMode>("3").is_err());
    }

    #[test]
    fn policy_names() {
        assert_eq!(
            VersionPolicy::from_str("Specific"),
            Ok(VersionPolicy::SpecificVersion)
        );
        assert_eq!(
            VersionPolicy::from_str("factorio-version"),
            Ok(VersionPolicy::FactorioVersion)
        );
        assert_eq!(VersionPolicy::NewestVersion.to_string(), "newest");
    }

    #[test]
    fn other_releases() {
        let newest = ExportMode::default();
        assert!(newest.allows_other_release());
        assert!(!newest.included(true).allows_other_release());
        assert!(newest.included(true).download_newer(true).allows_other_release());
    }
}
