use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

/// A four-part version as the game writes it into its binary files.
///
/// Each component is a 16-bit field, and the whole thing packs into a single
/// 64-bit ordinal (see [`Self::to_packed`]). Ordering follows the packed value,
/// which is the same as comparing component by component.
///
/// The textual form is `major.minor.build.revision`. Parsing is lenient and
/// accepts two to four components, so `1.1` and `1.1.0.0` are the same version.
#[derive(SerializeDisplay, DeserializeFromStr, Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
#[must_use]
pub struct AccurateVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl AccurateVersion {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Packs the four components into one `u64`, most significant first.
    #[must_use]
    pub const fn to_packed(self) -> u64 {
        ((self.major as u64) << 48)
            | ((self.minor as u64) << 32)
            | ((self.build as u64) << 16)
            | (self.revision as u64)
    }

    #[expect(clippy::cast_possible_truncation)]
    pub const fn from_packed(packed: u64) -> Self {
        Self {
            major: (packed >> 48) as u16,
            minor: (packed >> 32) as u16,
            build: (packed >> 16) as u16,
            revision: packed as u16,
        }
    }

    /// The `major.minor` family this version belongs to.
    pub const fn family(self) -> GameVersion {
        GameVersion::new(self.major, self.minor)
    }
}

impl Ord for AccurateVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_packed().cmp(&other.to_packed())
    }
}

impl PartialOrd for AccurateVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Errors that may occur when parsing an [`AccurateVersion`] or a
/// [`GameVersion`] from a string.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("A version needs 2 to 4 dot-separated components, got {0}")]
    WrongComponentCount(usize),
    #[error(transparent)]
    ParseIntError(#[from] std::num::ParseIntError),
}

impl FromStr for AccurateVersion {
    type Err = VersionParseError;

    fn from_str(str: &str) -> Result<Self, Self::Err> {
        let components = str.trim().split('.').collect::<Vec<_>>();
        if !(2..=4).contains(&components.len()) {
            return Err(VersionParseError::WrongComponentCount(components.len()));
        }

        let mut parsed = [0_u16; 4];
        for (slot, component) in parsed.iter_mut().zip(components) {
            *slot = component.parse()?;
        }

        let [major, minor, build, revision] = parsed;
        Ok(Self::new(major, minor, build, revision))
    }
}

impl fmt::Display for AccurateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// A `major.minor` game version, as used by mods to declare which release of
/// the game they target.
#[derive(
    SerializeDisplay,
    DeserializeFromStr,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
)]
#[must_use]
pub struct GameVersion {
    pub major: u16,
    pub minor: u16,
}

impl GameVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl FromStr for GameVersion {
    type Err = VersionParseError;

    fn from_str(str: &str) -> Result<Self, Self::Err> {
        AccurateVersion::from_str(str).map(AccurateVersion::family)
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl From<GameVersion> for AccurateVersion {
    fn from(game_version: GameVersion) -> Self {
        Self::new(game_version.major, game_version.minor, 0, 0)
    }
}
