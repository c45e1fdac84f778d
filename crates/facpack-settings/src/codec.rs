//! Reader and writer for the binary property-tree format.
//!
//! ## Layout
//!
//! Every multi-byte integer is little-endian.
//!
//! ```not-rust
//! file       := version node
//! version    := u16 major, u16 minor, u16 build, u16 revision
//! node       := u8 tag, u8 reserved, body
//! body       := (none)                       tag 0, None
//!             | u8 bool                      tag 1, Bool
//!             | f64                          tag 2, Number
//!             | string                       tag 3, String
//!             | u32 count, count * entry     tag 4, List (keys are always empty)
//!             | u32 count, count * entry     tag 5, Dictionary
//! entry      := string key, node
//! string     := u8 is_empty, [length, utf-8 bytes if not empty]
//! length     := u8 (< 255) | 0xFF u32
//! ```
//!
//! The reserved byte is ignored when reading. When writing, it is set for
//! string nodes only, which is what the game itself does.

use facpack_mod::AccurateVersion;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::tree::{PropertyTree, Tag};

/// The oldest game version whose settings files can be read.
pub const MINIMUM_VERSION: AccurateVersion = AccurateVersion::new(0, 16, 0, 0);

/// Nesting deeper than this is treated as corrupt data.
pub const MAX_DEPTH: usize = 256;

const LONG_LENGTH_MARKER: u8 = 0xFF;

/// Errors that may occur while reading or writing a property tree.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed property tree data at byte {offset}: {reason}")]
    MalformedData { offset: usize, reason: String },

    #[error("Unexpected end of data at byte {offset}, {wanted} more bytes were needed")]
    UnexpectedEof { offset: usize, wanted: usize },

    #[error(
        "Settings written by version {found} are not supported, the oldest readable one is {minimum}",
        minimum = MINIMUM_VERSION
    )]
    UnsupportedVersion { found: AccurateVersion },

    #[error("A {kind} can't be written as a property tree node")]
    UnsupportedType { kind: &'static str },

    #[error("Failed to (de)serialize the JSON side of a property tree")]
    Json(#[from] serde_json::Error),
}

/// A decoded settings file: the version that wrote it and its tree.
#[derive(Clone, PartialEq, Debug)]
#[must_use]
pub struct SettingsFile {
    pub version: AccurateVersion,
    pub tree: PropertyTree,
}

/// Decodes a whole settings file.
///
/// # Errors
///
/// See [`CodecError`]. Trailing bytes after the root node are not an error,
/// they only get logged.
#[instrument(level = "debug", skip_all, fields(length = bytes.len()))]
pub fn decode(bytes: &[u8]) -> Result<SettingsFile, CodecError> {
    let mut decoder = Decoder::new(bytes);
    let version = decoder.read_version()?;
    if version < MINIMUM_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version });
    }

    let tree = decoder.read_node(0)?;
    if decoder.remaining() > 0 {
        warn!(
            trailing = decoder.remaining(),
            "Ignoring trailing bytes after the property tree"
        );
    }

    Ok(SettingsFile { version, tree })
}

/// Decodes a settings file straight into JSON, see [`PropertyTree::to_json`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_json(bytes: &[u8]) -> Result<(AccurateVersion, Value), CodecError> {
    let SettingsFile { version, tree } = decode(bytes)?;
    Ok((version, tree.to_json()))
}

/// Encodes a whole settings file.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedType`] if a string or a collection is too
/// large for its 32-bit length field.
pub fn encode(file: &SettingsFile) -> Result<Vec<u8>, CodecError> {
    let mut encoder = Encoder::default();
    encoder.write_version(file.version);
    encoder.write_node(&file.tree)?;
    Ok(encoder.buffer)
}

/// Encodes a JSON value as a settings file written by `version`.
///
/// # Errors
///
/// See [`encode`] and [`PropertyTree::from_json`].
pub fn encode_json(version: AccurateVersion, value: &Value) -> Result<Vec<u8>, CodecError> {
    let tree = PropertyTree::from_json(value)?;
    encode(&SettingsFile { version, tree })
}

/// Encodes JSON text as a settings file. Blank text becomes a lone `None`
/// node.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the text isn't valid JSON, see
/// [`encode_json`] otherwise.
pub fn encode_json_str(version: AccurateVersion, json: &str) -> Result<Vec<u8>, CodecError> {
    if json.trim().is_empty() {
        return encode(&SettingsFile {
            version,
            tree: PropertyTree::None,
        });
    }

    let value: Value = serde_json::from_str(json)?;
    encode_json(version, &value)
}

struct Decoder<'bytes> {
    bytes: &'bytes [u8],
    offset: usize,
}

impl<'bytes> Decoder<'bytes> {
    const fn new(bytes: &'bytes [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn malformed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::MalformedData {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn take(&mut self, count: usize) -> Result<&'bytes [u8], CodecError> {
        if count > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                offset: self.offset,
                wanted: count - self.remaining(),
            });
        }

        let taken = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(taken)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    fn read_version(&mut self) -> Result<AccurateVersion, CodecError> {
        Ok(AccurateVersion::new(
            self.read_u16()?,
            self.read_u16()?,
            self.read_u16()?,
            self.read_u16()?,
        ))
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        if self.read_bool()? {
            return Ok(String::new());
        }

        let length = match self.read_u8()? {
            LONG_LENGTH_MARKER => self.read_u32()? as usize,
            short => usize::from(short),
        };
        let start = self.offset;
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|error| CodecError::MalformedData {
            offset: start + error.utf8_error().valid_up_to(),
            reason: "string is not valid UTF-8".into(),
        })
    }

    fn read_node(&mut self, depth: usize) -> Result<PropertyTree, CodecError> {
        if depth > MAX_DEPTH {
            return Err(self.malformed(format!("nesting exceeds {MAX_DEPTH} levels")));
        }

        let tag_offset = self.offset;
        let tag = self.read_u8()?;
        let tag = Tag::try_from(tag).map_err(|unknown| CodecError::MalformedData {
            offset: tag_offset,
            reason: format!("unknown type tag {unknown}"),
        })?;
        let _reserved = self.read_u8()?;

        Ok(match tag {
            Tag::None => PropertyTree::None,
            Tag::Bool => PropertyTree::Bool(self.read_bool()?),
            Tag::Number => PropertyTree::Number(self.read_f64()?),
            Tag::String => PropertyTree::String(self.read_string()?),
            Tag::List => PropertyTree::List(
                self.read_entries(depth)?
                    .into_iter()
                    .map(|(_, value)| value)
                    .collect(),
            ),
            Tag::Dictionary => PropertyTree::Dictionary(self.read_entries(depth)?),
        })
    }

    fn read_entries(&mut self, depth: usize) -> Result<Vec<(String, PropertyTree)>, CodecError> {
        let count = self.read_u32()? as usize;
        // Every entry takes at least three bytes, don't trust `count` blindly.
        let mut entries = Vec::with_capacity(count.min(self.remaining() / 3));
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_node(depth + 1)?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[derive(Default)]
struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn checked_length(length: usize, kind: &'static str) -> Result<u32, CodecError> {
        u32::try_from(length).map_err(|_| CodecError::UnsupportedType { kind })
    }

    fn write_version(&mut self, version: AccurateVersion) {
        self.write_u16(version.major);
        self.write_u16(version.minor);
        self.write_u16(version.build);
        self.write_u16(version.revision);
    }

    fn write_string(&mut self, string: &str) -> Result<(), CodecError> {
        if string.is_empty() {
            self.buffer.push(1);
            return Ok(());
        }

        self.buffer.push(0);
        let length = Self::checked_length(string.len(), "string longer than 4 GiB")?;
        match u8::try_from(length) {
            Ok(short) if short != LONG_LENGTH_MARKER => self.buffer.push(short),
            _ => {
                self.buffer.push(LONG_LENGTH_MARKER);
                self.write_u32(length);
            }
        }
        self.buffer.extend_from_slice(string.as_bytes());
        Ok(())
    }

    fn write_node(&mut self, node: &PropertyTree) -> Result<(), CodecError> {
        self.buffer.push(node.tag() as u8);
        self.buffer
            .push(u8::from(matches!(node, PropertyTree::String(_))));

        match node {
            PropertyTree::None => {}
            PropertyTree::Bool(value) => self.buffer.push(u8::from(*value)),
            PropertyTree::Number(number) => self.buffer.extend_from_slice(&number.to_le_bytes()),
            PropertyTree::String(string) => self.write_string(string)?,
            PropertyTree::List(items) => {
                let count = Self::checked_length(items.len(), "list with over 2^32 items")?;
                self.write_u32(count);
                for item in items {
                    self.write_string("")?;
                    self.write_node(item)?;
                }
            }
            PropertyTree::Dictionary(entries) => {
                let count = Self::checked_length(entries.len(), "dictionary with over 2^32 entries")?;
                self.write_u32(count);
                for (key, value) in entries {
                    self.write_string(key)?;
                    self.write_node(value)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use facpack_mod::AccurateVersion;
    use rstest::rstest;
    use serde_json::json;

    use super::{
        CodecError, MAX_DEPTH, SettingsFile, decode, decode_json, encode, encode_json, encode_json_str,
    };
    use crate::PropertyTree;

    const VERSION: AccurateVersion = AccurateVersion::new(1, 1, 110, 0);
    const HEADER: [u8; 8] = [1, 0, 1, 0, 110, 0, 0, 0];

    fn file(tree: PropertyTree) -> SettingsFile {
        SettingsFile {
            version: VERSION,
            tree,
        }
    }

    fn sample_tree() -> PropertyTree {
        PropertyTree::Dictionary(vec![
            (
                "startup".into(),
                PropertyTree::Dictionary(vec![(
                    "rso-resource-size".into(),
                    PropertyTree::Dictionary(vec![("value".into(), PropertyTree::Number(1.5))]),
                )]),
            ),
            (
                "runtime-global".into(),
                PropertyTree::Dictionary(vec![
                    ("flag".into(), PropertyTree::Bool(true)),
                    ("empty".into(), PropertyTree::String(String::new())),
                    ("nothing".into(), PropertyTree::None),
                ]),
            ),
            (
                "list".into(),
                PropertyTree::List(vec![
                    PropertyTree::String("iron".into()),
                    PropertyTree::Number(-3.0),
                    PropertyTree::List(vec![]),
                ]),
            ),
        ])
    }

    #[test]
    fn round_trip() {
        let original = file(sample_tree());
        let bytes = encode(&original).unwrap();
        assert_eq!(bytes[..8], HEADER);
        assert_eq!(decode(&bytes).unwrap(), original);
    }

    #[test]
    fn long_strings_use_the_wide_length() {
        let string = "a".repeat(300);
        let bytes = encode(&file(PropertyTree::String(string.clone()))).unwrap();

        let mut expected = HEADER.to_vec();
        expected.extend([3, 1]);
        expected.extend([0, 0xFF, 0x2C, 0x01, 0x00, 0x00]);
        expected.extend(string.as_bytes());
        assert_eq!(bytes, expected);
    }

    #[rstest]
    #[case(254, vec![0, 254])]
    #[case(255, vec![0, 0xFF, 255, 0, 0, 0])]
    fn length_prefix_boundary(#[case] length: usize, #[case] prefix: Vec<u8>) {
        let bytes = encode(&file(PropertyTree::String("x".repeat(length)))).unwrap();
        assert_eq!(bytes[10..10 + prefix.len()], prefix[..]);
    }

    #[test]
    fn empty_strings_are_a_single_flag() {
        let bytes = encode(&file(PropertyTree::String(String::new()))).unwrap();
        assert_eq!(bytes[8..], [3, 1, 1]);
    }

    #[test]
    fn reserved_byte_only_set_for_strings() {
        let bytes = encode(&file(PropertyTree::Bool(true))).unwrap();
        assert_eq!(bytes[8..], [1, 0, 1]);
        let bytes = encode(&file(PropertyTree::List(vec![PropertyTree::None]))).unwrap();
        assert_eq!(bytes[8..], [4, 0, 1, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn blank_json_is_a_none_node() {
        let bytes = encode_json_str(VERSION, "  \n").unwrap();
        assert_eq!(bytes[8..], [0, 0]);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.tree, PropertyTree::None);
    }

    #[test]
    fn json_lists_come_back_as_objects() {
        let bytes = encode_json(VERSION, &json!({ "mods": ["a", "b"], "count": 2 })).unwrap();
        let (version, value) = decode_json(&bytes).unwrap();
        assert_eq!(version, VERSION);
        assert_eq!(value, json!({ "mods": { "0": "a", "1": "b" }, "count": 2 }));
    }

    #[test]
    fn old_versions_are_rejected() {
        let bytes = encode(&SettingsFile {
            version: AccurateVersion::new(0, 15, 40, 0),
            tree: PropertyTree::None,
        })
        .unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::UnsupportedVersion { found }) if found == AccurateVersion::new(0, 15, 40, 0)
        ));
    }

    #[test]
    fn unknown_tags_are_malformed() {
        let mut bytes = HEADER.to_vec();
        bytes.extend([9, 0]);
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::MalformedData { offset: 8, .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut bytes = HEADER.to_vec();
        bytes.extend([3, 1, 0, 2, 0xC3, 0x28]);
        assert!(matches!(decode(&bytes), Err(CodecError::MalformedData { .. })));
    }

    #[rstest]
    #[case::header(vec![1, 0, 1])]
    #[case::tag(HEADER.to_vec())]
    #[case::number([HEADER.as_slice(), &[2, 0, 0, 0]].concat())]
    #[case::string([HEADER.as_slice(), &[3, 1, 0, 10, b'a']].concat())]
    #[case::dictionary([HEADER.as_slice(), &[5, 0, 2, 0, 0, 0, 1, 0, 0]].concat())]
    fn truncated_input(#[case] bytes: Vec<u8>) {
        assert!(matches!(decode(&bytes), Err(CodecError::UnexpectedEof { .. })));
    }

    #[test]
    fn huge_counts_fail_without_allocating() {
        let mut bytes = HEADER.to_vec();
        bytes.extend([5, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(decode(&bytes), Err(CodecError::UnexpectedEof { .. })));
    }

    fn nested_lists(levels: usize) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        for _ in 0..levels {
            bytes.extend([4, 0, 1, 0, 0, 0, 1]);
        }
        bytes.extend([0, 0]);
        bytes
    }

    #[test]
    fn nesting_is_limited() {
        assert!(decode(&nested_lists(MAX_DEPTH)).is_ok());
        assert!(matches!(
            decode(&nested_lists(MAX_DEPTH + 1)),
            Err(CodecError::MalformedData { .. })
        ));
        assert!(matches!(
            decode(&nested_lists(100_000)),
            Err(CodecError::MalformedData { .. })
        ));
    }
}
