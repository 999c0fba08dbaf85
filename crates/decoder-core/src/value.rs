//! Decoded value trees.
//!
//! Failures are ordinary tree nodes: a [`Decoded::Error`] replaces the value
//! at exactly the point of failure so sibling fields still decode. Strict
//! mode is the only exception and is handled by the engine, not here.

use core::fmt;

use alloy_primitives::{hex, Address, Bytes, B256, I256, U256};

use crate::error::DecodeError;
use crate::types::TypeId;

/// String content, preserved even when it is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StringData {
    /// Valid UTF-8 content.
    Utf8(String),
    /// Raw bytes that failed UTF-8 validation.
    Malformed(Bytes),
}

impl StringData {
    /// Classifies raw content bytes, keeping them verbatim either way.
    #[must_use]
    pub fn from_raw(raw: Vec<u8>) -> Self {
        match String::from_utf8(raw) {
            Ok(text) => Self::Utf8(text),
            Err(err) => Self::Malformed(Bytes::from(err.into_bytes())),
        }
    }

    /// Returns the content bytes regardless of UTF-8 validity.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Utf8(text) => text.as_bytes(),
            Self::Malformed(raw) => raw.as_ref(),
        }
    }
}

impl fmt::Display for StringData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8(text) => write!(f, "{text:?}"),
            Self::Malformed(raw) => write!(f, "{raw}"),
        }
    }
}

/// A decoded elementary value.
///
/// This is the only value shape admitted as a mapping key, so it is the only
/// one carrying `Hash` and a canonical encoding for slot derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ElementaryValue {
    /// Unsigned integer of any declared width.
    Uint(U256),
    /// Signed integer of any declared width.
    Int(I256),
    /// Boolean.
    Bool(bool),
    /// 20-byte account address.
    Address(Address),
    /// Fixed-width byte string, left-aligned with a zeroed tail.
    FixedBytes {
        /// Content in the first `width` bytes; the rest is zero.
        word: B256,
        /// Number of content bytes.
        width: u8,
    },
    /// Unsigned fixed-point decimal.
    Ufixed {
        /// Unscaled integer value.
        raw: U256,
        /// Number of decimal places dividing `raw`.
        decimals: u8,
    },
    /// Signed fixed-point decimal.
    Fixed {
        /// Unscaled integer value.
        raw: I256,
        /// Number of decimal places dividing `raw`.
        decimals: u8,
    },
    /// Dynamically sized byte string.
    Bytes(Bytes),
    /// Dynamically sized string.
    String(StringData),
}

impl ElementaryValue {
    /// Canonical single-word re-encoding, or `None` for `bytes`/`string`
    /// which have no single-word form.
    ///
    /// Integers are right-aligned big-endian, addresses carry twelve zero
    /// prefix bytes, fixed byte strings are left-aligned. Decoding a word
    /// with canonical padding and re-encoding the value reproduces the word.
    #[must_use]
    pub fn to_word(&self) -> Option<B256> {
        match self {
            Self::Uint(value) => Some(B256::from(*value)),
            Self::Int(value) => Some(B256::from(value.into_raw())),
            Self::Bool(value) => Some(B256::with_last_byte(u8::from(*value))),
            Self::Address(address) => Some(address.into_word()),
            Self::FixedBytes { word, .. } => Some(*word),
            Self::Ufixed { raw, .. } => Some(B256::from(*raw)),
            Self::Fixed { raw, .. } => Some(B256::from(raw.into_raw())),
            Self::Bytes(_) | Self::String(_) => None,
        }
    }

    /// Encoding used to salt a mapping-entry hash: the canonical word for
    /// word-sized values, the raw content bytes for `bytes`/`string`.
    #[must_use]
    pub fn encode_for_hash(&self) -> Vec<u8> {
        match self {
            Self::Bytes(raw) => raw.to_vec(),
            Self::String(data) => data.as_bytes().to_vec(),
            other => other
                .to_word()
                .map_or_else(Vec::new, |word| word.to_vec()),
        }
    }
}

fn write_fixed_point(
    f: &mut fmt::Formatter<'_>,
    negative: bool,
    raw: U256,
    decimals: u8,
) -> fmt::Result {
    if negative {
        f.write_str("-")?;
    }
    if decimals == 0 {
        return write!(f, "{raw}");
    }
    // decimals is capped at 80 by type construction, but a stray value must
    // not panic the renderer.
    let Some(scale) = U256::from(10u8).checked_pow(U256::from(decimals)) else {
        return write!(f, "{raw}e-{decimals}");
    };
    let frac = (raw % scale).to_string();
    let pad = usize::from(decimals) - frac.len();
    write!(f, "{}.{}{}", raw / scale, "0".repeat(pad), frac)
}

impl fmt::Display for ElementaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Address(address) => write!(f, "{address}"),
            Self::FixedBytes { word, width } => {
                write!(f, "0x{}", hex::encode(&word[..usize::from(*width)]))
            }
            Self::Ufixed { raw, decimals } => write_fixed_point(f, false, *raw, *decimals),
            Self::Fixed { raw, decimals } => {
                write_fixed_point(f, raw.is_negative(), raw.unsigned_abs(), *decimals)
            }
            Self::Bytes(raw) => write!(f, "{raw}"),
            Self::String(data) => write!(f, "{data}"),
        }
    }
}

/// A decoded value of any shape, mirroring the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TypedValue {
    /// Elementary leaf value.
    Elementary(ElementaryValue),
    /// Enum variant resolved through the definition tables.
    Enum {
        /// Enum definition the ordinal was resolved against.
        type_id: TypeId,
        /// Resolved variant name.
        variant: String,
        /// Ordinal as stored in the data.
        ordinal: u64,
    },
    /// Contract reference with the hash of its runtime code.
    Contract {
        /// Account the reference points at.
        address: Address,
        /// keccak-256 of the code fetched for that account.
        code_hash: B256,
    },
    /// Array elements in index order.
    Array(Vec<Decoded>),
    /// Tuple members in declaration order.
    Tuple(Vec<Decoded>),
    /// Struct fields in declaration order.
    Struct {
        /// Struct definition the layout came from.
        type_id: TypeId,
        /// `(field name, decoded field)` pairs.
        fields: Vec<(String, Decoded)>,
    },
    /// Observed mapping entries; completeness tracks the caller-supplied
    /// key-observation list, nothing more.
    Mapping {
        /// `(key, decoded value)` pairs in observation order.
        entries: Vec<(ElementaryValue, Decoded)>,
    },
}

/// One node of a decode result tree: a value, or the error that replaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Decoded {
    /// Successfully decoded value (which may still contain error children).
    Value(TypedValue),
    /// Failure at exactly this point of the tree.
    Error(DecodeError),
}

impl Decoded {
    /// Returns the value at this node, if it is one.
    #[must_use]
    pub const fn value(&self) -> Option<&TypedValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// Returns the error at this node, if it is one.
    #[must_use]
    pub const fn error(&self) -> Option<&DecodeError> {
        match self {
            Self::Value(_) => None,
            Self::Error(err) => Some(err),
        }
    }

    /// True when this subtree contains no error node at any depth.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        match self {
            Self::Error(_) => false,
            Self::Value(
                TypedValue::Elementary(_) | TypedValue::Enum { .. } | TypedValue::Contract { .. },
            ) => true,
            Self::Value(TypedValue::Array(children) | TypedValue::Tuple(children)) => {
                children.iter().all(Self::is_clean)
            }
            Self::Value(TypedValue::Struct { fields, .. }) => {
                fields.iter().all(|(_, child)| child.is_clean())
            }
            Self::Value(TypedValue::Mapping { entries }) => {
                entries.iter().all(|(_, child)| child.is_clean())
            }
        }
    }
}

impl From<DecodeError> for Decoded {
    fn from(err: DecodeError) -> Self {
        Self::Error(err)
    }
}

impl From<ElementaryValue> for Decoded {
    fn from(value: ElementaryValue) -> Self {
        Self::Value(TypedValue::Elementary(value))
    }
}

fn write_children(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    children: &[Decoded],
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(close)
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elementary(value) => write!(f, "{value}"),
            Self::Enum { variant, .. } => f.write_str(variant),
            Self::Contract { address, .. } => write!(f, "{address}"),
            Self::Array(children) => write_children(f, "[", children, "]"),
            Self::Tuple(children) => write_children(f, "(", children, ")"),
            Self::Struct { fields, .. } => {
                f.write_str("{ ")?;
                for (i, (name, child)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {child}")?;
                }
                f.write_str(" }")
            }
            Self::Mapping { entries } => {
                f.write_str("{ ")?;
                for (i, (key, child)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} => {child}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Error(err) => write!(f, "<decoding error: {err}>"),
        }
    }
}
