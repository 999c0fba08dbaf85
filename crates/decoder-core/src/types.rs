//! Closed type model consumed by both decode strategies.
//!
//! Every decodable shape is a variant of [`DataType`]; the decode strategies
//! match on it exhaustively, so adding a variant forces every dispatch site to
//! handle it.

use core::fmt;

/// Identifier of a user-defined type (struct or enum) inside the allocation
/// tables of one decoding session.
///
/// Ids are assigned by the external allocation pass; the decoder only ever
/// uses them as lookup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Elementary (leaf) types, including the two dynamically sized ones
/// (`bytes` and `string`).
///
/// Only elementary types may serve as mapping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ElementaryType {
    /// Unsigned integer of `bits` width (8..=256, multiple of 8).
    Uint {
        /// Bit width of the integer.
        bits: u16,
    },
    /// Signed two's-complement integer of `bits` width (8..=256, multiple of 8).
    Int {
        /// Bit width of the integer.
        bits: u16,
    },
    /// Boolean stored as one byte.
    Bool,
    /// 20-byte account address.
    Address,
    /// Fixed-width byte string of `width` bytes (1..=32), left-aligned in a word.
    FixedBytes {
        /// Number of content bytes.
        width: u8,
    },
    /// Unsigned fixed-point decimal: `bits`-wide raw value scaled by `10^-decimals`.
    Ufixed {
        /// Bit width of the raw integer.
        bits: u16,
        /// Number of decimal places.
        decimals: u8,
    },
    /// Signed fixed-point decimal: `bits`-wide raw value scaled by `10^-decimals`.
    Fixed {
        /// Bit width of the raw integer.
        bits: u16,
        /// Number of decimal places.
        decimals: u8,
    },
    /// Dynamically sized byte string.
    Bytes,
    /// Dynamically sized UTF-8 string (malformed content is still a value).
    String,
}

impl ElementaryType {
    /// Builds a `uint` type, rejecting widths outside 8..=256 or not a
    /// multiple of 8.
    #[must_use]
    pub const fn uint(bits: u16) -> Option<Self> {
        if bits >= 8 && bits <= 256 && bits % 8 == 0 {
            Some(Self::Uint { bits })
        } else {
            None
        }
    }

    /// Builds an `int` type under the same width rules as [`Self::uint`].
    #[must_use]
    pub const fn int(bits: u16) -> Option<Self> {
        if bits >= 8 && bits <= 256 && bits % 8 == 0 {
            Some(Self::Int { bits })
        } else {
            None
        }
    }

    /// Builds a `ufixedMxN` type: `bits` under the integer width rules,
    /// `decimals` at most 80.
    #[must_use]
    pub const fn ufixed(bits: u16, decimals: u8) -> Option<Self> {
        if bits >= 8 && bits <= 256 && bits % 8 == 0 && decimals <= 80 {
            Some(Self::Ufixed { bits, decimals })
        } else {
            None
        }
    }

    /// Builds a `fixedMxN` type under the same rules as [`Self::ufixed`].
    #[must_use]
    pub const fn fixed(bits: u16, decimals: u8) -> Option<Self> {
        if bits >= 8 && bits <= 256 && bits % 8 == 0 && decimals <= 80 {
            Some(Self::Fixed { bits, decimals })
        } else {
            None
        }
    }

    /// Builds a `bytesN` type, rejecting widths outside 1..=32.
    #[must_use]
    pub const fn fixed_bytes(width: u8) -> Option<Self> {
        if width >= 1 && width <= 32 {
            Some(Self::FixedBytes { width })
        } else {
            None
        }
    }

    /// Returns the exact content width in bytes, or `None` for the
    /// dynamically sized `bytes`/`string`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bits is capped at 256
    pub const fn byte_width(self) -> Option<u8> {
        match self {
            Self::Uint { bits }
            | Self::Int { bits }
            | Self::Ufixed { bits, .. }
            | Self::Fixed { bits, .. } => Some((bits / 8) as u8),
            Self::Bool => Some(1),
            Self::Address => Some(20),
            Self::FixedBytes { width } => Some(width),
            Self::Bytes | Self::String => None,
        }
    }

    /// Returns `true` for `bytes` and `string`, the elementary types whose
    /// encoded size is data-dependent.
    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        matches!(self, Self::Bytes | Self::String)
    }
}

impl fmt::Display for ElementaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint { bits } => write!(f, "uint{bits}"),
            Self::Int { bits } => write!(f, "int{bits}"),
            Self::Bool => f.write_str("bool"),
            Self::Address => f.write_str("address"),
            Self::FixedBytes { width } => write!(f, "bytes{width}"),
            Self::Ufixed { bits, decimals } => write!(f, "ufixed{bits}x{decimals}"),
            Self::Fixed { bits, decimals } => write!(f, "fixed{bits}x{decimals}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
        }
    }
}

/// A decodable type: an elementary leaf or a composite shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DataType {
    /// Elementary leaf type.
    Elementary(ElementaryType),
    /// Homogeneous array; `length` is `None` for dynamically sized arrays.
    Array {
        /// Element type.
        element: Box<DataType>,
        /// Static element count, or `None` when the count is read from data.
        length: Option<u64>,
    },
    /// User-defined struct resolved through the allocation tables.
    Struct(TypeId),
    /// User-defined enum resolved through the definition tables.
    Enum(TypeId),
    /// Anonymous ordered tuple (call/event data only).
    Tuple(Vec<DataType>),
    /// Key-value mapping (storage only); keys must be elementary.
    Mapping {
        /// Key type; its canonical encoding salts the entry-slot hash.
        key: ElementaryType,
        /// Value type decoded at each observed entry slot.
        value: Box<DataType>,
    },
    /// Contract reference: a 20-byte address whose runtime code identifies
    /// the class to layers above this crate.
    Contract,
}

impl DataType {
    /// Convenience constructor for an elementary leaf.
    #[must_use]
    pub const fn elementary(ty: ElementaryType) -> Self {
        Self::Elementary(ty)
    }

    /// Convenience constructor for `element[]`.
    #[must_use]
    pub fn dynamic_array(element: Self) -> Self {
        Self::Array {
            element: Box::new(element),
            length: None,
        }
    }

    /// Convenience constructor for `element[length]`.
    #[must_use]
    pub fn static_array(element: Self, length: u64) -> Self {
        Self::Array {
            element: Box::new(element),
            length: Some(length),
        }
    }

    /// Convenience constructor for `uint256`.
    #[must_use]
    pub const fn uint256() -> Self {
        Self::Elementary(ElementaryType::Uint { bits: 256 })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elementary(ty) => write!(f, "{ty}"),
            Self::Array {
                element,
                length: Some(n),
            } => write!(f, "{element}[{n}]"),
            Self::Array {
                element,
                length: None,
            } => write!(f, "{element}[]"),
            Self::Struct(id) => write!(f, "struct {id}"),
            Self::Enum(id) => write!(f, "enum {id}"),
            Self::Tuple(members) => {
                f.write_str("(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str(")")
            }
            Self::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            Self::Contract => f.write_str("contract"),
        }
    }
}
