use alloy_primitives::U256;
use thiserror::Error;

use crate::types::{DataType, ElementaryType, TypeId};

/// Error classes used for diagnostics aggregation and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Read outside the bytes known for a region.
    Bounds,
    /// Declared length cannot be represented or backed.
    Length,
    /// Allocation or definition table lookup miss.
    Lookup,
    /// Non-canonical bytes around a scalar value.
    Padding,
    /// Word decodes to a value outside the type's domain.
    Range,
    /// Engine/host request protocol violation.
    Protocol,
}

/// Decode failure taxonomy, embedded as error nodes in result trees and
/// carried by strict-mode aborts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeError {
    /// Read past the end of the bytes known for a flat region.
    #[error("read of {length} bytes at offset {offset} exceeds the {available} bytes known for the region")]
    OutOfBoundsRead {
        /// Byte offset the read started at.
        offset: usize,
        /// Number of bytes requested.
        length: usize,
        /// Bytes currently known for the region.
        available: usize,
    },
    /// Declared length does not fit a native integer, or (strict mode only)
    /// exceeds the bytes known for the region.
    #[error("declared length {declared} exceeds what the region can back")]
    OverlongArrayOrString {
        /// Length word as read from the data.
        declared: U256,
    },
    /// Offset word too large to resolve to a buffer position.
    #[error("offset {pointer} is too large to resolve")]
    OverlargePointer {
        /// Offset word as read from the data.
        pointer: U256,
    },
    /// Allocation/definition table lookup miss. Retryable: the caller may
    /// rebuild its tables and restart the decode from scratch.
    #[error("no layout known for user-defined type {type_id}")]
    UserDefinedTypeNotFound {
        /// Identifier the lookup was keyed on.
        type_id: TypeId,
    },
    /// Padding bytes around a scalar violate the type's invariant.
    #[error("non-canonical padding for {ty} value")]
    BadPadding {
        /// Scalar type whose padding rule was violated.
        ty: ElementaryType,
    },
    /// Boolean content byte is neither zero nor one.
    #[error("boolean byte {value:#04x} is neither 0 nor 1")]
    BoolOutOfRange {
        /// Content byte as read from the data.
        value: u8,
    },
    /// Enum ordinal has no corresponding variant.
    #[error("ordinal {ordinal} exceeds the {variant_count} variants of enum {type_id}")]
    EnumOutOfRange {
        /// Enum definition the ordinal was checked against.
        type_id: TypeId,
        /// Ordinal as read from the data.
        ordinal: u64,
        /// Number of variants the definition declares.
        variant_count: u64,
    },
    /// No decode rule exists for this type in the addressed region.
    #[error("{ty} cannot be decoded from this region")]
    UnsupportedType {
        /// Type the dispatch failed on.
        ty: DataType,
    },
    /// The host failed to serve a data request.
    #[error("host failed to serve a data request: {reason}")]
    ReadFailed {
        /// Host-supplied failure description.
        reason: String,
    },
    /// Resume supplied a response of the wrong kind for the pending request.
    #[error("response does not match the pending request")]
    ResponseMismatch,
}

impl DecodeError {
    /// Returns the diagnostics class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::OutOfBoundsRead { .. } => ErrorClass::Bounds,
            Self::OverlongArrayOrString { .. } | Self::OverlargePointer { .. } => {
                ErrorClass::Length
            }
            Self::UserDefinedTypeNotFound { .. } | Self::UnsupportedType { .. } => {
                ErrorClass::Lookup
            }
            Self::BadPadding { .. } => ErrorClass::Padding,
            Self::BoolOutOfRange { .. } | Self::EnumOutOfRange { .. } => ErrorClass::Range,
            Self::ReadFailed { .. } | Self::ResponseMismatch => ErrorClass::Protocol,
        }
    }

    /// Errors the caller may clear by rebuilding its allocation tables and
    /// restarting the whole decode. The engine never retries internally.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UserDefinedTypeNotFound { .. })
    }

    /// Errors that abort the decode in every mode, not just strict. These
    /// describe a broken engine/host exchange, so embedding them as value
    /// nodes would misattribute the failure to the data.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self.class(), ErrorClass::Protocol)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::{DecodeError, ErrorClass};
    use crate::types::{ElementaryType, TypeId};

    #[test]
    fn class_mapping_matches_error_taxonomy() {
        assert_eq!(
            DecodeError::OutOfBoundsRead {
                offset: 64,
                length: 32,
                available: 68,
            }
            .class(),
            ErrorClass::Bounds
        );
        assert_eq!(
            DecodeError::OverlongArrayOrString {
                declared: U256::MAX,
            }
            .class(),
            ErrorClass::Length
        );
        assert_eq!(
            DecodeError::UserDefinedTypeNotFound {
                type_id: TypeId(3),
            }
            .class(),
            ErrorClass::Lookup
        );
        assert_eq!(
            DecodeError::BadPadding {
                ty: ElementaryType::Address,
            }
            .class(),
            ErrorClass::Padding
        );
        assert_eq!(
            DecodeError::BoolOutOfRange { value: 2 }.class(),
            ErrorClass::Range
        );
        assert_eq!(DecodeError::ResponseMismatch.class(), ErrorClass::Protocol);
    }

    #[test]
    fn only_type_lookup_misses_are_retryable() {
        assert!(DecodeError::UserDefinedTypeNotFound {
            type_id: TypeId(0),
        }
        .is_retryable());
        assert!(!DecodeError::ResponseMismatch.is_retryable());
        assert!(!DecodeError::BadPadding {
            ty: ElementaryType::Bool,
        }
        .is_retryable());
    }

    #[test]
    fn protocol_errors_are_flagged_for_unconditional_abort() {
        assert!(DecodeError::ResponseMismatch.is_protocol());
        assert!(DecodeError::ReadFailed {
            reason: "connection reset".into(),
        }
        .is_protocol());
        assert!(!DecodeError::OutOfBoundsRead {
            offset: 0,
            length: 32,
            available: 0,
        }
        .is_protocol());
    }

    #[test]
    fn messages_carry_diagnostic_payload() {
        let err = DecodeError::OutOfBoundsRead {
            offset: 96,
            length: 32,
            available: 100,
        };
        assert_eq!(
            err.to_string(),
            "read of 32 bytes at offset 96 exceeds the 100 bytes known for the region"
        );
        let err = DecodeError::BoolOutOfRange { value: 0x7f };
        assert_eq!(err.to_string(), "boolean byte 0x7f is neither 0 nor 1");
    }
}
