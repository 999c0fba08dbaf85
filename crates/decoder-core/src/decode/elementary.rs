//! Elementary value interpretation shared by both strategies.
//!
//! Flat regions hand a whole word to [`decode_word`], which enforces the
//! type's padding invariant before interpreting. Packed storage hands the
//! exact content bytes to [`decode_exact`], where padding has no meaning
//! because neighbouring bytes belong to other values.

use alloy_primitives::{Address, B256, I256, U256};

use super::DecodeMode;
use crate::error::DecodeError;
use crate::types::{DataType, ElementaryType};
use crate::value::ElementaryValue;

/// Decodes a full word read from a flat region.
///
/// Padding violations are [`DecodeError::BadPadding`] except under
/// permissive mode, which masks the content bytes out and interprets them
/// best-effort.
pub(crate) fn decode_word(
    ty: ElementaryType,
    word: B256,
    mode: DecodeMode,
) -> Result<ElementaryValue, DecodeError> {
    let Some(width) = ty.byte_width() else {
        return Err(DecodeError::UnsupportedType {
            ty: DataType::Elementary(ty),
        });
    };
    let width = usize::from(width);
    let padding_ok = match ty {
        // bytesN content is left-aligned; everything else is right-aligned
        ElementaryType::FixedBytes { .. } => word[width..].iter().all(|byte| *byte == 0),
        ElementaryType::Int { .. } | ElementaryType::Fixed { .. } => {
            let fill = if word[32 - width] & 0x80 == 0 { 0x00 } else { 0xff };
            word[..32 - width].iter().all(|byte| *byte == fill)
        }
        _ => word[..32 - width].iter().all(|byte| *byte == 0),
    };
    if !padding_ok && !mode.is_permissive() {
        return Err(DecodeError::BadPadding { ty });
    }
    let content = match ty {
        ElementaryType::FixedBytes { .. } => &word[..width],
        _ => &word[32 - width..],
    };
    decode_exact(ty, content, mode)
}

/// Decodes an address word, keeping the concrete [`Address`] type.
///
/// Contract references need the account itself rather than a wrapped
/// elementary value, so this skips the enum round trip.
pub(crate) fn decode_address(word: B256, mode: DecodeMode) -> Result<Address, DecodeError> {
    let padding_ok = word[..12].iter().all(|byte| *byte == 0);
    if !padding_ok && !mode.is_permissive() {
        return Err(DecodeError::BadPadding {
            ty: ElementaryType::Address,
        });
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Decodes exactly the content bytes of a value, as extracted from a packed
/// storage word. `bytes` must be exactly the type's width.
pub(crate) fn decode_exact(
    ty: ElementaryType,
    bytes: &[u8],
    mode: DecodeMode,
) -> Result<ElementaryValue, DecodeError> {
    match ty {
        ElementaryType::Uint { .. } => Ok(ElementaryValue::Uint(U256::from_be_slice(bytes))),
        ElementaryType::Int { .. } => Ok(ElementaryValue::Int(sign_extend(bytes))),
        ElementaryType::Bool => match bytes.first().copied() {
            Some(0) => Ok(ElementaryValue::Bool(false)),
            Some(1) => Ok(ElementaryValue::Bool(true)),
            // any nonzero byte is truthy once checks are suppressed
            Some(_) if mode.is_permissive() => Ok(ElementaryValue::Bool(true)),
            Some(value) => Err(DecodeError::BoolOutOfRange { value }),
            None => Err(DecodeError::BoolOutOfRange { value: 0 }),
        },
        ElementaryType::Address => Ok(ElementaryValue::Address(Address::from_slice(bytes))),
        ElementaryType::FixedBytes { width } => {
            let mut word = B256::ZERO;
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(ElementaryValue::FixedBytes { word, width })
        }
        ElementaryType::Ufixed { decimals, .. } => Ok(ElementaryValue::Ufixed {
            raw: U256::from_be_slice(bytes),
            decimals,
        }),
        ElementaryType::Fixed { decimals, .. } => Ok(ElementaryValue::Fixed {
            raw: sign_extend(bytes),
            decimals,
        }),
        ElementaryType::Bytes | ElementaryType::String => Err(DecodeError::UnsupportedType {
            ty: DataType::Elementary(ty),
        }),
    }
}

/// Two's-complement sign extension of big-endian content bytes to a word.
fn sign_extend(bytes: &[u8]) -> I256 {
    let fill = if bytes.first().is_some_and(|byte| byte & 0x80 != 0) {
        0xff
    } else {
        0x00
    };
    let mut raw = [fill; 32];
    raw[32 - bytes.len()..].copy_from_slice(bytes);
    I256::from_raw(U256::from_be_bytes(raw))
}
