//! Decode pipeline for A64 instruction words.
//!
//! Decoding runs in two phases. [`resolve_shape`] walks the root table and
//! the family bit windows to find the terminal [`ShapeKind`] without loading
//! any field. [`ShapeKind::instantiate`] then derives the operation from the
//! shape's discriminator table and loads the fields.

use log::debug;

use crate::encoding::{classify_root, RootClass};
use crate::error::DecodeError;
use crate::operation::Operation;
use crate::shape::{
    branch, data_immediate, data_register, instantiate, load_store, Family, Instruction,
    ShapeKind, Terminal,
};

/// Size of one encoded instruction in bytes.
pub const INSTRUCTION_BYTES: usize = 4;

/// Phase one: selects the terminal shape of `word` from bit windows only.
///
/// # Errors
///
/// [`DecodeError::Unrecognized`] for reserved or unallocated space,
/// [`DecodeError::Unsupported`] for SVE, SIMD/FP and the families' own
/// unimplemented groups.
pub fn resolve_shape(word: u32) -> Result<ShapeKind, DecodeError> {
    match classify_root(word) {
        RootClass::Reserved | RootClass::Unallocated => Err(DecodeError::Unrecognized { word }),
        RootClass::ScalableVector => Err(DecodeError::Unsupported {
            word,
            family: Family::ScalableVector,
        }),
        RootClass::Family(Family::DataImmediate) => data_immediate::resolve(word),
        RootClass::Family(Family::BranchSystem) => branch::resolve(word),
        RootClass::Family(Family::LoadStore) => load_store::resolve(word),
        RootClass::Family(Family::DataRegister) => data_register::resolve(word),
        RootClass::Family(family @ (Family::SimdFloatingPoint | Family::ScalableVector)) => {
            Err(DecodeError::Unsupported { word, family })
        }
    }
}

/// Decodes one instruction word.
///
/// # Errors
///
/// See [`resolve_shape`] and [`ShapeKind::instantiate`].
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let result = resolve_shape(word).and_then(|kind| kind.instantiate(word));
    if let Err(error) = &result {
        debug!("decode of {word:#010x} failed: {error}");
    }
    result
}

/// Decodes `word` as shape `S`, checking first that the decode tree agrees.
///
/// # Errors
///
/// [`DecodeError::WrongShape`] when the word resolves to another shape,
/// otherwise as [`decode`].
pub fn decode_as<S: Terminal>(word: u32) -> Result<(Operation, S), DecodeError> {
    let found = resolve_shape(word)?;
    if found != S::KIND {
        return Err(DecodeError::WrongShape {
            expected: S::KIND,
            found,
        });
    }
    instantiate::<S>(word)
}

/// Decodes the first instruction of a little-endian byte slice.
///
/// # Errors
///
/// [`DecodeError::Malformed`] when fewer than four bytes are available,
/// otherwise as [`decode`].
pub fn decode_le_bytes(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let Some(word) = bytes.first_chunk::<INSTRUCTION_BYTES>() else {
        return Err(DecodeError::Malformed {
            available: bytes.len(),
        });
    };
    decode(u32::from_le_bytes(*word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{Register, Width};
    use crate::shape::{AddSubImmediate, LoadStoreUnsignedOffset, MoveWide};

    #[test]
    fn decode_movz() {
        let instruction = decode(0xD280_00A0).expect("MOVZ decodes");
        assert_eq!(instruction.operation(), Operation::Movz);
        assert_eq!(instruction.kind(), ShapeKind::MoveWide);
        assert_eq!(instruction.family(), Family::DataImmediate);
        assert_eq!(instruction.width(), Width::X64);
    }

    #[test]
    fn reserved_root_space_is_unrecognized() {
        assert_eq!(decode(0), Err(DecodeError::Unrecognized { word: 0 }));
        assert_eq!(
            decode(0x0200_0000),
            Err(DecodeError::Unrecognized { word: 0x0200_0000 })
        );
    }

    #[test]
    fn vector_families_are_unsupported() {
        assert_eq!(
            decode(0x1E20_1000),
            Err(DecodeError::Unsupported {
                word: 0x1E20_1000,
                family: Family::SimdFloatingPoint
            })
        );
        assert_eq!(
            resolve_shape(0x0420_0000),
            Err(DecodeError::Unsupported {
                word: 0x0420_0000,
                family: Family::ScalableVector
            })
        );
    }

    #[test]
    fn decode_as_rejects_other_shapes() {
        assert_eq!(
            decode_as::<AddSubImmediate>(0xD280_00A0).map(|(op, _)| op),
            Err(DecodeError::WrongShape {
                expected: ShapeKind::AddSubImmediate,
                found: ShapeKind::MoveWide
            })
        );
        let (operation, shape) = decode_as::<MoveWide>(0xD280_00A0).expect("MOVZ decodes");
        assert_eq!(operation, Operation::Movz);
        assert_eq!(shape.payload(), 5);
    }

    #[test]
    fn decode_as_loads_typed_fields() {
        // LDR x0, [x1, #8]
        let (operation, shape) =
            decode_as::<LoadStoreUnsignedOffset>(0xF940_0420).expect("LDR decodes");
        assert_eq!(operation, Operation::Ldr);
        assert_eq!(shape.rn(), Register::X(1));
        assert_eq!(shape.offset(), 8);
    }

    #[test]
    fn byte_input_is_little_endian() {
        let bytes = 0xD280_00A0_u32.to_le_bytes();
        assert_eq!(
            decode_le_bytes(&bytes).map(|i| i.operation()),
            Ok(Operation::Movz)
        );
        assert_eq!(
            decode_le_bytes(&bytes[..3]),
            Err(DecodeError::Malformed { available: 3 })
        );
    }
}
