//! Decode, re-encode and disassembly conformance over known words.

use a64_core::{
    decode, decode_as, decode_le_bytes, disassemble, Alias, DecodeError, Family, Operation,
    Register, ShapeKind, Width,
};
use log as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

#[rstest]
#[case(0xD280_00A0, Operation::Movz, ShapeKind::MoveWide, "MOV x0, #5")]
#[case(0x8B00_0000, Operation::Add, ShapeKind::AddSubShifted, "ADD x0, x0, x0")]
#[case(0x9100_403F, Operation::Add, ShapeKind::AddSubImmediate, "ADD sp, x1, #16")]
#[case(0x1100_0420, Operation::Add, ShapeKind::AddSubImmediate, "ADD w0, w1, #1")]
#[case(0x9240_0C20, Operation::And, ShapeKind::LogicalImmediate, "AND x0, x1, #15")]
#[case(0x9000_0000, Operation::Adrp, ShapeKind::PcRelative, "ADRP x0, #0")]
#[case(0x93C2_0420, Operation::Extr, ShapeKind::Extract, "EXTR x0, x1, x2, #1")]
#[case(0xD400_0001, Operation::Svc, ShapeKind::ExceptionGeneration, "SVC #0")]
#[case(0xD503_201F, Operation::Nop, ShapeKind::Hint, "NOP")]
#[case(0xD503_3F9F, Operation::Dsb, ShapeKind::Barrier, "DSB SY")]
#[case(0xD53B_4200, Operation::Mrs, ShapeKind::SystemRegisterMove, "MRS x0, NZCV")]
#[case(0xD65F_03C0, Operation::Ret, ShapeKind::BranchRegister, "RET")]
#[case(0xD63F_0020, Operation::Blr, ShapeKind::BranchRegister, "BLR x1")]
#[case(0x9400_0004, Operation::Bl, ShapeKind::UnconditionalImmediate, "BL #16")]
#[case(0xB400_0040, Operation::Cbz, ShapeKind::CompareBranch, "CBZ x0, #8")]
#[case(0x3618_0060, Operation::Tbz, ShapeKind::TestBranch, "TBZ w0, #3, #12")]
#[case(0x5400_000B, Operation::BCond, ShapeKind::ConditionalBranch, "B.LT #0")]
#[case(0xF940_0420, Operation::Ldr, ShapeKind::LoadStoreUnsignedOffset, "LDR x0, [x1, #8]")]
#[case(0xB940_0020, Operation::Ldr, ShapeKind::LoadStoreUnsignedOffset, "LDR w0, [x1]")]
#[case(0x3940_0020, Operation::Ldrb, ShapeKind::LoadStoreUnsignedOffset, "LDRB w0, [x1]")]
#[case(0xF840_8420, Operation::Ldr, ShapeKind::LoadStorePostIndexed, "LDR x0, [x1], #8")]
#[case(0xF800_8C20, Operation::Str, ShapeKind::LoadStorePreIndexed, "STR x0, [x1, #8]!")]
#[case(0x5800_0040, Operation::Ldr, ShapeKind::LoadLiteral, "LDR x0, #8")]
#[case(0xA9BF_7BFD, Operation::Stp, ShapeKind::LoadStorePair, "STP x29, x30, [sp, #-16]!")]
#[case(0xDAC0_0C20, Operation::Rev, ShapeKind::DataProcessing1Source, "REV x0, x1")]
#[case(0x9AC2_0C20, Operation::Sdiv, ShapeKind::DataProcessing2Source, "SDIV x0, x1, x2")]
#[case(0x9B02_0C20, Operation::Madd, ShapeKind::DataProcessing3Source, "MADD x0, x1, x2, x3")]
#[case(0x9A82_1020, Operation::Csel, ShapeKind::ConditionalSelect, "CSEL x0, x1, x2, NE")]
#[case(0xFA42_0020, Operation::Ccmp, ShapeKind::ConditionalCompareRegister, "CCMP x1, x2, #0, EQ")]
fn known_words(
    #[case] word: u32,
    #[case] operation: Operation,
    #[case] kind: ShapeKind,
    #[case] text: &str,
) {
    let instruction = decode(word).expect("word decodes");
    assert_eq!(instruction.operation(), operation);
    assert_eq!(instruction.kind(), kind);
    assert_eq!(instruction.encode(), Ok(word));
    assert_eq!(disassemble(&instruction), text);
}

#[test]
fn add_into_sp_with_zero_immediate_displays_mov() {
    // ADD sp, x0, #0
    let instruction = decode(0x9100_001F).expect("word decodes");
    assert_eq!(instruction.operation(), Operation::Add);
    assert_eq!(instruction.alias(), Some(Alias::Mov));
    assert_eq!(instruction.display_mnemonic(), "MOV");
    assert_eq!(disassemble(&instruction), "MOV sp, x0");
}

#[test]
fn cmp_alias_keeps_subs_semantics() {
    let instruction = decode(0xEB01_001F).expect("word decodes");
    assert_eq!(instruction.operation(), Operation::Subs);
    assert_eq!(instruction.alias(), Some(Alias::Cmp));
    assert_eq!(instruction.to_string(), "CMP x0, x1");
}

#[test]
fn orr_with_bitmask_prefers_mov() {
    // ORR x0, xzr, #0x5555555555555555
    let instruction = decode(0xB200_F3E0).expect("word decodes");
    assert_eq!(instruction.operation(), Operation::Orr);
    assert_eq!(instruction.display_mnemonic(), "MOV");
}

#[rstest]
#[case(0x1E20_1000)] // FMOV s0, #2.0
#[case(0x4E20_8420)] // ADD v0.16b, v1.16b, v0.16b
#[case(0x0E20_1C00)] // AND v0.8b, v0.8b, v0.8b
fn simd_and_floating_point_are_unsupported(#[case] word: u32) {
    let error = decode(word).expect_err("SIMD is not decoded");
    assert!(error.is_unsupported());
    assert_eq!(
        error,
        DecodeError::Unsupported {
            word,
            family: Family::SimdFloatingPoint
        }
    );
}

#[test]
fn reserved_space_is_unrecognized() {
    let error = decode(0x0000_0000).expect_err("reserved");
    assert_eq!(error, DecodeError::Unrecognized { word: 0 });
    assert!(!error.is_unsupported());
}

#[test]
fn short_byte_input_is_malformed() {
    assert_eq!(
        decode_le_bytes(&[0x1F, 0x20]),
        Err(DecodeError::Malformed { available: 2 })
    );
    let nop = decode_le_bytes(&[0x1F, 0x20, 0x03, 0xD5]).expect("NOP decodes");
    assert_eq!(nop.operation(), Operation::Nop);
}

#[test]
fn shape_specific_decode_rejects_other_shapes() {
    use a64_core::shape::{AddSubImmediate, MoveWide};

    let (operation, shape) = decode_as::<MoveWide>(0xD280_00A0).expect("MOVZ");
    assert_eq!(operation, Operation::Movz);
    assert_eq!(shape.payload(), 5);
    assert_eq!(shape.rd(), Register::X(0));
    assert_eq!(shape.width(), Width::X64);

    assert_eq!(
        decode_as::<AddSubImmediate>(0xD280_00A0).map(|(op, _)| op),
        Err(DecodeError::WrongShape {
            expected: ShapeKind::AddSubImmediate,
            found: ShapeKind::MoveWide
        })
    );
}

proptest! {
    #[test]
    fn decode_never_panics(word in any::<u32>()) {
        let _ = decode(word);
    }

    #[test]
    fn decoded_words_re_encode_identically(word in any::<u32>()) {
        if let Ok(instruction) = decode(word) {
            prop_assert_eq!(instruction.encode(), Ok(word));
        }
    }

    #[test]
    fn disassembly_never_panics(word in any::<u32>()) {
        if let Ok(instruction) = decode(word) {
            prop_assert!(!disassemble(&instruction).is_empty());
        }
    }
}
