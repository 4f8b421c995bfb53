//! Data-processing handlers, immediate and register families.

use crate::bits;
use crate::condition::Condition;
use crate::error::ExecuteError;
use crate::execute::alu::{self, BitfieldKind};
use crate::execute::{read_register, ExecuteState, ExecutionDelegate, FlagsUpdate};
use crate::flags::ConditionFlags;
use crate::operand::ShiftKind;
use crate::operation::Operation;
use crate::register::Width;
use crate::shape::data_register::ConditionalCompare;
use crate::shape::{DataImmediateShape, DataRegisterShape};

const fn unsupported(operation: Operation) -> ExecuteError {
    ExecuteError::Unsupported { operation }
}

const fn is_subtraction(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Sub | Operation::Subs | Operation::Sbc | Operation::Sbcs | Operation::Ccmp
    )
}

/// `x ± y` through the adder; subtraction is `x + !y + 1`.
const fn add_sub(
    operation: Operation,
    x: u64,
    y: u64,
    width: Width,
) -> (u64, ConditionFlags) {
    if is_subtraction(operation) {
        alu::add_with_carry(x, alu::invert(y, width), true, width)
    } else {
        alu::add_with_carry(x, y, false, width)
    }
}

/// Logical operation with the second operand already shifted. The `N`
/// forms (`BIC`, `ORN`, `EON`, `BICS`) invert it first.
fn logical(
    operation: Operation,
    x: u64,
    y: u64,
    width: Width,
) -> Result<(u64, ConditionFlags), ExecuteError> {
    let result = match operation {
        Operation::And | Operation::Ands => alu::and(x, y, width),
        Operation::Orr => alu::or(x, y, width),
        Operation::Eor => alu::eor(x, y, width),
        Operation::Bic | Operation::Bics => alu::and(x, alu::invert(y, width), width),
        Operation::Orn => alu::or(x, alu::invert(y, width), width),
        Operation::Eon => alu::eor(x, alu::invert(y, width), width),
        _ => return Err(unsupported(operation)),
    };
    Ok(result)
}

const fn logical_sets_flags(operation: Operation) -> bool {
    matches!(operation, Operation::Ands | Operation::Bics)
}

fn condition(value: Option<Condition>) -> Result<Condition, ExecuteError> {
    value.ok_or(ExecuteError::MissingValue { field: "cond" })
}

pub(super) fn data_immediate(
    operation: Operation,
    shape: &DataImmediateShape,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    match shape {
        DataImmediateShape::PcRelative(shape) => {
            let base = if shape.is_page() { state.pc & !0xFFF } else { state.pc };
            #[allow(clippy::cast_sign_loss)]
            let target = base.wrapping_add(shape.byte_offset() as u64);
            state.write_register(shape.rd(), target);
        }
        DataImmediateShape::AddSubImmediate(shape) => {
            let width = shape.width();
            let x = read_register(delegate, shape.rn())?;
            let (result, flags) = add_sub(operation, x, shape.immediate(), width);
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(shape.sets_flags(), flags);
        }
        DataImmediateShape::LogicalImmediate(shape) => {
            let width = shape.width();
            let mask = shape
                .bitmask()
                .ok_or(ExecuteError::MissingValue { field: "imms" })?;
            let x = read_register(delegate, shape.rn())?;
            let (result, flags) = logical(operation, x, mask, width)?;
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(logical_sets_flags(operation), flags);
        }
        DataImmediateShape::MoveWide(shape) => {
            let width = shape.width();
            let placed = u64::from(shape.payload()) << shape.shift();
            let result = match operation {
                Operation::Movz => placed,
                Operation::Movn => alu::invert(placed, width),
                Operation::Movk => {
                    let old = read_register(delegate, shape.rd())?;
                    (old & !(0xFFFF << shape.shift())) | placed
                }
                _ => return Err(unsupported(operation)),
            };
            state.write_register(shape.rd(), result);
        }
        DataImmediateShape::Bitfield(shape) => {
            let width = shape.width();
            let kind = match operation {
                Operation::Sbfm => BitfieldKind::Signed,
                Operation::Ubfm => BitfieldKind::Unsigned,
                Operation::Bfm => BitfieldKind::Insert,
                _ => return Err(unsupported(operation)),
            };
            let destination = match kind {
                BitfieldKind::Insert => read_register(delegate, shape.rd())?,
                _ => 0,
            };
            let source = read_register(delegate, shape.rn())?;
            let result = alu::bitfield(kind, destination, source, shape.immr(), shape.imms(), width);
            state.write_register(shape.rd(), result);
        }
        DataImmediateShape::Extract(shape) => {
            let high = read_register(delegate, shape.rn())?;
            let low = read_register(delegate, shape.rm())?;
            let result = alu::extract(high, low, shape.lsb(), shape.width());
            state.write_register(shape.rd(), result);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
pub(super) fn data_register(
    operation: Operation,
    shape: &DataRegisterShape,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    match shape {
        DataRegisterShape::LogicalShifted(shape) => {
            let width = shape.width();
            let kind = shape.shift().ok_or(ExecuteError::MissingValue { field: "shift" })?;
            let x = read_register(delegate, shape.rn())?;
            let y = alu::shift(read_register(delegate, shape.rm())?, kind, shape.amount(), width);
            let (result, flags) = logical(operation, x, y, width)?;
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(logical_sets_flags(operation), flags);
        }
        DataRegisterShape::AddSubShifted(shape) => {
            let width = shape.width();
            let kind = shape.shift().ok_or(ExecuteError::MissingValue { field: "shift" })?;
            if kind == ShiftKind::Ror {
                return Err(ExecuteError::UnsupportedShift(kind));
            }
            let x = read_register(delegate, shape.rn())?;
            let y = alu::shift(read_register(delegate, shape.rm())?, kind, shape.amount(), width);
            let (result, flags) = add_sub(operation, x, y, width);
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(shape.sets_flags(), flags);
        }
        DataRegisterShape::AddSubExtended(shape) => {
            let width = shape.width();
            let extend = shape.extend().ok_or(ExecuteError::MissingValue { field: "option" })?;
            let x = read_register(delegate, shape.rn())?;
            let y = extend.apply(read_register(delegate, shape.rm())?) << shape.amount();
            let (result, flags) = add_sub(operation, x, y, width);
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(shape.sets_flags(), flags);
        }
        DataRegisterShape::AddSubCarry(shape) => {
            let width = shape.width();
            let x = read_register(delegate, shape.rn())?;
            let y = read_register(delegate, shape.rm())?;
            let y = if is_subtraction(operation) {
                alu::invert(y, width)
            } else {
                y
            };
            let (result, flags) = alu::add_with_carry(x, y, delegate.flags().c, width);
            state.write_register(shape.rd(), result);
            state.flags_update = FlagsUpdate::when(shape.sets_flags(), flags);
        }
        DataRegisterShape::ConditionalCompareRegister(shape) => {
            let y = read_register(delegate, shape.rm())?;
            conditional_compare(operation, &shape.compare, y, delegate, state)?;
        }
        DataRegisterShape::ConditionalCompareImmediate(shape) => {
            let y = u64::from(shape.immediate());
            conditional_compare(operation, &shape.compare, y, delegate, state)?;
        }
        DataRegisterShape::ConditionalSelect(shape) => {
            let width = shape.width();
            let condition = condition(shape.condition())?;
            let result = if alu::condition_holds(condition, delegate.flags()) {
                read_register(delegate, shape.rn())?
            } else {
                let y = read_register(delegate, shape.rm())?;
                match operation {
                    Operation::Csel => y,
                    Operation::Csinc => y.wrapping_add(1),
                    Operation::Csinv => alu::invert(y, width),
                    Operation::Csneg => alu::negate(y, width),
                    _ => return Err(unsupported(operation)),
                }
            };
            state.write_register(shape.rd(), result);
        }
        DataRegisterShape::DataProcessing1Source(shape) => {
            let width = shape.width();
            let x = read_register(delegate, shape.rn())?;
            let result = match operation {
                Operation::Rbit => alu::reverse_bits(x, width),
                Operation::Rev16 => alu::reverse_bytes(x, 2, width),
                Operation::Rev32 => alu::reverse_bytes(x, 4, width),
                Operation::Rev => alu::reverse_bytes(x, width.bits() / 8, width),
                Operation::Clz => alu::count_leading_zeros(x, width),
                Operation::Cls => alu::count_leading_sign_bits(x, width),
                _ => return Err(unsupported(operation)),
            };
            state.write_register(shape.rd(), result);
        }
        DataRegisterShape::DataProcessing2Source(shape) => {
            let width = shape.width();
            let x = read_register(delegate, shape.rn())?;
            let y = read_register(delegate, shape.rm())?;
            #[allow(clippy::cast_possible_truncation)]
            let amount = (y % u64::from(width.bits())) as u32;
            let result = match operation {
                Operation::Udiv => alu::unsigned_divide(x, y, width),
                Operation::Sdiv => alu::signed_divide(x, y, width),
                Operation::Lslv => alu::shift(x, ShiftKind::Lsl, amount, width),
                Operation::Lsrv => alu::shift(x, ShiftKind::Lsr, amount, width),
                Operation::Asrv => alu::shift(x, ShiftKind::Asr, amount, width),
                Operation::Rorv => alu::shift(x, ShiftKind::Ror, amount, width),
                _ => return Err(unsupported(operation)),
            };
            state.write_register(shape.rd(), result);
        }
        DataRegisterShape::DataProcessing3Source(shape) => {
            let x = read_register(delegate, shape.rn())?;
            let y = read_register(delegate, shape.rm())?;
            let addend = read_register(delegate, shape.ra())?;
            let signed = |value: u64| bits::sign_extend(value, 32);
            #[allow(clippy::cast_sign_loss)]
            let result = match operation {
                Operation::Madd => addend.wrapping_add(x.wrapping_mul(y)),
                Operation::Msub => addend.wrapping_sub(x.wrapping_mul(y)),
                Operation::Smaddl => addend.wrapping_add(signed(x).wrapping_mul(signed(y)) as u64),
                Operation::Smsubl => addend.wrapping_sub(signed(x).wrapping_mul(signed(y)) as u64),
                Operation::Umaddl => addend.wrapping_add(x.wrapping_mul(y)),
                Operation::Umsubl => addend.wrapping_sub(x.wrapping_mul(y)),
                Operation::Smulh => alu::signed_multiply_high(x, y),
                Operation::Umulh => alu::unsigned_multiply_high(x, y),
                _ => return Err(unsupported(operation)),
            };
            state.write_register(shape.rd(), result);
        }
    }
    Ok(())
}

fn conditional_compare(
    operation: Operation,
    compare: &ConditionalCompare,
    y: u64,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    let condition = condition(compare.condition())?;
    let flags = if alu::condition_holds(condition, delegate.flags()) {
        let x = read_register(delegate, compare.rn())?;
        add_sub(operation, x, y, compare.width()).1
    } else {
        compare.fallback_flags()
    };
    state.flags_update = FlagsUpdate::Set(flags);
    Ok(())
}
