//! Loads and stores.

use crate::error::ExecuteError;
use crate::execute::helpers::{effective_address, load, sign_extend_load};
use crate::execute::{read_register, ExecuteState, ExecutionDelegate};
use crate::operand::IndexMode;
use crate::operation::Operation;
use crate::register::{Register, Width};
use crate::shape::LoadStoreShape;

/// Direction and extension of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Store,
    Load,
    LoadSigned,
}

const fn transfer(operation: Operation) -> Option<Transfer> {
    match operation {
        Operation::Str
        | Operation::Strb
        | Operation::Strh
        | Operation::Stur
        | Operation::Sturb
        | Operation::Sturh
        | Operation::Stp
        | Operation::Stnp => Some(Transfer::Store),
        Operation::Ldr
        | Operation::Ldrb
        | Operation::Ldrh
        | Operation::Ldur
        | Operation::Ldurb
        | Operation::Ldurh
        | Operation::Ldp
        | Operation::Ldnp => Some(Transfer::Load),
        Operation::Ldrsw
        | Operation::Ldrsb
        | Operation::Ldrsh
        | Operation::Ldursw
        | Operation::Ldursb
        | Operation::Ldursh
        | Operation::Ldpsw => Some(Transfer::LoadSigned),
        _ => None,
    }
}

/// One register moving `size` bytes at `address`.
fn single(
    direction: Transfer,
    register: Register,
    width: Width,
    address: u64,
    size: u64,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    match direction {
        Transfer::Store => {
            let value = read_register(delegate, register)?;
            state.store(address, size, value);
        }
        Transfer::Load => {
            let value = load(delegate, address, size)?;
            state.write_register(register, value);
        }
        Transfer::LoadSigned => {
            let value = load(delegate, address, size)?;
            state.write_register(register, sign_extend_load(value, size, width));
        }
    }
    Ok(())
}

/// Base-register transfer with optional writeback.
#[allow(clippy::too_many_arguments)]
fn indexed(
    direction: Transfer,
    rt: Register,
    width: Width,
    rn: Register,
    offset: i64,
    mode: IndexMode,
    size: u64,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    let base = read_register(delegate, rn)?;
    let (address, writeback) = effective_address(base, offset, mode);
    if let Some(updated) = writeback {
        state.write_register(rn, updated);
    }
    single(direction, rt, width, address, size, delegate, state)
}

pub(super) fn execute(
    operation: Operation,
    shape: &LoadStoreShape,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    let direction = transfer(operation).ok_or(ExecuteError::Unsupported { operation })?;
    match shape {
        LoadStoreShape::LoadLiteral(shape) => {
            let address = state.relative(shape.offset());
            single(
                direction,
                shape.rt(),
                shape.width(),
                address,
                shape.access_size(),
                delegate,
                state,
            )
        }
        LoadStoreShape::LoadStoreUnscaled(shape) => indexed(
            direction,
            shape.rt(),
            shape.width(),
            shape.rn(),
            shape.offset(),
            shape.index_mode(),
            shape.access_size(),
            delegate,
            state,
        ),
        LoadStoreShape::LoadStorePostIndexed(shape) => indexed(
            direction,
            shape.rt(),
            shape.width(),
            shape.rn(),
            shape.offset(),
            shape.index_mode(),
            shape.access_size(),
            delegate,
            state,
        ),
        LoadStoreShape::LoadStorePreIndexed(shape) => indexed(
            direction,
            shape.rt(),
            shape.width(),
            shape.rn(),
            shape.offset(),
            shape.index_mode(),
            shape.access_size(),
            delegate,
            state,
        ),
        LoadStoreShape::LoadStoreUnsignedOffset(shape) => {
            #[allow(clippy::cast_possible_wrap)]
            let offset = shape.offset() as i64;
            indexed(
                direction,
                shape.rt(),
                shape.width(),
                shape.rn(),
                offset,
                IndexMode::Offset,
                shape.access_size(),
                delegate,
                state,
            )
        }
        LoadStoreShape::LoadStoreRegisterOffset(shape) => {
            let extend = shape
                .extend()
                .ok_or(ExecuteError::MissingValue { field: "option" })?;
            let index = extend.apply(read_register(delegate, shape.rm())?) << shape.shift_amount();
            let base = read_register(delegate, shape.rn())?;
            single(
                direction,
                shape.rt(),
                shape.width(),
                base.wrapping_add(index),
                shape.access_size(),
                delegate,
                state,
            )
        }
        LoadStoreShape::LoadStorePair(shape) => {
            let size = shape.access_size();
            let base = read_register(delegate, shape.rn())?;
            let (address, writeback) = effective_address(base, shape.offset(), shape.index_mode());
            if let Some(updated) = writeback {
                state.write_register(shape.rn(), updated);
            }
            let width = shape.width();
            single(direction, shape.rt(), width, address, size, delegate, state)?;
            single(
                direction,
                shape.rt2(),
                width,
                address.wrapping_add(size),
                size,
                delegate,
                state,
            )
        }
    }
}
