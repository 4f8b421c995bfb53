//! Branches, exception generation and system instructions.

use crate::error::ExecuteError;
use crate::execute::{alu, read_register, ExecuteState, ExecutionDelegate, FlagsUpdate};
use crate::flags::ConditionFlags;
use crate::operation::Operation;
use crate::register::Register;
use crate::shape::{BranchShape, SystemRegister};

const NZCV_SHIFT: u32 = 28;

pub(super) fn execute(
    operation: Operation,
    shape: &BranchShape,
    delegate: &dyn ExecutionDelegate,
    state: &mut ExecuteState,
) -> Result<(), ExecuteError> {
    match shape {
        BranchShape::ConditionalBranch(shape) => {
            let condition = shape
                .condition()
                .ok_or(ExecuteError::MissingValue { field: "cond" })?;
            if alu::condition_holds(condition, delegate.flags()) {
                state.branch(state.relative(shape.offset()));
            }
        }
        BranchShape::ExceptionGeneration(_) => match operation {
            Operation::Svc => {
                state.syscall = Some(read_register(delegate, Register::SYSCALL_NUMBER)?);
            }
            _ => return Err(ExecuteError::Unsupported { operation }),
        },
        // Hints and barriers have no architectural effect here.
        BranchShape::Hint(_) | BranchShape::Barrier(_) => {}
        BranchShape::SystemRegisterMove(shape) => {
            if shape.system_register() != SystemRegister::NZCV {
                return Err(ExecuteError::Unsupported { operation });
            }
            match operation {
                Operation::Mrs => {
                    let nzcv = u64::from(delegate.flags().to_nzcv()) << NZCV_SHIFT;
                    state.write_register(shape.rt(), nzcv);
                }
                Operation::Msr => {
                    let value = read_register(delegate, shape.rt())?;
                    #[allow(clippy::cast_possible_truncation)]
                    let nibble = ((value >> NZCV_SHIFT) & 0xF) as u8;
                    state.flags_update = FlagsUpdate::Set(ConditionFlags::from_nzcv(nibble));
                }
                _ => return Err(ExecuteError::Unsupported { operation }),
            }
        }
        BranchShape::BranchRegister(shape) => {
            let target = read_register(delegate, shape.rn())?;
            if operation == Operation::Blr {
                state.write_register(Register::LINK, state.next_pc());
            }
            state.branch(target);
        }
        BranchShape::UnconditionalImmediate(shape) => {
            if operation == Operation::Bl {
                state.write_register(Register::LINK, state.next_pc());
            }
            state.branch(state.relative(shape.offset()));
        }
        BranchShape::CompareBranch(shape) => {
            let value = read_register(delegate, shape.rt())?;
            let taken = match operation {
                Operation::Cbz => value == 0,
                Operation::Cbnz => value != 0,
                _ => return Err(ExecuteError::Unsupported { operation }),
            };
            if taken {
                state.branch(state.relative(shape.offset()));
            }
        }
        BranchShape::TestBranch(shape) => {
            let value = read_register(delegate, shape.rt())?;
            let set = (value >> shape.bit_number()) & 1 == 1;
            let taken = match operation {
                Operation::Tbz => !set,
                Operation::Tbnz => set,
                _ => return Err(ExecuteError::Unsupported { operation }),
            };
            if taken {
                state.branch(state.relative(shape.offset()));
            }
        }
    }
    Ok(())
}
