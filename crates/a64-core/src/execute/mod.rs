//! Single-instruction execution against an [`ExecutionDelegate`].
//!
//! Execution runs in two steps:
//! 1. [`plan`] reads operands and memory through the delegate and records
//!    every side effect in an [`ExecuteState`] without mutating anything.
//! 2. [`commit_execution`] applies the recorded effects in a fixed order:
//!    memory writes, registers, flags, syscall, instruction pointer.
//!
//! A failing read therefore leaves the delegate untouched. The one partial
//! effect is a store pair whose second write fails after the first landed.

mod branch;
mod data;
mod delegate;
mod flags;
mod helpers;
mod memory;

/// Pure ALU primitives.
pub mod alu;

pub use delegate::ExecutionDelegate;
pub use flags::FlagsUpdate;
pub use helpers::{effective_address, read_register};

use log::debug;

use crate::decoder::INSTRUCTION_BYTES;
use crate::error::ExecuteError;
use crate::execute::helpers::architectural;
use crate::register::Register;
use crate::shape::{Instruction, Shape};

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Fell through to the next instruction.
    Retired {
        /// New instruction pointer.
        next_pc: u64,
    },
    /// Control transferred.
    Branched {
        /// New instruction pointer.
        target: u64,
    },
    /// `SVC` handed control to the delegate's syscall hook.
    Syscall {
        /// Value of `X16` at the call.
        number: u64,
    },
}

/// A memory write waiting to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStore {
    /// Byte address.
    pub address: u64,
    /// Access size in bytes.
    pub size: u64,
    /// Value; only the low `size` bytes are written.
    pub value: u64,
}

/// Side effects of one instruction, computed before any is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteState {
    /// Address of the executing instruction.
    pub pc: u64,
    /// Memory writes in program order.
    pub stores: Vec<PendingStore>,
    /// Register writes as 64-bit views, applied in order.
    pub registers: Vec<(Register, u64)>,
    /// Flag change.
    pub flags_update: FlagsUpdate,
    /// Pending `SVC` number.
    pub syscall: Option<u64>,
    /// Branch target, when control leaves the fall-through path.
    pub branch_target: Option<u64>,
}

impl ExecuteState {
    /// Empty state for the instruction at `pc`.
    #[must_use]
    pub const fn new(pc: u64) -> Self {
        Self {
            pc,
            stores: Vec::new(),
            registers: Vec::new(),
            flags_update: FlagsUpdate::None,
            syscall: None,
            branch_target: None,
        }
    }

    /// Fall-through address.
    #[must_use]
    pub const fn next_pc(&self) -> u64 {
        self.pc.wrapping_add(INSTRUCTION_BYTES as u64)
    }

    /// Records a register write in `register`'s width. 32-bit writes
    /// zero-extend; zero-register writes are dropped.
    pub fn write_register(&mut self, register: Register, value: u64) {
        if register.is_zero() {
            return;
        }
        self.registers
            .push((architectural(register), value & register.width().mask()));
    }

    /// Records a memory write.
    pub fn store(&mut self, address: u64, size: u64, value: u64) {
        self.stores.push(PendingStore {
            address,
            size,
            value,
        });
    }

    /// Records a taken branch.
    pub fn branch(&mut self, target: u64) {
        self.branch_target = Some(target);
    }

    /// PC-relative address from this instruction.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn relative(&self, offset: i64) -> u64 {
        self.pc.wrapping_add(offset as u64)
    }
}

/// Computes the side effects of `instruction` without mutating `delegate`.
///
/// # Errors
///
/// [`ExecuteError::Unsupported`] for instructions without semantics, or a
/// delegate read failure.
pub fn plan(
    instruction: &Instruction,
    delegate: &dyn ExecutionDelegate,
) -> Result<ExecuteState, ExecuteError> {
    let mut state = ExecuteState::new(delegate.instruction_pointer());
    let operation = instruction.operation();
    match instruction.shape() {
        Shape::DataImmediate(shape) => data::data_immediate(operation, shape, delegate, &mut state)?,
        Shape::DataRegister(shape) => data::data_register(operation, shape, delegate, &mut state)?,
        Shape::Branch(shape) => branch::execute(operation, shape, delegate, &mut state)?,
        Shape::LoadStore(shape) => memory::execute(operation, shape, delegate, &mut state)?,
    }
    Ok(state)
}

/// Applies `state` to `delegate`.
///
/// # Errors
///
/// The first delegate refusal; effects before it have been applied.
pub fn commit_execution(
    delegate: &mut dyn ExecutionDelegate,
    state: &ExecuteState,
) -> Result<ExecuteOutcome, ExecuteError> {
    for pending in &state.stores {
        helpers::store(delegate, pending.address, pending.size, pending.value)?;
    }
    for (register, value) in &state.registers {
        delegate.set_register(*register, *value)?;
    }
    if let FlagsUpdate::Set(flags) = state.flags_update {
        delegate.set_flags(flags);
    }
    if let Some(number) = state.syscall {
        debug!("svc at {:#x}: syscall {number}", state.pc);
        delegate.trigger_syscall(number)?;
    }
    let outcome = match (state.branch_target, state.syscall) {
        (Some(target), _) => {
            delegate.set_instruction_pointer(target);
            ExecuteOutcome::Branched { target }
        }
        (None, Some(number)) => {
            delegate.set_instruction_pointer(state.next_pc());
            ExecuteOutcome::Syscall { number }
        }
        (None, None) => {
            let next_pc = state.next_pc();
            delegate.set_instruction_pointer(next_pc);
            ExecuteOutcome::Retired { next_pc }
        }
    };
    Ok(outcome)
}

/// Executes one decoded instruction.
///
/// # Errors
///
/// See [`plan`] and [`commit_execution`].
pub fn execute(
    instruction: &Instruction,
    delegate: &mut dyn ExecutionDelegate,
) -> Result<ExecuteOutcome, ExecuteError> {
    let state = plan(instruction, &*delegate)?;
    commit_execution(delegate, &state)
}
