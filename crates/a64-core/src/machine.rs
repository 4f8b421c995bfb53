//! Flat-memory reference machine driving the execution engine.
//!
//! Memory spans `0..memory_size`; the image is loaded at `base_address` and
//! the stack occupies the top `stack_size` bytes, with `SP` starting at the
//! end of memory. `SVC` stops [`Machine::run`] so the host can service the
//! call and resume.

use std::ops::Range;

use log::{trace, warn};
use thiserror::Error;

use crate::decoder::{decode, INSTRUCTION_BYTES};
use crate::error::{DecodeError, DelegateError, ExecuteError};
use crate::execute::{commit_execution, plan, ExecuteOutcome, ExecutionDelegate};
use crate::flags::ConditionFlags;
use crate::register::Register;

/// Default memory size (1 MiB).
pub const DEFAULT_MEMORY_SIZE: u64 = 1 << 20;

/// Default image load address.
pub const DEFAULT_BASE_ADDRESS: u64 = 0x1_0000;

/// Default stack reservation (64 KiB).
pub const DEFAULT_STACK_SIZE: u64 = 64 << 10;

const GENERAL_REGISTERS: usize = 31;
const STACK_ALIGNMENT: u64 = 16;

/// Memory layout and tracing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Bytes of addressable memory starting at address 0.
    pub memory_size: u64,
    /// Address the image is loaded at and execution starts from.
    pub base_address: u64,
    /// Bytes reserved for the stack at the top of memory.
    pub stack_size: u64,
    /// Enables [`TraceSink`] dispatch.
    pub tracing_enabled: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            base_address: DEFAULT_BASE_ADDRESS,
            stack_size: DEFAULT_STACK_SIZE,
            tracing_enabled: false,
        }
    }
}

impl MachineConfig {
    /// Initial stack pointer.
    #[must_use]
    pub const fn stack_top(&self) -> u64 {
        self.memory_size & !(STACK_ALIGNMENT - 1)
    }

    /// Bytes available for the image between `base_address` and the stack.
    #[must_use]
    pub const fn image_capacity(&self) -> u64 {
        self.memory_size
            .saturating_sub(self.stack_size)
            .saturating_sub(self.base_address)
    }
}

/// Machine setup or stepping failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// The configuration does not describe a usable layout.
    #[error("invalid machine layout: {reason}")]
    InvalidLayout {
        /// What is wrong.
        reason: &'static str,
    },
    /// The image does not fit below the stack.
    #[error("image of {size} bytes exceeds the {capacity}-byte image area")]
    ImageTooLarge {
        /// Image size in bytes.
        size: u64,
        /// Available bytes.
        capacity: u64,
    },
    /// An image's length is not a multiple of the instruction size.
    #[error("image length {len} is not a multiple of 4")]
    TruncatedImage {
        /// Byte length.
        len: usize,
    },
    /// The instruction pointer left memory.
    #[error("instruction fetch at {address:#x} failed: {source}")]
    Fetch {
        /// Instruction pointer.
        address: u64,
        /// Delegate failure.
        source: DelegateError,
    },
    /// The fetched word does not decode.
    #[error("decode at {address:#x} failed: {source}")]
    Decode {
        /// Instruction pointer.
        address: u64,
        /// Decoder failure.
        source: DecodeError,
    },
    /// The decoded instruction failed to execute.
    #[error("execution at {address:#x} failed: {source}")]
    Execute {
        /// Instruction pointer.
        address: u64,
        /// Engine failure.
        source: ExecuteError,
    },
}

/// Deterministic trace events emitted at step boundaries when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction was fetched.
    InstructionStart {
        /// Fetch address.
        pc: u64,
        /// Raw instruction word.
        word: u32,
    },
    /// A memory write is about to be committed.
    MemoryWrite {
        /// Byte address.
        address: u64,
        /// Access size in bytes.
        size: u64,
        /// Written value.
        value: u64,
    },
    /// An instruction retired.
    InstructionRetired {
        /// Address of the retired instruction.
        pc: u64,
        /// How control continued.
        outcome: ExecuteOutcome,
    },
}

/// Sink for [`TraceEvent`]s.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for () {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Why [`Machine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStop {
    /// `SVC` executed; registers hold the call's arguments.
    Syscall {
        /// Value of `X16`.
        number: u64,
    },
    /// The step budget ran out.
    StepLimit,
}

/// Aggregated outcome of [`Machine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions retired by this call.
    pub steps: u64,
    /// Stop reason.
    pub stop: RunStop,
}

/// Splits a little-endian image into instruction words.
///
/// # Errors
///
/// [`MachineError::TruncatedImage`] when `bytes` is not a whole number of
/// words.
pub fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, MachineError> {
    if bytes.len() % INSTRUCTION_BYTES != 0 {
        return Err(MachineError::TruncatedImage { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(INSTRUCTION_BYTES)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Register file, flags and flat memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    config: MachineConfig,
    memory: Vec<u8>,
    registers: [u64; GENERAL_REGISTERS],
    sp: u64,
    pc: u64,
    flags: ConditionFlags,
    last_syscall: Option<u64>,
    retired: u64,
}

impl Machine {
    /// Creates a zeroed machine with `SP` at the top of memory and the
    /// instruction pointer at `base_address`.
    ///
    /// # Errors
    ///
    /// [`MachineError::InvalidLayout`] when the regions overlap, the base is
    /// misaligned or memory does not fit the host.
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        if config.base_address % INSTRUCTION_BYTES as u64 != 0 {
            return Err(MachineError::InvalidLayout {
                reason: "base address is not word aligned",
            });
        }
        if config.stack_size > config.memory_size
            || config.base_address >= config.memory_size - config.stack_size
        {
            return Err(MachineError::InvalidLayout {
                reason: "image area overlaps the stack",
            });
        }
        let size = usize::try_from(config.memory_size).map_err(|_| MachineError::InvalidLayout {
            reason: "memory size exceeds the host address space",
        })?;
        Ok(Self {
            config,
            memory: vec![0; size],
            registers: [0; GENERAL_REGISTERS],
            sp: config.stack_top(),
            pc: config.base_address,
            flags: ConditionFlags::default(),
            last_syscall: None,
            retired: 0,
        })
    }

    /// Layout the machine was built with.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Copies `image` to `base_address` and points execution at it.
    ///
    /// # Errors
    ///
    /// [`MachineError::ImageTooLarge`] when it would reach the stack.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), MachineError> {
        let size = image.len() as u64;
        let capacity = self.config.image_capacity();
        if size > capacity {
            return Err(MachineError::ImageTooLarge { size, capacity });
        }
        let base = self.config.base_address;
        self.write_bytes(base, image)
            .map_err(|_| MachineError::ImageTooLarge { size, capacity })?;
        self.pc = base;
        Ok(())
    }

    /// Loads instruction words as a little-endian image.
    ///
    /// # Errors
    ///
    /// As [`load_image`](Self::load_image).
    pub fn load_words(&mut self, words: &[u32]) -> Result<(), MachineError> {
        let image: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        self.load_image(&image)
    }

    /// Current instruction pointer.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Value of `X<index>`; index 31 reads the zero register.
    #[must_use]
    pub fn x(&self, index: usize) -> u64 {
        self.registers.get(index).copied().unwrap_or(0)
    }

    /// Sets `X<index>`; writes to index 31 are discarded.
    pub fn set_x(&mut self, index: usize, value: u64) {
        if let Some(slot) = self.registers.get_mut(index) {
            *slot = value;
        }
    }

    /// Current stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u64 {
        self.sp
    }

    /// Number of instructions retired so far.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Number passed to the most recent `SVC`.
    #[must_use]
    pub const fn last_syscall(&self) -> Option<u64> {
        self.last_syscall
    }

    /// Borrows `len` bytes of memory at `address`.
    ///
    /// # Errors
    ///
    /// [`DelegateError::OutOfBounds`] when the span leaves memory.
    pub fn bytes(&self, address: u64, len: u64) -> Result<&[u8], DelegateError> {
        let range = self.range(address, len)?;
        Ok(&self.memory[range])
    }

    /// Copies `bytes` into memory at `address`.
    ///
    /// # Errors
    ///
    /// [`DelegateError::OutOfBounds`] when the span leaves memory.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<(), DelegateError> {
        let range = self.range(address, bytes.len() as u64)?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    fn range(&self, address: u64, size: u64) -> Result<Range<usize>, DelegateError> {
        let out_of_bounds = DelegateError::OutOfBounds { address, size };
        let end = address.checked_add(size).ok_or(out_of_bounds)?;
        if end > self.memory.len() as u64 {
            return Err(out_of_bounds);
        }
        let start = usize::try_from(address).map_err(|_| out_of_bounds)?;
        let end = usize::try_from(end).map_err(|_| out_of_bounds)?;
        Ok(start..end)
    }

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N], DelegateError> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.bytes(address, N as u64)?);
        Ok(bytes)
    }

    /// Fetches, decodes and executes one instruction.
    ///
    /// # Errors
    ///
    /// Fetch, decode or execution failure at the current instruction
    /// pointer; the machine is left as it was.
    pub fn step(&mut self) -> Result<ExecuteOutcome, MachineError> {
        self.step_traced(&mut ())
    }

    /// [`step`](Self::step), reporting [`TraceEvent`]s to `sink` when
    /// tracing is enabled.
    ///
    /// # Errors
    ///
    /// As [`step`](Self::step).
    pub fn step_traced(&mut self, sink: &mut dyn TraceSink) -> Result<ExecuteOutcome, MachineError> {
        let pc = self.pc;
        let tracing = self.config.tracing_enabled;
        let word = self
            .read_word(pc)
            .map_err(|source| MachineError::Fetch { address: pc, source })?;
        if tracing {
            sink.on_event(TraceEvent::InstructionStart { pc, word });
        }
        let instruction = decode(word).map_err(|source| {
            if source.is_unsupported() {
                warn!("unsupported encoding {word:#010x} at {pc:#x}");
            }
            MachineError::Decode { address: pc, source }
        })?;
        trace!("{pc:#x}: {word:08x}  {instruction}");
        let state = plan(&instruction, &*self).map_err(|source| {
            if source.is_unsupported() {
                warn!("{} at {pc:#x} has no execution semantics", instruction.operation());
            }
            MachineError::Execute { address: pc, source }
        })?;
        if tracing {
            for store in &state.stores {
                sink.on_event(TraceEvent::MemoryWrite {
                    address: store.address,
                    size: store.size,
                    value: store.value,
                });
            }
        }
        let outcome = commit_execution(self, &state)
            .map_err(|source| MachineError::Execute { address: pc, source })?;
        self.retired += 1;
        if tracing {
            sink.on_event(TraceEvent::InstructionRetired { pc, outcome });
        }
        Ok(outcome)
    }

    /// Steps until an `SVC` retires or `max_steps` instructions have run.
    ///
    /// # Errors
    ///
    /// The first failing [`step`](Self::step).
    pub fn run(&mut self, max_steps: u64) -> Result<RunOutcome, MachineError> {
        self.run_traced(max_steps, &mut ())
    }

    /// [`run`](Self::run) with a trace sink.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn run_traced(
        &mut self,
        max_steps: u64,
        sink: &mut dyn TraceSink,
    ) -> Result<RunOutcome, MachineError> {
        let mut steps = 0;
        while steps < max_steps {
            let outcome = self.step_traced(sink)?;
            steps += 1;
            if let ExecuteOutcome::Syscall { number } = outcome {
                return Ok(RunOutcome {
                    steps,
                    stop: RunStop::Syscall { number },
                });
            }
        }
        Ok(RunOutcome {
            steps,
            stop: RunStop::StepLimit,
        })
    }
}

impl ExecutionDelegate for Machine {
    fn read_word(&self, address: u64) -> Result<u32, DelegateError> {
        self.read_array(address).map(u32::from_le_bytes)
    }

    fn read_doubleword(&self, address: u64) -> Result<u64, DelegateError> {
        self.read_array(address).map(u64::from_le_bytes)
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), DelegateError> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_doubleword(&mut self, address: u64, value: u64) -> Result<(), DelegateError> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn read_byte(&self, address: u64) -> Result<u8, DelegateError> {
        self.read_array(address).map(u8::from_le_bytes)
    }

    fn read_halfword(&self, address: u64) -> Result<u16, DelegateError> {
        self.read_array(address).map(u16::from_le_bytes)
    }

    fn write_byte(&mut self, address: u64, value: u8) -> Result<(), DelegateError> {
        self.write_bytes(address, &[value])
    }

    fn write_halfword(&mut self, address: u64, value: u16) -> Result<(), DelegateError> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn register(&self, register: Register) -> Result<u64, DelegateError> {
        match register {
            Register::X(index) if usize::from(index) < GENERAL_REGISTERS => {
                Ok(self.registers[usize::from(index)])
            }
            Register::Sp => Ok(self.sp),
            _ => Err(DelegateError::Register(register)),
        }
    }

    fn set_register(&mut self, register: Register, value: u64) -> Result<(), DelegateError> {
        match register {
            Register::X(index) if usize::from(index) < GENERAL_REGISTERS => {
                self.registers[usize::from(index)] = value;
                Ok(())
            }
            Register::Sp => {
                self.sp = value;
                Ok(())
            }
            _ => Err(DelegateError::Register(register)),
        }
    }

    fn instruction_pointer(&self) -> u64 {
        self.pc
    }

    fn set_instruction_pointer(&mut self, value: u64) {
        self.pc = value;
    }

    fn flags(&self) -> ConditionFlags {
        self.flags
    }

    fn set_flags(&mut self, flags: ConditionFlags) {
        self.flags = flags;
    }

    fn trigger_syscall(&mut self, number: u64) -> Result<(), DelegateError> {
        self.last_syscall = Some(number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        words_from_le_bytes, Machine, MachineConfig, MachineError, RunStop, TraceEvent,
        DEFAULT_BASE_ADDRESS, DEFAULT_MEMORY_SIZE, DEFAULT_STACK_SIZE,
    };
    use crate::error::DelegateError;
    use crate::execute::{ExecuteOutcome, ExecutionDelegate};

    const MOVZ_X0_5: u32 = 0xD280_00A0;
    const ADD_X0_X0_X0: u32 = 0x8B00_0000;
    const SVC_0: u32 = 0xD400_0001;

    fn machine_with(words: &[u32]) -> Machine {
        let mut machine = Machine::new(MachineConfig::default()).expect("default layout");
        machine.load_words(words).expect("image fits");
        machine
    }

    #[test]
    fn default_config_matches_documented_layout() {
        let config = MachineConfig::default();
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);
        assert_eq!(config.base_address, DEFAULT_BASE_ADDRESS);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert!(!config.tracing_enabled);

        let machine = Machine::new(config).expect("default layout");
        assert_eq!(machine.pc(), 0x1_0000);
        assert_eq!(machine.sp(), 1 << 20);
    }

    #[test]
    fn overlapping_layout_is_rejected() {
        let config = MachineConfig {
            memory_size: 0x1000,
            base_address: 0x800,
            stack_size: 0x900,
            tracing_enabled: false,
        };
        assert!(matches!(
            Machine::new(config),
            Err(MachineError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn run_stops_at_syscall_with_registers_updated() {
        let mut machine = machine_with(&[MOVZ_X0_5, ADD_X0_X0_X0, SVC_0]);
        machine.set_x(16, 1);

        let outcome = machine.run(100).expect("program runs");

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.stop, RunStop::Syscall { number: 1 });
        assert_eq!(machine.x(0), 10);
        assert_eq!(machine.last_syscall(), Some(1));
        assert_eq!(machine.pc(), DEFAULT_BASE_ADDRESS + 12);
        assert_eq!(machine.retired(), 3);
    }

    #[test]
    fn run_respects_step_budget() {
        // B #0
        let mut machine = machine_with(&[0x1400_0000]);
        let outcome = machine.run(5).expect("loop runs");
        assert_eq!(outcome.steps, 5);
        assert_eq!(outcome.stop, RunStop::StepLimit);
        assert_eq!(machine.pc(), DEFAULT_BASE_ADDRESS);
    }

    #[test]
    fn undecodable_word_leaves_machine_untouched() {
        let mut machine = machine_with(&[0x0000_0000]);
        let before = machine.clone();
        let error = machine.step().expect_err("zero word is not an instruction");
        assert!(matches!(error, MachineError::Decode { address: 0x1_0000, .. }));
        assert_eq!(machine, before);
    }

    #[test]
    fn push_and_pop_pair_through_the_stack() {
        // STP x29, x30, [sp, #-16]!; LDP x0, x1, [sp], #16
        let mut machine = machine_with(&[0xA9BF_7BFD, 0xA8C1_07E0]);
        machine.set_x(29, 0x1111);
        machine.set_x(30, 0x2222);
        let top = machine.sp();

        machine.step().expect("push");
        assert_eq!(machine.sp(), top - 16);
        assert_eq!(machine.read_doubleword(top - 16), Ok(0x1111));
        assert_eq!(machine.read_doubleword(top - 8), Ok(0x2222));

        machine.step().expect("pop");
        assert_eq!(machine.sp(), top);
        assert_eq!(machine.x(0), 0x1111);
        assert_eq!(machine.x(1), 0x2222);
    }

    #[test]
    fn accesses_past_memory_are_rejected() {
        let machine = machine_with(&[]);
        assert_eq!(
            machine.read_word(DEFAULT_MEMORY_SIZE - 2),
            Err(DelegateError::OutOfBounds {
                address: DEFAULT_MEMORY_SIZE - 2,
                size: 4
            })
        );
        assert_eq!(
            machine.read_byte(u64::MAX),
            Err(DelegateError::OutOfBounds {
                address: u64::MAX,
                size: 1
            })
        );
    }

    #[test]
    fn tracing_reports_fetch_store_and_retire() {
        let config = MachineConfig {
            tracing_enabled: true,
            ..MachineConfig::default()
        };
        let mut machine = Machine::new(config).expect("default layout");
        // STR x0, [sp, #-16]!
        machine.load_words(&[0xF81F_0FE0]).expect("image fits");
        machine.set_x(0, 7);
        let top = machine.sp();

        let mut events = Vec::new();
        let outcome = machine.step_traced(&mut events).expect("store");

        assert_eq!(
            events,
            vec![
                TraceEvent::InstructionStart {
                    pc: DEFAULT_BASE_ADDRESS,
                    word: 0xF81F_0FE0
                },
                TraceEvent::MemoryWrite {
                    address: top - 16,
                    size: 8,
                    value: 7
                },
                TraceEvent::InstructionRetired {
                    pc: DEFAULT_BASE_ADDRESS,
                    outcome
                },
            ]
        );
        assert_eq!(
            outcome,
            ExecuteOutcome::Retired {
                next_pc: DEFAULT_BASE_ADDRESS + 4
            }
        );
    }

    #[test]
    fn tracing_disabled_emits_nothing() {
        let mut machine = machine_with(&[MOVZ_X0_5]);
        let mut events = Vec::new();
        machine.step_traced(&mut events).expect("movz");
        assert!(events.is_empty());
    }

    #[test]
    fn image_words_are_little_endian() {
        assert_eq!(
            words_from_le_bytes(&[0xA0, 0x00, 0x80, 0xD2]),
            Ok(vec![MOVZ_X0_5])
        );
        assert_eq!(
            words_from_le_bytes(&[1, 2, 3]),
            Err(MachineError::TruncatedImage { len: 3 })
        );
    }

    #[test]
    fn oversized_image_is_rejected() {
        let config = MachineConfig {
            memory_size: 0x2000,
            base_address: 0x1000,
            stack_size: 0x800,
            tracing_enabled: false,
        };
        let mut machine = Machine::new(config).expect("layout fits");
        let image = vec![0; 0x900];
        assert_eq!(
            machine.load_image(&image),
            Err(MachineError::ImageTooLarge {
                size: 0x900,
                capacity: 0x800
            })
        );
    }
}
