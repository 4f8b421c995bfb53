use crate::error::DelegateError;
use crate::flags::{ConditionFlags, Flag};
use crate::register::Register;

/// Owner of the architectural state an instruction executes against.
///
/// The engine only ever passes the 64-bit views `X0`..`X30` and `SP` to
/// [`register`](Self::register) and [`set_register`](Self::set_register);
/// zero-register reads, discarded writes and 32-bit truncation are handled
/// before the delegate is consulted. Addresses are 64-bit byte addresses and
/// multi-byte accesses are little-endian.
///
/// Byte and halfword accesses have default bodies returning
/// [`DelegateError::UnsupportedAccess`] so delegates that only back word
/// traffic stay small.
pub trait ExecutionDelegate {
    /// Reads 4 bytes.
    ///
    /// # Errors
    ///
    /// Delegate-defined, typically [`DelegateError::OutOfBounds`].
    fn read_word(&self, address: u64) -> Result<u32, DelegateError>;

    /// Reads 8 bytes.
    ///
    /// # Errors
    ///
    /// Delegate-defined, typically [`DelegateError::OutOfBounds`].
    fn read_doubleword(&self, address: u64) -> Result<u64, DelegateError>;

    /// Writes 4 bytes.
    ///
    /// # Errors
    ///
    /// Delegate-defined, typically [`DelegateError::OutOfBounds`].
    fn write_word(&mut self, address: u64, value: u32) -> Result<(), DelegateError>;

    /// Writes 8 bytes.
    ///
    /// # Errors
    ///
    /// Delegate-defined, typically [`DelegateError::OutOfBounds`].
    fn write_doubleword(&mut self, address: u64, value: u64) -> Result<(), DelegateError>;

    /// Reads 1 byte.
    ///
    /// # Errors
    ///
    /// [`DelegateError::UnsupportedAccess`] unless overridden.
    fn read_byte(&self, address: u64) -> Result<u8, DelegateError> {
        let _ = address;
        Err(DelegateError::UnsupportedAccess { size: 1 })
    }

    /// Reads 2 bytes.
    ///
    /// # Errors
    ///
    /// [`DelegateError::UnsupportedAccess`] unless overridden.
    fn read_halfword(&self, address: u64) -> Result<u16, DelegateError> {
        let _ = address;
        Err(DelegateError::UnsupportedAccess { size: 2 })
    }

    /// Writes 1 byte.
    ///
    /// # Errors
    ///
    /// [`DelegateError::UnsupportedAccess`] unless overridden.
    fn write_byte(&mut self, address: u64, value: u8) -> Result<(), DelegateError> {
        let _ = (address, value);
        Err(DelegateError::UnsupportedAccess { size: 1 })
    }

    /// Writes 2 bytes.
    ///
    /// # Errors
    ///
    /// [`DelegateError::UnsupportedAccess`] unless overridden.
    fn write_halfword(&mut self, address: u64, value: u16) -> Result<(), DelegateError> {
        let _ = (address, value);
        Err(DelegateError::UnsupportedAccess { size: 2 })
    }

    /// Current value of a 64-bit register view.
    ///
    /// # Errors
    ///
    /// [`DelegateError::Register`] when the delegate does not back `register`.
    fn register(&self, register: Register) -> Result<u64, DelegateError>;

    /// Stores a 64-bit register view.
    ///
    /// # Errors
    ///
    /// [`DelegateError::Register`] when the delegate does not back `register`.
    fn set_register(&mut self, register: Register, value: u64) -> Result<(), DelegateError>;

    /// Address of the instruction being executed.
    fn instruction_pointer(&self) -> u64;

    /// Moves the instruction pointer.
    fn set_instruction_pointer(&mut self, value: u64);

    /// Current NZCV flags.
    fn flags(&self) -> ConditionFlags;

    /// Replaces all four flags.
    fn set_flags(&mut self, flags: ConditionFlags);

    /// Reads one flag.
    fn flag(&self, flag: Flag) -> bool {
        self.flags().get(flag)
    }

    /// Writes one flag, leaving the others untouched.
    fn set_flag(&mut self, flag: Flag, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.set_flags(flags);
    }

    /// Handles `SVC`; `number` is the value of `X16`.
    ///
    /// # Errors
    ///
    /// [`DelegateError::Syscall`] when the call is rejected.
    fn trigger_syscall(&mut self, number: u64) -> Result<(), DelegateError>;
}
