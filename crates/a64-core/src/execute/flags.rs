//! Flag side effects recorded during execution.

use crate::flags::ConditionFlags;

/// How the NZCV flags change when an instruction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagsUpdate {
    /// No change.
    #[default]
    None,
    /// Replace all four flags.
    Set(ConditionFlags),
}

impl FlagsUpdate {
    /// `Set(flags)` when `sets_flags`, otherwise `None`.
    #[must_use]
    pub const fn when(sets_flags: bool, flags: ConditionFlags) -> Self {
        if sets_flags {
            Self::Set(flags)
        } else {
            Self::None
        }
    }
}
