use crate::bits;
use crate::shape::Family;

/// Outcome of the root selector on bits 28:25.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootClass {
    /// `0000`: reserved space.
    Reserved,
    /// `0001` and `0011`: unallocated.
    Unallocated,
    /// `0010`: scalable vector extension.
    ScalableVector,
    /// One of the instruction families.
    Family(Family),
}

impl RootClass {
    /// Returns `true` when words of this class never decode.
    #[must_use]
    pub const fn is_unallocated(self) -> bool {
        matches!(self, Self::Reserved | Self::Unallocated)
    }
}

/// Root selector rows as `(mask, pattern, class)` over the 4-bit `op1`
/// value. Rows are evaluated in order and the first match wins.
pub const ROOT_ENCODING_TABLE: &[(u32, u32, RootClass)] = &[
    (0b1111, 0b0000, RootClass::Reserved),
    (0b1111, 0b0001, RootClass::Unallocated),
    (0b1111, 0b0010, RootClass::ScalableVector),
    (0b1111, 0b0011, RootClass::Unallocated),
    (0b1110, 0b1000, RootClass::Family(Family::DataImmediate)),
    (0b1110, 0b1010, RootClass::Family(Family::BranchSystem)),
    (0b0101, 0b0100, RootClass::Family(Family::LoadStore)),
    (0b0111, 0b0101, RootClass::Family(Family::DataRegister)),
    (0b0111, 0b0111, RootClass::Family(Family::SimdFloatingPoint)),
];

/// Extracts the root selector `op1` (bits 28:25).
#[must_use]
pub const fn root_selector(word: u32) -> u32 {
    bits::extract(word, 25, 29)
}

/// Classifies a word by its root selector.
#[must_use]
pub fn classify_root(word: u32) -> RootClass {
    let op1 = root_selector(word);
    ROOT_ENCODING_TABLE
        .iter()
        .find_map(|(mask, pattern, class)| (op1 & mask == *pattern).then_some(*class))
        .unwrap_or(RootClass::Unallocated)
}

#[cfg(test)]
mod tests {
    use super::{classify_root, root_selector, RootClass, ROOT_ENCODING_TABLE};
    use crate::shape::Family;

    #[test]
    fn every_selector_value_is_classified_by_some_row() {
        for op1 in 0..16u32 {
            assert!(
                ROOT_ENCODING_TABLE
                    .iter()
                    .any(|(mask, pattern, _)| op1 & mask == *pattern),
                "op1 {op1:04b} has no row"
            );
        }
    }

    #[test]
    fn selector_reads_bits_28_to_25() {
        assert_eq!(root_selector(0x1E00_0000), 0xF);
        assert_eq!(root_selector(0xD280_00A0), 0b1001);
    }

    #[test]
    fn known_words_land_in_their_family() {
        assert_eq!(
            classify_root(0xD280_00A0),
            RootClass::Family(Family::DataImmediate)
        );
        assert_eq!(
            classify_root(0xD400_0001),
            RootClass::Family(Family::BranchSystem)
        );
        assert_eq!(
            classify_root(0xF940_0420),
            RootClass::Family(Family::LoadStore)
        );
        assert_eq!(
            classify_root(0x8B00_0000),
            RootClass::Family(Family::DataRegister)
        );
        assert_eq!(
            classify_root(0x1E20_1000),
            RootClass::Family(Family::SimdFloatingPoint)
        );
        assert_eq!(classify_root(0x0420_0000), RootClass::ScalableVector);
    }

    #[test]
    fn reserved_and_unallocated_space_never_decodes() {
        assert!(classify_root(0x0000_0000).is_unallocated());
        assert!(classify_root(0x0200_0000).is_unallocated());
        assert!(classify_root(0x0600_0000).is_unallocated());
        assert!(!classify_root(0x0400_0000).is_unallocated());
    }
}
