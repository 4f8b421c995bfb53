//! Declarative field descriptors over 32-bit instruction words.
//!
//! A [`FieldDescriptor`] is plain data: a bit range, an optional enforced
//! constant, a raw staging value and a [`Codec`] made of two free functions.
//! Shapes list their descriptors explicitly (see [`Layout`]), so a word is
//! decoded by loading every descriptor and encoded by [`merge`]-ing them.

use std::fmt;

use crate::bits;
use crate::condition::Condition;
use crate::error::EncodeError;
use crate::operand::{ExtendKind, ShiftKind};

/// Half-open bit range `[lo, hi)` inside a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BitRange {
    /// Lowest bit covered.
    pub lo: u32,
    /// One past the highest bit covered.
    pub hi: u32,
}

impl BitRange {
    /// Creates a range covering `[lo, hi)`.
    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Number of bits covered; zero for inverted ranges.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.hi.saturating_sub(self.lo)
    }

    /// Returns `true` when `0 <= lo <= hi <= 32`.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.lo <= self.hi && self.hi <= 32
    }

    /// In-place mask of the range.
    #[must_use]
    pub const fn mask(self) -> u32 {
        bits::range_mask(self.lo, self.hi)
    }

    /// Returns `true` when both ranges share at least one bit.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.width() > 0 && other.width() > 0 && self.lo < other.hi && other.lo < self.hi
    }
}

/// Decode and encode transforms for one field type.
///
/// `decode` receives the right-aligned raw bits and the field width;
/// `encode` returns raw bits which the descriptor truncates to its width.
pub struct Codec<T> {
    /// Raw bits to typed value. `None` marks a malformed or reserved value.
    pub decode: fn(u32, u32) -> Option<T>,
    /// Typed value to raw bits. `None` marks a value with no encoding.
    pub encode: fn(T, u32) -> Option<u32>,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Codec<T> {}

#[allow(clippy::unnecessary_wraps)]
mod transforms {
    use super::{bits, Condition, ExtendKind, ShiftKind};

    pub fn unsigned_decode(raw: u32, _width: u32) -> Option<u32> {
        Some(raw)
    }

    pub fn unsigned_encode(value: u32, _width: u32) -> Option<u32> {
        Some(value)
    }

    pub fn flag_decode(raw: u32, _width: u32) -> Option<bool> {
        Some(raw != 0)
    }

    pub fn flag_encode(value: bool, _width: u32) -> Option<u32> {
        Some(u32::from(value))
    }

    pub fn signed_decode(raw: u32, width: u32) -> Option<i64> {
        Some(bits::sign_extend(u64::from(raw), width))
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn signed_encode(value: i64, width: u32) -> Option<u32> {
        Some(bits::truncate(value as u64, width) as u32)
    }

    pub fn word_offset_decode(raw: u32, width: u32) -> Option<i64> {
        Some(bits::sign_extend(u64::from(raw), width) << 2)
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn word_offset_encode(value: i64, width: u32) -> Option<u32> {
        Some(bits::truncate((value >> 2) as u64, width) as u32)
    }

    pub fn condition_decode(raw: u32, _width: u32) -> Option<Condition> {
        u8::try_from(raw).ok().and_then(Condition::from_u4)
    }

    pub fn condition_encode(value: Condition, _width: u32) -> Option<u32> {
        Some(u32::from(value.as_u4()))
    }

    pub fn shift_decode(raw: u32, _width: u32) -> Option<ShiftKind> {
        u8::try_from(raw).ok().and_then(ShiftKind::from_u2)
    }

    pub fn shift_encode(value: ShiftKind, _width: u32) -> Option<u32> {
        Some(u32::from(value.as_u2()))
    }

    pub fn extend_decode(raw: u32, _width: u32) -> Option<ExtendKind> {
        u8::try_from(raw).ok().and_then(ExtendKind::from_u3)
    }

    pub fn extend_encode(value: ExtendKind, _width: u32) -> Option<u32> {
        Some(u32::from(value.as_u3()))
    }
}

/// Identity codec for unsigned integers.
pub const UNSIGNED: Codec<u32> = Codec {
    decode: transforms::unsigned_decode,
    encode: transforms::unsigned_encode,
};

/// Single-bit boolean codec.
pub const FLAG: Codec<bool> = Codec {
    decode: transforms::flag_decode,
    encode: transforms::flag_encode,
};

/// Two's-complement codec sign-extended from the field width.
pub const SIGNED: Codec<i64> = Codec {
    decode: transforms::signed_decode,
    encode: transforms::signed_encode,
};

/// Signed instruction-count codec: the byte offset is stored divided by 4.
pub const WORD_OFFSET: Codec<i64> = Codec {
    decode: transforms::word_offset_decode,
    encode: transforms::word_offset_encode,
};

/// Four-bit condition code table lookup.
pub const CONDITION: Codec<Condition> = Codec {
    decode: transforms::condition_decode,
    encode: transforms::condition_encode,
};

/// Two-bit shift kind table lookup.
pub const SHIFT: Codec<ShiftKind> = Codec {
    decode: transforms::shift_decode,
    encode: transforms::shift_encode,
};

/// Three-bit extend option table lookup.
pub const EXTEND: Codec<ExtendKind> = Codec {
    decode: transforms::extend_decode,
    encode: transforms::extend_encode,
};

/// One operand or constant inside a 32-bit word.
pub struct FieldDescriptor<T> {
    name: &'static str,
    range: BitRange,
    constant: Option<u32>,
    raw: u32,
    codec: Codec<T>,
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldDescriptor<T> {}

impl<T> PartialEq for FieldDescriptor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.range == other.range
            && self.constant == other.constant
            && self.raw == other.raw
    }
}

impl<T> Eq for FieldDescriptor<T> {}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("range", &self.range)
            .field("constant", &self.constant)
            .field("raw", &self.raw)
            .finish()
    }
}

impl<T> FieldDescriptor<T> {
    /// Creates a variable field over `[lo, hi)` with a zero staging value.
    #[must_use]
    pub const fn new(name: &'static str, lo: u32, hi: u32, codec: Codec<T>) -> Self {
        Self {
            name,
            range: BitRange::new(lo, hi),
            constant: None,
            raw: 0,
            codec,
        }
    }

    /// Creates a structural field whose value is fixed to `constant`.
    #[must_use]
    pub const fn enforced(
        name: &'static str,
        lo: u32,
        hi: u32,
        constant: u32,
        codec: Codec<T>,
    ) -> Self {
        Self {
            name,
            range: BitRange::new(lo, hi),
            constant: Some(constant),
            raw: constant,
            codec,
        }
    }

    /// Field name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Bit range within the word.
    #[must_use]
    pub const fn range(&self) -> BitRange {
        self.range
    }

    /// Enforced constant, if this field is a discriminator.
    #[must_use]
    pub const fn constant(&self) -> Option<u32> {
        self.constant
    }

    /// Returns `true` for structural constants.
    #[must_use]
    pub const fn is_enforced(&self) -> bool {
        self.constant.is_some()
    }

    /// Raw staging value, right-aligned.
    #[must_use]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Returns `true` unless a loaded constant field disagrees with its
    /// declared constant.
    #[must_use]
    pub fn confirms(&self) -> bool {
        self.constant.map_or(true, |constant| constant == self.raw)
    }

    /// Typed value decoded from the staging value.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        (self.codec.decode)(self.raw, self.range.width())
    }

    /// Stages raw bits, truncated to the field width. Enforced fields keep
    /// their constant.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_raw(&mut self, raw: u32) {
        if self.constant.is_none() {
            self.raw = bits::truncate(u64::from(raw), self.range.width()) as u32;
        }
    }

    /// Encodes `value` through the codec and stages it, truncating to the
    /// field width.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Unrepresentable`] when the codec has no encoding
    /// for `value`.
    pub fn set(&mut self, value: T) -> Result<(), EncodeError> {
        let raw = (self.codec.encode)(value, self.range.width())
            .ok_or(EncodeError::Unrepresentable { field: self.name })?;
        self.set_raw(raw);
        Ok(())
    }
}

/// Type-erased view of a staged field, ready to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField {
    /// Field name.
    pub name: &'static str,
    /// Bit range.
    pub range: BitRange,
    /// Staged raw value.
    pub value: u32,
    /// Whether the field is a structural constant.
    pub enforced: bool,
}

/// Object-safe access to a descriptor regardless of its value type.
pub trait Slot {
    /// Loads this field's bits from `word` into the staging value.
    fn load(&mut self, word: u32);

    /// Type-erased copy of the staged field.
    fn raw_field(&self) -> RawField;
}

impl<T> Slot for FieldDescriptor<T> {
    fn load(&mut self, word: u32) {
        self.raw = bits::extract(word, self.range.lo, self.range.hi);
    }

    fn raw_field(&self) -> RawField {
        RawField {
            name: self.name,
            range: self.range,
            value: self.raw,
            enforced: self.constant.is_some(),
        }
    }
}

/// Merges staged fields into one word.
///
/// # Errors
///
/// [`EncodeError::RangeMismatch`] when a range falls outside the word, and
/// [`EncodeError::Overlap`] when two ranges intersect. No partial word is
/// returned in either case.
pub fn merge(fields: &[RawField]) -> Result<u32, EncodeError> {
    let mut word = 0u32;
    for (index, field) in fields.iter().enumerate() {
        if !field.range.is_valid() {
            return Err(EncodeError::RangeMismatch {
                field: field.name,
                lo: field.range.lo,
                hi: field.range.hi,
            });
        }
        if let Some(prior) = fields[..index]
            .iter()
            .find(|prior| prior.range.overlaps(field.range))
        {
            return Err(EncodeError::Overlap {
                first: prior.name,
                second: field.name,
            });
        }
        word = bits::insert(word, field.range.lo, field.range.hi, field.value);
    }
    Ok(word)
}

/// A fixed, ordered list of descriptors making up one encoding.
///
/// Implementors list embedded parent layouts first, then their own fields.
pub trait Layout: Default {
    /// Descriptors in declaration order.
    fn slots(&self) -> Vec<&dyn Slot>;

    /// Mutable descriptors in declaration order.
    fn slots_mut(&mut self) -> Vec<&mut dyn Slot>;

    /// Staged fields in declaration order.
    fn fields(&self) -> Vec<RawField> {
        self.slots().iter().map(|slot| slot.raw_field()).collect()
    }

    /// Builds the layout from defaults, then loads every field from `word`.
    #[must_use]
    fn from_word(word: u32) -> Self {
        let mut layout = Self::default();
        for slot in layout.slots_mut() {
            slot.load(word);
        }
        layout
    }

    /// Returns `true` when every enforced constant matches its staged value.
    fn confirms(&self) -> bool {
        let declared = Self::default().fields();
        self.fields()
            .iter()
            .zip(declared)
            .all(|(staged, declared)| !staged.enforced || staged.value == declared.value)
    }

    /// Merges every field into a word.
    ///
    /// # Errors
    ///
    /// Propagates [`merge`] failures.
    fn encode(&self) -> Result<u32, EncodeError> {
        merge(&self.fields())
    }
}

/// Declares a layout struct with embedded parent layouts and descriptors.
///
/// Parents are listed first and contribute their fields ahead of the
/// struct's own, giving the ancestor-first order [`Layout`] promises.
macro_rules! layout {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( @parent $parent:ident: $parent_ty:ty = $parent_init:expr; )*
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty = $init:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            $(
                #[doc = concat!("Embedded `", stringify!($parent_ty), "` layout.")]
                pub $parent: $parent_ty,
            )*
            $(
                $(#[$field_meta])*
                pub $field: $crate::field::FieldDescriptor<$ty>,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $parent: $parent_init, )*
                    $( $field: $init, )*
                }
            }
        }

        impl $crate::field::Layout for $name {
            fn slots(&self) -> Vec<&dyn $crate::field::Slot> {
                #[allow(unused_mut)]
                let mut slots: Vec<&dyn $crate::field::Slot> = Vec::new();
                $( slots.extend(<$parent_ty as $crate::field::Layout>::slots(&self.$parent)); )*
                $( slots.push(&self.$field); )*
                slots
            }

            fn slots_mut(&mut self) -> Vec<&mut dyn $crate::field::Slot> {
                #[allow(unused_mut)]
                let mut slots: Vec<&mut dyn $crate::field::Slot> = Vec::new();
                $( slots.extend(<$parent_ty as $crate::field::Layout>::slots_mut(&mut self.$parent)); )*
                $( slots.push(&mut self.$field); )*
                slots
            }
        }
    };
}

pub(crate) use layout;

#[cfg(test)]
mod tests {
    use super::*;

    layout! {
        /// Small two-field layout used by the tests below.
        pub struct Sample {
            opcode: u32 = FieldDescriptor::enforced("opcode", 24, 32, 0xD2, UNSIGNED);
            payload: u32 = FieldDescriptor::new("payload", 0, 16, UNSIGNED);
        }
    }

    layout! {
        /// Layout embedding [`Sample`] ahead of its own field.
        pub struct Nested {
            @parent base: Sample = Sample::default();
            tag: u32 = FieldDescriptor::new("tag", 16, 20, UNSIGNED);
        }
    }

    #[test]
    fn parent_fields_come_first() {
        let names: Vec<_> = Nested::default().fields().iter().map(|f| f.name).collect();
        assert_eq!(names, ["opcode", "payload", "tag"]);

        let nested = Nested::from_word(0xD203_0042);
        assert_eq!(nested.base.payload.raw(), 0x42);
        assert_eq!(nested.tag.raw(), 0x3);
        assert!(nested.confirms());
        assert_eq!(nested.encode(), Ok(0xD203_0042));
    }

    #[test]
    fn merge_places_each_field_at_its_offset() {
        let mut sample = Sample::default();
        sample.payload.set_raw(0xBEEF);
        assert_eq!(sample.encode(), Ok(0xD200_BEEF));
    }

    #[test]
    fn enforced_fields_ignore_writes() {
        let mut sample = Sample::default();
        sample.opcode.set_raw(0);
        assert_eq!(sample.opcode.raw(), 0xD2);
        assert!(sample.opcode.set(7).is_ok());
        assert_eq!(sample.opcode.raw(), 0xD2);
    }

    #[test]
    fn set_truncates_to_field_width() {
        let mut field = FieldDescriptor::new("imm9", 12, 21, SIGNED);
        field.set(-1).expect("signed values always encode");
        assert_eq!(field.raw(), 0x1FF);
        assert_eq!(field.value(), Some(-1));
        field.set(300).expect("signed values always encode");
        assert_eq!(field.value(), Some(300 - 512));
    }

    #[test]
    fn word_offset_codec_scales_by_four() {
        let mut field = FieldDescriptor::new("imm19", 5, 24, WORD_OFFSET);
        field.set(-8).expect("encodable");
        assert_eq!(field.raw(), 0x7_FFFE);
        assert_eq!(field.value(), Some(-8));
    }

    #[test]
    fn loading_reads_constants_for_confirmation() {
        let sample = Sample::from_word(0x1100_0042);
        assert_eq!(sample.payload.raw(), 0x42);
        assert!(!sample.opcode.confirms());
        assert!(!sample.confirms());
        assert!(Sample::from_word(0xD200_0042).confirms());
    }

    #[test]
    fn merge_rejects_bad_ranges() {
        let out_of_word = RawField {
            name: "wide",
            range: BitRange::new(30, 33),
            value: 1,
            enforced: false,
        };
        assert_eq!(
            merge(&[out_of_word]),
            Err(EncodeError::RangeMismatch {
                field: "wide",
                lo: 30,
                hi: 33
            })
        );

        let first = RawField {
            name: "a",
            range: BitRange::new(0, 8),
            value: 1,
            enforced: false,
        };
        let second = RawField {
            name: "b",
            range: BitRange::new(4, 12),
            value: 1,
            enforced: false,
        };
        assert_eq!(
            merge(&[first, second]),
            Err(EncodeError::Overlap {
                first: "a",
                second: "b"
            })
        );
    }
}
