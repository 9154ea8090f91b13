//! Interned identifier for type, member, and field names.

use std::fmt;

/// Handle to a string in the [`StringInterner`](crate::StringInterner).
///
/// The high bits select the interner shard and the low bits index into
/// that shard's table. Member matching across an interface closure and
/// record field access are `u32` comparisons on these handles.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The empty string, interned by every interner at slot zero.
    pub const EMPTY: Name = Name(0);

    const SHARD_BITS: u32 = 4;
    const INDEX_BITS: u32 = 32 - Self::SHARD_BITS;

    /// Shards per interner.
    pub const SHARDS: usize = 1 << Self::SHARD_BITS;

    /// Largest index a single shard can hand out.
    pub const MAX_INDEX: u32 = (1 << Self::INDEX_BITS) - 1;

    #[inline]
    pub(crate) const fn pack(shard: u32, index: u32) -> Self {
        debug_assert!((shard as usize) < Self::SHARDS);
        debug_assert!(index <= Self::MAX_INDEX);
        Name((shard << Self::INDEX_BITS) | index)
    }

    #[inline]
    pub(crate) const fn shard(self) -> usize {
        (self.0 >> Self::INDEX_BITS) as usize
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        (self.0 & Self::MAX_INDEX) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({}:{})", self.shard(), self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_shard_and_index() {
        let name = Name::pack(7, 4242);
        assert_eq!((name.shard(), name.index()), (7, 4242));
        assert_eq!(format!("{name:?}"), "Name(7:4242)");
    }

    #[test]
    fn largest_index_fits_in_the_last_shard() {
        let name = Name::pack(15, Name::MAX_INDEX);
        assert_eq!(name.shard(), 15);
        assert_eq!(name.index(), Name::MAX_INDEX as usize);
        assert_eq!(name.raw(), u32::MAX);
    }

    #[test]
    fn default_is_empty() {
        assert_eq!(Name::default(), Name::EMPTY);
        assert_eq!(Name::EMPTY.raw(), 0);
    }
}
