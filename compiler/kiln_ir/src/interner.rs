//! Sharded string interner for type and member names.
//!
//! One interner is shared by the type registry, the bakery, and every
//! baked type it produces, so a `Name` minted while declaring a type is
//! the same `Name` an instance looks members up by at call time. Strings
//! are spread over [`Name::SHARDS`] independently locked tables so that
//! concurrent bakes rarely contend.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};

use crate::Name;

/// Accessor prefixes and hook names every bake resolves.
#[rustfmt::skip]
const CONVENTIONS: &[&str] = &[
    "get_", "set_", "add_", "remove_",
    "Get", "Set", "Call", "Add", "Remove", "Init",
    "Before", "After", "AfterError",
    "BeforeGet", "AfterGet", "AfterErrorGet",
    "BeforeSet", "AfterSet", "AfterErrorSet",
    ".ctor",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    #[error("interner shard {shard} is full ({count} strings, limit {})", Name::MAX_INDEX)]
    ShardFull { shard: usize, count: usize },
}

#[derive(Default)]
struct Shard {
    index: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl Shard {
    fn find(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    fn insert(&mut self, shard: usize, s: &str) -> Result<u32, InternError> {
        let count = self.strings.len();
        let slot = u32::try_from(count)
            .ok()
            .filter(|slot| *slot <= Name::MAX_INDEX)
            .ok_or(InternError::ShardFull { shard, count })?;
        // Names live for the whole process; baked types hand them out as
        // `&'static str`.
        let stored: &'static str = Box::leak(s.into());
        self.strings.push(stored);
        self.index.insert(stored, slot);
        Ok(slot)
    }
}

/// Thread-safe string interner.
///
/// Reads take a shared lock on one shard; a miss upgrades to that shard's
/// write lock and checks again before inserting.
pub struct StringInterner {
    shards: [RwLock<Shard>; Name::SHARDS],
    count: AtomicUsize,
}

impl StringInterner {
    pub fn new() -> Self {
        let interner = StringInterner {
            shards: std::array::from_fn(|_| RwLock::new(Shard::default())),
            count: AtomicUsize::new(0),
        };
        // Slot zero of shard zero is reserved for `Name::EMPTY`.
        {
            let mut first = interner.shards[0].write();
            first.strings.push("");
            first.index.insert("", 0);
        }
        interner.count.store(1, Ordering::Relaxed);
        for name in CONVENTIONS {
            interner.intern(name);
        }
        interner
    }

    fn shard_of(s: &str) -> usize {
        if s.is_empty() {
            return 0;
        }
        let mut hasher = FxHasher::default();
        s.hash(&mut hasher);
        #[expect(clippy::cast_possible_truncation, reason = "masked to the shard count")]
        let hash = hasher.finish() as usize;
        hash & (Name::SHARDS - 1)
    }

    fn name_at(shard: usize, slot: u32) -> Name {
        #[expect(clippy::cast_possible_truncation, reason = "shard < Name::SHARDS")]
        let shard = shard as u32;
        Name::pack(shard, slot)
    }

    /// Intern `s`, failing only when its shard is full.
    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        if let Some(name) = self.get(s) {
            return Ok(name);
        }
        let shard = Self::shard_of(s);
        let mut table = self.shards[shard].write();
        if let Some(slot) = table.find(s) {
            return Ok(Self::name_at(shard, slot));
        }
        let slot = table.insert(shard, s)?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(Self::name_at(shard, slot))
    }

    /// Intern `s`.
    ///
    /// # Panics
    ///
    /// When a shard holds more than [`Name::MAX_INDEX`] strings.
    #[inline]
    pub fn intern(&self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|err| panic!("{err}"))
    }

    /// The `Name` of `s` if it was interned before; never inserts.
    ///
    /// Instances resolve member names through here, so probing for a member
    /// that does not exist leaves the interner unchanged.
    pub fn get(&self, s: &str) -> Option<Name> {
        let shard = Self::shard_of(s);
        let slot = self.shards[shard].read().find(s)?;
        Some(Self::name_at(shard, slot))
    }

    /// The string behind `name`; `""` for names from another interner.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.shards
            .get(name.shard())
            .and_then(|shard| shard.read().strings.get(name.index()).copied())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// True when only the empty string is present.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to one [`StringInterner`].
#[derive(Clone, Default)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &StringInterner {
        &self.0
    }
}

impl fmt::Debug for SharedInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedInterner({} names)", self.len())
    }
}
