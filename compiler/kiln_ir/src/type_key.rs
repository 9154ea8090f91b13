//! Registry handles for source types and implementation types.
//!
//! Keys are allocated sequentially by the `TypeRegistry` that issues them
//! and mean nothing to any other registry.

use std::fmt;

macro_rules! registry_key {
    ($(#[$doc:meta])* $key:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $key(u32);

        impl $key {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                $key(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Position in the issuing registry's table.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $key {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($key), self.0)
            }
        }
    };
}

registry_key!(
    /// An interface, mix-in, or class definition.
    TypeKey
);

registry_key!(
    /// An implementation type definition.
    ImplKey
);
