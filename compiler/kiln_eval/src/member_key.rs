//! Dispatch key for baked members.
//!
//! A property contributes a `Get` and a `Set` entry, an event an `Add` and
//! a `Remove` entry, and a method a `Call` entry. Arity is part of the key
//! so overloads by parameter count dispatch separately.

use std::fmt;

use kiln_ir::{Name, StringInterner};

/// How a member is being accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessorKind {
    Get,
    Set,
    Add,
    Remove,
    Call,
}

impl AccessorKind {
    /// Special-name prefix of the accessor method (`get_`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            AccessorKind::Get => "get_",
            AccessorKind::Set => "set_",
            AccessorKind::Add => "add_",
            AccessorKind::Remove => "remove_",
            AccessorKind::Call => "",
        }
    }
}

/// Key of the baked dispatch table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub kind: AccessorKind,
    /// Property, event, or method name.
    pub name: Name,
    pub arity: u32,
}

impl MemberKey {
    #[inline]
    pub const fn new(kind: AccessorKind, name: Name, arity: u32) -> Self {
        Self { kind, name, arity }
    }

    /// Format the key for display (requires interner).
    pub fn display<'a>(&self, interner: &'a StringInterner) -> MemberKeyDisplay<'a> {
        MemberKeyDisplay {
            prefix: self.kind.prefix(),
            name: interner.lookup(self.name),
            arity: self.arity,
        }
    }
}

/// Helper for displaying a `MemberKey` with its resolved name.
pub struct MemberKeyDisplay<'a> {
    prefix: &'static str,
    name: &'a str,
    arity: u32,
}

impl fmt::Display for MemberKeyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.prefix, self.name, self.arity)
    }
}
