//! Nullability annotations on properties and their declaring contexts.

/// Declared nullability of a reference-typed property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Nullability {
    /// No annotation.
    #[default]
    Oblivious,
    NotNullable,
    Nullable,
}

impl Nullability {
    /// Effective nullability: the property's own annotation wins over the
    /// declaring context's.
    #[must_use]
    pub fn or_context(self, context: Nullability) -> Nullability {
        match self {
            Nullability::Oblivious => context,
            annotated => annotated,
        }
    }

    #[inline]
    pub fn is_not_nullable(self) -> bool {
        matches!(self, Nullability::NotNullable)
    }
}
