//! Struct-like state blocks: implementation state and mix-in state.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{Fault, Name, Value, ValueType};

/// Field layout of a record, shared by every record of the same shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    /// Name of the type this layout belongs to (for diagnostics).
    name: Name,
    /// Fields in declaration order.
    fields: Vec<(Name, ValueType)>,
    /// Map from field name to index.
    field_indices: FxHashMap<Name, usize>,
}

impl RecordLayout {
    /// Create a layout from fields in declaration order.
    pub fn new(name: Name, fields: Vec<(Name, ValueType)>) -> Self {
        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(i, (field, _))| (*field, i))
            .collect();
        RecordLayout {
            name,
            fields,
            field_indices,
        }
    }

    /// Layout with no fields.
    pub fn empty(name: Name) -> Self {
        Self::new(name, Vec::new())
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    /// Get the index of a field by name.
    pub fn get_index(&self, field: Name) -> Option<usize> {
        self.field_indices.get(&field).copied()
    }

    /// Type of the field at `index`.
    pub fn field_type(&self, index: usize) -> Option<&ValueType> {
        self.fields.get(index).map(|(_, ty)| ty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Name, &ValueType)> + '_ {
        self.fields.iter().map(|(name, ty)| (*name, ty))
    }
}

/// A record value: one slot per layout field.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    layout: Arc<RecordLayout>,
    values: Vec<Value>,
}

impl Record {
    /// A record with every field at its type's zero value.
    pub fn zeroed(layout: Arc<RecordLayout>) -> Self {
        let values = layout.iter().map(|(_, ty)| Value::zero(ty)).collect();
        Record { layout, values }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Read a field by name.
    pub fn get(&self, field: Name) -> Result<&Value, Fault> {
        self.layout
            .get_index(field)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| Fault::no_field(field))
    }

    /// Write a field by name, checking the value against the field type.
    pub fn set(&mut self, field: Name, value: Value) -> Result<(), Fault> {
        let index = self
            .layout
            .get_index(field)
            .ok_or_else(|| Fault::no_field(field))?;
        self.set_at(index, value)
    }

    /// Read a field by position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Write a field by position, checking the value against the field type.
    pub fn set_at(&mut self, index: usize, value: Value) -> Result<(), Fault> {
        let ty = self
            .layout
            .field_type(index)
            .ok_or_else(|| Fault::internal(format!("record field index {index} out of range")))?;
        if !value.conforms_to(ty) {
            return Err(Fault::type_mismatch(&ty.to_string(), value.kind_name()));
        }
        self.values[index] = value;
        Ok(())
    }
}
