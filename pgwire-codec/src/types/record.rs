use bytes::Bytes;

use crate::postgres::Oid;

/// Anonymous composite value, `record`.
///
/// Field values are kept in their binary wire form, decode them with the converter of
/// their [`oid`][RecordField::oid].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<RecordField>,
}

/// Single column of a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub oid: Oid,
    /// `None` is sql `NULL`.
    pub value: Option<Bytes>,
}

impl Record {
    pub fn new(fields: Vec<RecordField>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
