//! Lazily consumed row data of row change messages.
use bytes::Bytes;

use super::message::{RelationColumn, RelationMessage};
use crate::{
    Result,
    io::{PgReader, ReadSource},
    postgres::ProtocolError,
};

/// One column of a [`ReplicationTuple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleData {
    /// `n`, the column is NULL.
    Null,
    /// `u`, unchanged TOASTed value, the actual value is not sent.
    Unchanged,
    /// `t`, value in text format.
    Text(Bytes),
    /// `b`, value in binary format.
    Binary(Bytes),
}

impl TupleData {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Raw bytes of a text or binary value.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Text(b) | Self::Binary(b) => Some(b),
            Self::Null | Self::Unchanged => None,
        }
    }
}

/// Progress of the row data within the current message.
#[derive(Debug, Default)]
pub(crate) struct RowState {
    /// Reader position where the current message ends.
    pub(crate) end: u64,
    /// Tuples carried by the message.
    pub(crate) tuples: u8,
    /// Tuples whose column count has been read.
    pub(crate) started: u8,
    /// Columns left in the current tuple.
    pub(crate) columns: u16,
}

impl RowState {
    pub(crate) fn reset(&mut self, end: u64, tuples: u8) {
        *self = Self { end, tuples, started: 0, columns: 0 };
    }

    /// Bytes of the current message not yet consumed.
    pub(crate) fn remaining<S>(&self, reader: &PgReader<S>) -> u64 {
        self.end.saturating_sub(reader.position())
    }

    async fn read_column<S: ReadSource>(&mut self, reader: &mut PgReader<S>) -> Result<TupleData> {
        reader.ensure(1).await?;
        let data = match reader.read_u8() {
            b'n' => TupleData::Null,
            b'u' => TupleData::Unchanged,
            kind @ (b't' | b'b') => {
                reader.ensure(4).await?;
                let len = reader.read_i32();
                if len < 0 || len as u64 > self.remaining(reader) {
                    return Err(ProtocolError::malformed(format!(
                        "tuple column length {len} exceeds message"
                    ))
                    .into());
                }
                let value = reader.read_exact(len as usize).await?;
                match kind {
                    b't' => TupleData::Text(value),
                    _ => TupleData::Binary(value),
                }
            }
            kind => {
                return Err(ProtocolError::malformed(format!(
                    "unknown tuple column kind `{}`",
                    kind as char
                ))
                .into());
            }
        };
        self.columns -= 1;
        Ok(data)
    }

    /// Discard the rest of the current tuple.
    async fn drain<S: ReadSource>(&mut self, reader: &mut PgReader<S>) -> Result<()> {
        while self.columns > 0 {
            self.read_column(reader).await?;
        }
        Ok(())
    }

    /// Start the next tuple, every tuple after the first is preceded by a `N` marker.
    async fn begin<S: ReadSource>(
        &mut self,
        reader: &mut PgReader<S>,
        relation: &RelationMessage,
    ) -> Result<()> {
        if self.started > 0 {
            reader.ensure(1).await?;
            let marker = reader.read_u8();
            if marker != b'N' {
                return Err(ProtocolError::malformed(format!(
                    "expected new tuple marker, found `{}`",
                    marker as char
                ))
                .into());
            }
        }
        reader.ensure(2).await?;
        let columns = reader.read_i16();
        if columns < 0 || columns as usize != relation.columns.len() {
            return Err(ProtocolError::malformed(format!(
                "tuple has {columns} columns, relation `{}` has {}",
                relation.name,
                relation.columns.len(),
            ))
            .into());
        }
        self.columns = columns as u16;
        self.started += 1;
        Ok(())
    }
}

/// Row data of a row change message, read directly from the replication stream.
pub(crate) struct RowCursor<'a, S> {
    pub(crate) reader: &'a mut PgReader<S>,
    pub(crate) state: &'a mut RowState,
    pub(crate) relation: &'a RelationMessage,
}

impl<S: ReadSource> RowCursor<'_, S> {
    /// Tuple at `index` within the message.
    ///
    /// Earlier tuples are skipped. Returns `None` if that tuple does not exist or was already
    /// started.
    pub(crate) async fn tuple(&mut self, index: u8) -> Result<Option<ReplicationTuple<'_, S>>> {
        if index >= self.state.tuples || index < self.state.started {
            return Ok(None);
        }
        while self.state.started <= index {
            self.state.drain(&mut *self.reader).await?;
            self.state.begin(&mut *self.reader, self.relation).await?;
        }
        Ok(Some(ReplicationTuple {
            reader: &mut *self.reader,
            state: &mut *self.state,
            relation: self.relation,
            index: 0,
        }))
    }
}

/// Columns of one row, consumed in order.
///
/// A tuple that is not read to the end is skipped when the next tuple or the next replication
/// message is requested.
pub struct ReplicationTuple<'a, S> {
    reader: &'a mut PgReader<S>,
    state: &'a mut RowState,
    relation: &'a RelationMessage,
    index: usize,
}

impl<'a, S: ReadSource> ReplicationTuple<'a, S> {
    /// Number of columns in this tuple.
    pub fn len(&self) -> usize {
        self.relation.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relation.columns.is_empty()
    }

    /// Relation this row belongs to.
    pub fn relation(&self) -> &'a RelationMessage {
        self.relation
    }

    /// Read the next column.
    pub async fn next_column(&mut self) -> Result<Option<(&'a RelationColumn, TupleData)>> {
        if self.state.columns == 0 {
            return Ok(None);
        }
        let data = self.state.read_column(&mut *self.reader).await?;
        let relation: &'a RelationMessage = self.relation;
        let Some(column) = relation.columns.get(self.index) else {
            return Err(crate::Error::internal("tuple column count checked against relation"));
        };
        self.index += 1;
        Ok(Some((column, data)))
    }

    /// Read every remaining column.
    pub async fn collect(mut self) -> Result<Vec<TupleData>> {
        let mut columns = Vec::with_capacity(self.state.columns as usize);
        while let Some((_, data)) = self.next_column().await? {
            columns.push(data);
        }
        Ok(columns)
    }

    /// Discard the remaining columns.
    pub async fn skip(self) -> Result<()> {
        self.state.drain(self.reader).await
    }
}

impl<S> std::fmt::Debug for ReplicationTuple<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationTuple")
            .field("relation", &self.relation.name)
            .field("index", &self.index)
            .field("columns_left", &self.state.columns)
            .finish()
    }
}
