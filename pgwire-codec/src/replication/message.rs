//! Logical replication messages of the `pgoutput` plugin.
//!
//! Messages without row data are decoded eagerly into a slot owned by the
//! [`PgOutputDecoder`][super::PgOutputDecoder] and handed out by reference, each slot is
//! overwritten by the next message of the same kind.
//!
//! <https://www.postgresql.org/docs/current/protocol-logicalrep-message-formats.html>
use bytes::Bytes;
use time::UtcDateTime;

use super::tuple::{ReplicationTuple, RowCursor};
use crate::{
    Result,
    io::ReadSource,
    postgres::Oid,
    types::Lsn,
};

/// Begin of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginMessage {
    /// The final LSN of the transaction.
    pub final_lsn: Lsn,
    /// Commit timestamp of the transaction.
    pub commit_timestamp: UtcDateTime,
    /// Xid of the transaction.
    pub xid: u32,
}

/// Commit of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    /// Flags, currently unused.
    pub flags: u8,
    /// The LSN of the commit.
    pub commit_lsn: Lsn,
    /// The end LSN of the transaction.
    pub end_lsn: Lsn,
    /// Commit timestamp of the transaction.
    pub commit_timestamp: UtcDateTime,
}

/// Origin of a transaction replayed from another node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginMessage {
    /// The LSN of the commit on the origin server.
    pub commit_lsn: Lsn,
    pub name: String,
}

/// Replica identity setting of a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplicaIdentity {
    /// `d`, primary key.
    #[default]
    Default,
    /// `n`, nothing.
    Nothing,
    /// `f`, all columns.
    Full,
    /// `i`, columns of a specific index.
    Index,
}

impl ReplicaIdentity {
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'd' => Some(Self::Default),
            b'n' => Some(Self::Nothing),
            b'f' => Some(Self::Full),
            b'i' => Some(Self::Index),
            _ => None,
        }
    }
}

/// Column of a [`RelationMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationColumn {
    /// `1` marks the column as part of the key.
    pub flags: u8,
    pub name: String,
    pub type_oid: Oid,
    pub type_modifier: i32,
}

impl RelationColumn {
    pub fn is_key(&self) -> bool {
        self.flags & 1 == 1
    }
}

/// Description of a table, sent before the first row change that references it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationMessage {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    pub oid: Oid,
    pub namespace: String,
    pub name: String,
    pub replica_identity: ReplicaIdentity,
    pub columns: Vec<RelationColumn>,
}

/// Description of a custom data type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMessage {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    pub oid: Oid,
    pub namespace: String,
    pub name: String,
}

/// Truncate of one or more relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TruncateMessage {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    /// `1` for `CASCADE`, `2` for `RESTART IDENTITY`.
    pub options: u8,
    pub relations: Vec<Oid>,
}

impl TruncateMessage {
    pub fn cascade(&self) -> bool {
        self.options & 1 != 0
    }

    pub fn restart_identity(&self) -> bool {
        self.options & 2 != 0
    }
}

/// Message emitted by `pg_logical_emit_message`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalMessage {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    /// `1` if the message is transactional.
    pub flags: u8,
    pub lsn: Lsn,
    pub prefix: String,
    pub content: Bytes,
}

/// Start of a block of a streamed in progress transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStartMessage {
    pub xid: u32,
    /// Whether this is the first block of the transaction.
    pub first_segment: bool,
}

/// Commit of a streamed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCommitMessage {
    pub xid: u32,
    pub flags: u8,
    pub commit_lsn: Lsn,
    pub end_lsn: Lsn,
    pub commit_timestamp: UtcDateTime,
}

/// Abort of a streamed transaction or one of its subtransactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAbortMessage {
    pub xid: u32,
    /// Equal to `xid` when the whole transaction is aborted.
    pub subtransaction_xid: u32,
}

/// Two phase commit control message.
///
/// Shared by begin prepare, prepare, commit prepared and stream prepare, the meaning of the two
/// positions and the timestamp depends on the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareMessage {
    pub flags: u8,
    /// Prepare LSN, or commit LSN of commit prepared.
    pub lsn: Lsn,
    /// End LSN of the prepared or committed transaction.
    pub end_lsn: Lsn,
    /// Prepare timestamp, or commit timestamp of commit prepared.
    pub timestamp: UtcDateTime,
    pub xid: u32,
    /// User defined global transaction identifier.
    pub gid: String,
}

/// Rollback of a prepared transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackPreparedMessage {
    pub flags: u8,
    pub prepare_end_lsn: Lsn,
    pub rollback_end_lsn: Lsn,
    pub prepare_timestamp: UtcDateTime,
    pub rollback_timestamp: UtcDateTime,
    pub xid: u32,
    pub gid: String,
}

/// Shape of an update, decided by the replica identity of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Only the new row.
    Default,
    /// Key columns of the old row, then the new row.
    Key,
    /// The whole old row, then the new row.
    Full,
}

/// Shape of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    /// Key columns of the deleted row.
    Key,
    /// The whole deleted row.
    Full,
}

/// Inserted row.
pub struct InsertMessage<'a, S> {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    pub(crate) rows: RowCursor<'a, S>,
}

impl<'a, S: ReadSource> InsertMessage<'a, S> {
    pub fn relation(&self) -> &'a RelationMessage {
        self.rows.relation
    }

    /// The inserted row, `None` once it has been started.
    pub async fn new_row(&mut self) -> Result<Option<ReplicationTuple<'_, S>>> {
        self.rows.tuple(0).await
    }
}

/// Updated row.
pub struct UpdateMessage<'a, S> {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    pub kind: UpdateKind,
    pub(crate) rows: RowCursor<'a, S>,
}

impl<'a, S: ReadSource> UpdateMessage<'a, S> {
    pub fn relation(&self) -> &'a RelationMessage {
        self.rows.relation
    }

    /// Key or old row, `None` for [`UpdateKind::Default`] or once it has been started.
    pub async fn old_row(&mut self) -> Result<Option<ReplicationTuple<'_, S>>> {
        match self.kind {
            UpdateKind::Default => Ok(None),
            UpdateKind::Key | UpdateKind::Full => self.rows.tuple(0).await,
        }
    }

    /// The new row, skipping the old row if it was not read.
    pub async fn new_row(&mut self) -> Result<Option<ReplicationTuple<'_, S>>> {
        let index = match self.kind {
            UpdateKind::Default => 0,
            UpdateKind::Key | UpdateKind::Full => 1,
        };
        self.rows.tuple(index).await
    }
}

/// Deleted row.
pub struct DeleteMessage<'a, S> {
    /// Xid of the streamed transaction.
    pub xid: Option<u32>,
    pub kind: DeleteKind,
    pub(crate) rows: RowCursor<'a, S>,
}

impl<'a, S: ReadSource> DeleteMessage<'a, S> {
    pub fn relation(&self) -> &'a RelationMessage {
        self.rows.relation
    }

    /// Key or whole old row, `None` once it has been started.
    pub async fn old_row(&mut self) -> Result<Option<ReplicationTuple<'_, S>>> {
        self.rows.tuple(0).await
    }
}

macro_rules! row_change_debug {
    ($($name:ident { $($field:ident),* }),*) => {$(
        impl<S> std::fmt::Debug for $name<'_, S> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("xid", &self.xid)
                    $(.field(stringify!($field), &self.$field))*
                    .field("relation", &self.rows.relation.name)
                    .finish()
            }
        }
    )*};
}

row_change_debug! {
    InsertMessage { },
    UpdateMessage { kind },
    DeleteMessage { kind }
}

/// A decoded `pgoutput` message.
///
/// Borrowed from the decoder, it must be dropped before the next message is requested.
#[derive(Debug)]
pub enum PgOutputMessage<'a, S> {
    Begin(&'a BeginMessage),
    Commit(&'a CommitMessage),
    Origin(&'a OriginMessage),
    Relation(&'a RelationMessage),
    Type(&'a TypeMessage),
    Insert(InsertMessage<'a, S>),
    Update(UpdateMessage<'a, S>),
    Delete(DeleteMessage<'a, S>),
    Truncate(&'a TruncateMessage),
    Logical(&'a LogicalMessage),
    StreamStart(&'a StreamStartMessage),
    StreamStop,
    StreamCommit(&'a StreamCommitMessage),
    StreamAbort(&'a StreamAbortMessage),
    BeginPrepare(&'a PrepareMessage),
    Prepare(&'a PrepareMessage),
    CommitPrepared(&'a PrepareMessage),
    RollbackPrepared(&'a RollbackPreparedMessage),
    StreamPrepare(&'a PrepareMessage),
}

impl<S> PgOutputMessage<'_, S> {
    /// Message tag on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Begin(_) => b'B',
            Self::Commit(_) => b'C',
            Self::Origin(_) => b'O',
            Self::Relation(_) => b'R',
            Self::Type(_) => b'Y',
            Self::Insert(_) => b'I',
            Self::Update(_) => b'U',
            Self::Delete(_) => b'D',
            Self::Truncate(_) => b'T',
            Self::Logical(_) => b'M',
            Self::StreamStart(_) => b'S',
            Self::StreamStop => b'E',
            Self::StreamCommit(_) => b'c',
            Self::StreamAbort(_) => b'A',
            Self::BeginPrepare(_) => b'b',
            Self::Prepare(_) => b'P',
            Self::CommitPrepared(_) => b'K',
            Self::RollbackPrepared(_) => b'r',
            Self::StreamPrepare(_) => b'p',
        }
    }
}
