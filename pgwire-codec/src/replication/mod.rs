//! Logical replication with the `pgoutput` plugin.
//!
//! After [`StartReplication`] is accepted, the server answers with `CopyBothResponse` and
//! streams [`ReplicationFrame`]s.
//! [`PgOutputDecoder`] reads them from a [`PgReader`][crate::io::PgReader], and
//! [`ReplicationStream`] pairs it with a [`PgWriter`][crate::io::PgWriter] to report progress.
//!
//! Messages are borrowed from the decoder, so they cannot outlive the next read. Row data of
//! insert, update and delete stays on the wire until read through a [`ReplicationTuple`].
mod framing;
mod message;
mod tuple;
mod decoder;
mod stream;

pub use framing::{PrimaryKeepalive, StandbyStatusUpdate, XLogDataHeader};
pub use message::{
    BeginMessage, CommitMessage, DeleteKind, DeleteMessage, InsertMessage, LogicalMessage,
    OriginMessage, PgOutputMessage, PrepareMessage, RelationColumn, RelationMessage,
    ReplicaIdentity, RollbackPreparedMessage, StreamAbortMessage, StreamCommitMessage,
    StreamStartMessage, TruncateMessage, TypeMessage, UpdateKind, UpdateMessage,
};
pub use tuple::{ReplicationTuple, TupleData};
pub use decoder::{PgOutputDecoder, ReplicationEvent, ReplicationFrame};
pub use stream::{ReplicationStream, StartReplication};
