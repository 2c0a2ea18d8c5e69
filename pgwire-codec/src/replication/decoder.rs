use std::collections::HashMap;

use time::UtcDateTime;

use super::{
    framing::{PrimaryKeepalive, XLogDataHeader, read_clock},
    message::*,
    tuple::{RowCursor, RowState},
};
use crate::{
    Result,
    common::{verbose, warning},
    convert::MAX_PREALLOC,
    io::{PgReader, ReadSource},
    postgres::{
        BackendProtocol, ErrorResponse, NoticeResponse, Oid, ProtocolError,
        backend::{CopyData, CopyDone},
    },
    types::Lsn,
};

/// Replication copy stream frame.
#[derive(Debug)]
pub enum ReplicationFrame {
    /// WAL data, its message is available from [`PgOutputDecoder::message`].
    XLogData(XLogDataHeader),
    Keepalive(PrimaryKeepalive),
    /// Server warning sent between copy data, the stream continues.
    Notice(NoticeResponse),
}

/// Decoded frame, borrowed from the decoder.
#[derive(Debug)]
pub enum ReplicationEvent<'a, S> {
    Message(XLogDataHeader, PgOutputMessage<'a, S>),
    Keepalive(PrimaryKeepalive),
    Notice(NoticeResponse),
}

/// Message most recently decoded into a slot.
#[derive(Debug, Clone, Copy)]
enum Current {
    Begin,
    Commit,
    Origin,
    Relation(Oid),
    Type,
    Insert { xid: Option<u32>, relation: Oid },
    Update { xid: Option<u32>, relation: Oid, kind: UpdateKind },
    Delete { xid: Option<u32>, relation: Oid, kind: DeleteKind },
    Truncate,
    Logical,
    StreamStart,
    StreamStop,
    StreamCommit,
    StreamAbort,
    BeginPrepare,
    Prepare,
    CommitPrepared,
    RollbackPrepared,
    StreamPrepare,
}

impl Current {
    fn has_rows(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Update { .. } | Self::Delete { .. })
    }
}

/// One reusable message per kind.
#[derive(Debug)]
struct Slots {
    begin: BeginMessage,
    commit: CommitMessage,
    origin: OriginMessage,
    type_: TypeMessage,
    truncate: TruncateMessage,
    logical: LogicalMessage,
    stream_start: StreamStartMessage,
    stream_commit: StreamCommitMessage,
    stream_abort: StreamAbortMessage,
    begin_prepare: PrepareMessage,
    prepare: PrepareMessage,
    commit_prepared: PrepareMessage,
    rollback_prepared: RollbackPreparedMessage,
    stream_prepare: PrepareMessage,
}

impl Default for Slots {
    fn default() -> Self {
        const EPOCH: UtcDateTime = UtcDateTime::UNIX_EPOCH;
        let prepare = PrepareMessage {
            flags: 0,
            lsn: Lsn::INVALID,
            end_lsn: Lsn::INVALID,
            timestamp: EPOCH,
            xid: 0,
            gid: String::new(),
        };
        Self {
            begin: BeginMessage { final_lsn: Lsn::INVALID, commit_timestamp: EPOCH, xid: 0 },
            commit: CommitMessage {
                flags: 0,
                commit_lsn: Lsn::INVALID,
                end_lsn: Lsn::INVALID,
                commit_timestamp: EPOCH,
            },
            origin: OriginMessage { commit_lsn: Lsn::INVALID, name: String::new() },
            type_: TypeMessage::default(),
            truncate: TruncateMessage::default(),
            logical: LogicalMessage::default(),
            stream_start: StreamStartMessage { xid: 0, first_segment: false },
            stream_commit: StreamCommitMessage {
                xid: 0,
                flags: 0,
                commit_lsn: Lsn::INVALID,
                end_lsn: Lsn::INVALID,
                commit_timestamp: EPOCH,
            },
            stream_abort: StreamAbortMessage { xid: 0, subtransaction_xid: 0 },
            begin_prepare: prepare.clone(),
            prepare: prepare.clone(),
            commit_prepared: prepare.clone(),
            rollback_prepared: RollbackPreparedMessage {
                flags: 0,
                prepare_end_lsn: Lsn::INVALID,
                rollback_end_lsn: Lsn::INVALID,
                prepare_timestamp: EPOCH,
                rollback_timestamp: EPOCH,
                xid: 0,
                gid: String::new(),
            },
            stream_prepare: prepare,
        }
    }
}

/// `pgoutput` logical replication decoder.
///
/// Reads the copy stream that follows `START_REPLICATION ... LOGICAL`. Relation messages are
/// cached so later row changes can be resolved, and row data is left on the wire until the
/// caller reads it through a [`ReplicationTuple`][super::ReplicationTuple].
///
/// ```no_run
/// # async fn app(reader: pgwire_codec::io::PgReader<&[u8]>) -> pgwire_codec::Result<()> {
/// use pgwire_codec::replication::{PgOutputDecoder, PgOutputMessage, ReplicationEvent};
///
/// let mut decoder = PgOutputDecoder::new(reader);
/// while let Some(event) = decoder.next().await? {
///     if let ReplicationEvent::Message(_, PgOutputMessage::Insert(mut insert)) = event {
///         if let Some(row) = insert.new_row().await? {
///             println!("{:?}", row.collect().await?);
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PgOutputDecoder<S> {
    reader: PgReader<S>,
    relations: HashMap<Oid, RelationMessage>,
    slots: Slots,
    row: RowState,
    current: Option<Current>,
    in_stream: bool,
}

impl<S> PgOutputDecoder<S> {
    pub fn new(reader: PgReader<S>) -> Self {
        Self {
            reader,
            relations: HashMap::new(),
            slots: Slots::default(),
            row: RowState::default(),
            current: None,
            in_stream: false,
        }
    }

    /// Cached relation description.
    pub fn relation(&self, oid: Oid) -> Option<&RelationMessage> {
        self.relations.get(&oid)
    }

    /// Whether a streamed transaction block is in progress.
    pub fn in_stream(&self) -> bool {
        self.in_stream
    }

    pub fn get_ref(&self) -> &PgReader<S> {
        &self.reader
    }

    pub fn into_inner(self) -> PgReader<S> {
        self.reader
    }

    /// The message decoded by the last [`advance`][PgOutputDecoder::advance].
    pub fn message(&mut self) -> Option<PgOutputMessage<'_, S>> {
        let Self { reader, relations, slots, row, current, .. } = self;
        let message = match (*current)? {
            Current::Begin => PgOutputMessage::Begin(&slots.begin),
            Current::Commit => PgOutputMessage::Commit(&slots.commit),
            Current::Origin => PgOutputMessage::Origin(&slots.origin),
            Current::Relation(oid) => PgOutputMessage::Relation(relations.get(&oid)?),
            Current::Type => PgOutputMessage::Type(&slots.type_),
            Current::Insert { xid, relation } => PgOutputMessage::Insert(InsertMessage {
                xid,
                rows: RowCursor { reader, state: row, relation: relations.get(&relation)? },
            }),
            Current::Update { xid, relation, kind } => PgOutputMessage::Update(UpdateMessage {
                xid,
                kind,
                rows: RowCursor { reader, state: row, relation: relations.get(&relation)? },
            }),
            Current::Delete { xid, relation, kind } => PgOutputMessage::Delete(DeleteMessage {
                xid,
                kind,
                rows: RowCursor { reader, state: row, relation: relations.get(&relation)? },
            }),
            Current::Truncate => PgOutputMessage::Truncate(&slots.truncate),
            Current::Logical => PgOutputMessage::Logical(&slots.logical),
            Current::StreamStart => PgOutputMessage::StreamStart(&slots.stream_start),
            Current::StreamStop => PgOutputMessage::StreamStop,
            Current::StreamCommit => PgOutputMessage::StreamCommit(&slots.stream_commit),
            Current::StreamAbort => PgOutputMessage::StreamAbort(&slots.stream_abort),
            Current::BeginPrepare => PgOutputMessage::BeginPrepare(&slots.begin_prepare),
            Current::Prepare => PgOutputMessage::Prepare(&slots.prepare),
            Current::CommitPrepared => PgOutputMessage::CommitPrepared(&slots.commit_prepared),
            Current::RollbackPrepared => {
                PgOutputMessage::RollbackPrepared(&slots.rollback_prepared)
            }
            Current::StreamPrepare => PgOutputMessage::StreamPrepare(&slots.stream_prepare),
        };
        Some(message)
    }
}

impl<S: ReadSource> PgOutputDecoder<S> {
    /// Read the next decoded frame.
    ///
    /// Returns `None` when the server ends the copy stream.
    pub async fn next(&mut self) -> Result<Option<ReplicationEvent<'_, S>>> {
        match self.advance().await? {
            None => Ok(None),
            Some(ReplicationFrame::Keepalive(keepalive)) => {
                Ok(Some(ReplicationEvent::Keepalive(keepalive)))
            }
            Some(ReplicationFrame::Notice(notice)) => Ok(Some(ReplicationEvent::Notice(notice))),
            Some(ReplicationFrame::XLogData(header)) => match self.message() {
                Some(message) => Ok(Some(ReplicationEvent::Message(header, message))),
                None => Err(crate::Error::internal("xlog data decoded without message")),
            },
        }
    }

    /// Read the next frame, decoding WAL data into its slot.
    ///
    /// Row data left unread from the previous message is skipped.
    pub async fn advance(&mut self) -> Result<Option<ReplicationFrame>> {
        self.finish().await?;

        loop {
            let (msgtype, len) = self.reader.read_header().await?;
            let end = self.reader.position() + len as u64;

            match msgtype {
                CopyData::MSGTYPE => {
                    if len == 0 {
                        return Err(ProtocolError::malformed("empty copy data").into());
                    }
                    self.reader.ensure(1).await?;
                    let frame = match self.reader.read_u8() {
                        XLogDataHeader::TAG => {
                            let header = XLogDataHeader::read(&mut self.reader).await?;
                            self.decode(end).await?;
                            ReplicationFrame::XLogData(header)
                        }
                        PrimaryKeepalive::TAG => {
                            self.row.reset(end, 0);
                            ReplicationFrame::Keepalive(PrimaryKeepalive::read(&mut self.reader).await?)
                        }
                        kind => {
                            return Err(ProtocolError::malformed(format!(
                                "unknown replication copy data `{}`",
                                kind as char
                            ))
                            .into());
                        }
                    };
                    if self.reader.position() > end {
                        return Err(ProtocolError::malformed("replication message overruns copy data").into());
                    }
                    return Ok(Some(frame));
                }
                CopyDone::MSGTYPE => {
                    self.reader.skip(len).await?;
                    verbose!("replication copy done");
                    return Ok(None);
                }
                NoticeResponse::MSGTYPE => {
                    let body = self.reader.read_exact(len).await?;
                    let notice = NoticeResponse::decode(msgtype, body)?;
                    verbose!(%notice, "replication notice");
                    return Ok(Some(ReplicationFrame::Notice(notice)));
                }
                ErrorResponse::MSGTYPE => {
                    let body = self.reader.read_exact(len).await?;
                    return Err(ErrorResponse::decode(msgtype, body)?.into());
                }
                _ => return Err(ProtocolError::unexpected_phase(msgtype, "logical replication").into()),
            }
        }
    }

    /// Skip whatever the caller left of the current message.
    async fn finish(&mut self) -> Result<()> {
        let remaining = self.row.remaining(&self.reader);
        if remaining > 0 {
            if self.current.is_some_and(|c| c.has_rows()) {
                warning!("skipping {remaining} bytes of unconsumed replication tuple");
            }
            self.reader.skip(remaining as usize).await?;
        }
        self.row.reset(0, 0);
        self.current = None;
        Ok(())
    }

    async fn stream_xid(&mut self) -> Result<Option<u32>> {
        if !self.in_stream {
            return Ok(None);
        }
        self.reader.ensure(4).await?;
        Ok(Some(self.reader.read_u32()))
    }

    async fn relation_id(&mut self) -> Result<Oid> {
        self.reader.ensure(4).await?;
        let oid = self.reader.read_u32();
        if !self.relations.contains_key(&oid) {
            return Err(ProtocolError::unknown_relation(oid).into());
        }
        Ok(oid)
    }

    async fn marker(&mut self) -> Result<u8> {
        self.reader.ensure(1).await?;
        Ok(self.reader.read_u8())
    }

    async fn decode(&mut self, end: u64) -> Result<()> {
        self.reader.ensure(1).await?;
        let tag = self.reader.read_u8();
        let reader = &mut self.reader;
        let slots = &mut self.slots;

        let current = match tag {
            b'B' => {
                reader.ensure(20).await?;
                let slot = &mut slots.begin;
                slot.final_lsn = Lsn(reader.read_u64());
                slot.commit_timestamp = read_clock(reader)?;
                slot.xid = reader.read_u32();
                Current::Begin
            }
            b'C' => {
                reader.ensure(25).await?;
                let slot = &mut slots.commit;
                slot.flags = reader.read_u8();
                slot.commit_lsn = Lsn(reader.read_u64());
                slot.end_lsn = Lsn(reader.read_u64());
                slot.commit_timestamp = read_clock(reader)?;
                Current::Commit
            }
            b'O' => {
                reader.ensure(8).await?;
                slots.origin.commit_lsn = Lsn(reader.read_u64());
                slots.origin.name = reader.read_nul_string().await?;
                Current::Origin
            }
            b'R' => {
                let xid = self.stream_xid().await?;
                self.reader.ensure(4).await?;
                let oid = self.reader.read_u32();
                self.decode_relation(xid, oid).await?;
                Current::Relation(oid)
            }
            b'Y' => {
                let xid = self.stream_xid().await?;
                let reader = &mut self.reader;
                let slot = &mut self.slots.type_;
                reader.ensure(4).await?;
                slot.xid = xid;
                slot.oid = reader.read_u32();
                slot.namespace = reader.read_nul_string().await?;
                slot.name = reader.read_nul_string().await?;
                Current::Type
            }
            b'I' => {
                let xid = self.stream_xid().await?;
                let relation = self.relation_id().await?;
                match self.marker().await? {
                    b'N' => {}
                    m => return Err(unexpected_marker(tag, m)),
                }
                self.row.reset(end, 1);
                Current::Insert { xid, relation }
            }
            b'U' => {
                let xid = self.stream_xid().await?;
                let relation = self.relation_id().await?;
                let (kind, tuples) = match self.marker().await? {
                    b'N' => (UpdateKind::Default, 1),
                    b'K' => (UpdateKind::Key, 2),
                    b'O' => (UpdateKind::Full, 2),
                    m => return Err(unexpected_marker(tag, m)),
                };
                self.row.reset(end, tuples);
                Current::Update { xid, relation, kind }
            }
            b'D' => {
                let xid = self.stream_xid().await?;
                let relation = self.relation_id().await?;
                let kind = match self.marker().await? {
                    b'K' => DeleteKind::Key,
                    b'O' => DeleteKind::Full,
                    m => return Err(unexpected_marker(tag, m)),
                };
                self.row.reset(end, 1);
                Current::Delete { xid, relation, kind }
            }
            b'T' => {
                let xid = self.stream_xid().await?;
                let reader = &mut self.reader;
                let slot = &mut self.slots.truncate;
                reader.ensure(5).await?;
                let count = reader.read_i32();
                if count < 0 {
                    return Err(ProtocolError::malformed(format!("negative truncate relation count {count}")).into());
                }
                slot.xid = xid;
                slot.options = reader.read_u8();
                slot.relations.clear();
                slot.relations.reserve((count as usize).min(MAX_PREALLOC));
                for _ in 0..count {
                    reader.ensure(4).await?;
                    slot.relations.push(reader.read_u32());
                }
                Current::Truncate
            }
            b'M' => {
                let xid = self.stream_xid().await?;
                let reader = &mut self.reader;
                let slot = &mut self.slots.logical;
                reader.ensure(9).await?;
                slot.xid = xid;
                slot.flags = reader.read_u8();
                slot.lsn = Lsn(reader.read_u64());
                slot.prefix = reader.read_nul_string().await?;
                reader.ensure(4).await?;
                let len = reader.read_i32();
                if len < 0 || len as u64 > end.saturating_sub(reader.position()) {
                    return Err(ProtocolError::malformed(format!("logical message length {len} exceeds message")).into());
                }
                slot.content = reader.read_exact(len as usize).await?;
                Current::Logical
            }
            b'S' => {
                reader.ensure(5).await?;
                slots.stream_start.xid = reader.read_u32();
                slots.stream_start.first_segment = reader.read_u8() == 1;
                self.in_stream = true;
                Current::StreamStart
            }
            b'E' => {
                self.in_stream = false;
                Current::StreamStop
            }
            b'c' => {
                reader.ensure(29).await?;
                let slot = &mut slots.stream_commit;
                slot.xid = reader.read_u32();
                slot.flags = reader.read_u8();
                slot.commit_lsn = Lsn(reader.read_u64());
                slot.end_lsn = Lsn(reader.read_u64());
                slot.commit_timestamp = read_clock(reader)?;
                Current::StreamCommit
            }
            b'A' => {
                reader.ensure(8).await?;
                slots.stream_abort.xid = reader.read_u32();
                slots.stream_abort.subtransaction_xid = reader.read_u32();
                Current::StreamAbort
            }
            b'b' => {
                read_prepare(reader, &mut slots.begin_prepare, false).await?;
                Current::BeginPrepare
            }
            b'P' => {
                read_prepare(reader, &mut slots.prepare, true).await?;
                Current::Prepare
            }
            b'K' => {
                read_prepare(reader, &mut slots.commit_prepared, true).await?;
                Current::CommitPrepared
            }
            b'p' => {
                read_prepare(reader, &mut slots.stream_prepare, true).await?;
                Current::StreamPrepare
            }
            b'r' => {
                reader.ensure(37).await?;
                let slot = &mut slots.rollback_prepared;
                slot.flags = reader.read_u8();
                slot.prepare_end_lsn = Lsn(reader.read_u64());
                slot.rollback_end_lsn = Lsn(reader.read_u64());
                slot.prepare_timestamp = read_clock(reader)?;
                slot.rollback_timestamp = read_clock(reader)?;
                slot.xid = reader.read_u32();
                slot.gid = reader.read_nul_string().await?;
                Current::RollbackPrepared
            }
            tag => return Err(ProtocolError::unknown_replication(tag).into()),
        };

        verbose!(tag = %(tag as char), "pgoutput");
        if !current.has_rows() {
            self.row.reset(end, 0);
        }
        self.current = Some(current);
        Ok(())
    }

    async fn decode_relation(&mut self, xid: Option<u32>, oid: Oid) -> Result<()> {
        let Self { reader, relations, .. } = self;
        let relation = relations.entry(oid).or_default();
        relation.xid = xid;
        relation.oid = oid;
        relation.namespace = reader.read_nul_string().await?;
        relation.name = reader.read_nul_string().await?;

        reader.ensure(3).await?;
        let identity = reader.read_u8();
        relation.replica_identity = ReplicaIdentity::from_u8(identity).ok_or_else(|| {
            ProtocolError::malformed(format!("unknown replica identity `{}`", identity as char))
        })?;
        let count = reader.read_i16();
        if count < 0 {
            return Err(ProtocolError::malformed(format!("negative relation column count {count}")).into());
        }

        relation.columns.clear();
        relation.columns.reserve(count as usize);
        for _ in 0..count {
            reader.ensure(1).await?;
            let flags = reader.read_u8();
            let name = reader.read_nul_string().await?;
            reader.ensure(8).await?;
            relation.columns.push(RelationColumn {
                flags,
                name,
                type_oid: reader.read_u32(),
                type_modifier: reader.read_i32(),
            });
        }

        verbose!(oid, name = %relation.name, columns = count, "relation cached");
        Ok(())
    }
}

async fn read_prepare<S: ReadSource>(
    reader: &mut PgReader<S>,
    slot: &mut PrepareMessage,
    has_flags: bool,
) -> Result<()> {
    reader.ensure(28 + has_flags as usize).await?;
    slot.flags = match has_flags {
        true => reader.read_u8(),
        false => 0,
    };
    slot.lsn = Lsn(reader.read_u64());
    slot.end_lsn = Lsn(reader.read_u64());
    slot.timestamp = read_clock(reader)?;
    slot.xid = reader.read_u32();
    slot.gid = reader.read_nul_string().await?;
    Ok(())
}

fn unexpected_marker(tag: u8, marker: u8) -> crate::Error {
    ProtocolError::malformed(format!(
        "unexpected tuple marker `{}` in `{}` message",
        marker as char, tag as char
    ))
    .into()
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::{ErrorKind, io::block_on};

    fn frame(out: &mut BytesMut, msgtype: u8, body: &[u8]) {
        out.put_u8(msgtype);
        out.put_i32(body.len() as i32 + 4);
        out.put_slice(body);
    }

    fn xlog(out: &mut BytesMut, message: &[u8]) {
        let mut body = BytesMut::new();
        body.put_u8(b'w');
        body.put_u64(1);
        body.put_u64(2);
        body.put_i64(0);
        body.put_slice(message);
        frame(out, b'd', &body);
    }

    #[test]
    fn truncate_and_logical() {
        let mut out = BytesMut::new();
        let mut msg = BytesMut::new();
        msg.put_u8(b'T');
        msg.put_i32(2);
        msg.put_u8(3);
        msg.put_u32(10);
        msg.put_u32(11);
        xlog(&mut out, &msg);

        let mut msg = BytesMut::new();
        msg.put_u8(b'M');
        msg.put_u8(1);
        msg.put_u64(0x30);
        msg.put_slice(b"audit\0");
        msg.put_i32(5);
        msg.put_slice(b"hello");
        xlog(&mut out, &msg);

        let mut decoder = PgOutputDecoder::new(PgReader::new(&out[..]));

        block_on(decoder.advance()).unwrap();
        let Some(PgOutputMessage::Truncate(truncate)) = decoder.message() else {
            panic!("expected truncate");
        };
        assert_eq!(truncate.relations, [10, 11]);
        assert!(truncate.cascade());
        assert!(truncate.restart_identity());
        assert_eq!(truncate.xid, None);

        block_on(decoder.advance()).unwrap();
        let Some(PgOutputMessage::Logical(logical)) = decoder.message() else {
            panic!("expected logical message");
        };
        assert_eq!(logical.lsn, Lsn(0x30));
        assert_eq!(logical.prefix, "audit");
        assert_eq!(&logical.content[..], b"hello");
    }

    #[test]
    fn two_phase() {
        let mut out = BytesMut::new();
        let mut msg = BytesMut::new();
        msg.put_u8(b'b');
        msg.put_u64(0x10);
        msg.put_u64(0x20);
        msg.put_i64(0);
        msg.put_u32(5);
        msg.put_slice(b"tx1\0");
        xlog(&mut out, &msg);

        let mut msg = BytesMut::new();
        msg.put_u8(b'r');
        msg.put_u8(0);
        msg.put_u64(0x20);
        msg.put_u64(0x40);
        msg.put_i64(0);
        msg.put_i64(1_000_000);
        msg.put_u32(5);
        msg.put_slice(b"tx1\0");
        xlog(&mut out, &msg);

        let mut decoder = PgOutputDecoder::new(PgReader::new(&out[..]));

        block_on(decoder.advance()).unwrap();
        let Some(PgOutputMessage::BeginPrepare(prepare)) = decoder.message() else {
            panic!("expected begin prepare");
        };
        assert_eq!(prepare.lsn, Lsn(0x10));
        assert_eq!(prepare.end_lsn, Lsn(0x20));
        assert_eq!(prepare.gid, "tx1");

        block_on(decoder.advance()).unwrap();
        let Some(PgOutputMessage::RollbackPrepared(rollback)) = decoder.message() else {
            panic!("expected rollback prepared");
        };
        assert_eq!(rollback.rollback_end_lsn, Lsn(0x40));
        assert_eq!(rollback.rollback_timestamp.second(), 1);
        assert_eq!(rollback.xid, 5);
    }

    #[test]
    fn server_error_ends_stream() {
        let mut out = BytesMut::new();
        frame(&mut out, b'N', b"SWARNING\0Mslow\0\0");
        frame(&mut out, b'E', b"SERROR\0C57P01\0Mterminating\0\0");

        let mut decoder = PgOutputDecoder::new(PgReader::new(&out[..]));
        let Some(ReplicationFrame::Notice(notice)) = block_on(decoder.advance()).unwrap() else {
            panic!("expected notice");
        };
        assert_eq!(notice.message().as_deref(), Some(&b"slow"[..]));
        assert!(decoder.message().is_none());

        let err = block_on(decoder.advance()).unwrap_err();
        let ErrorKind::Database(response) = err.kind() else {
            panic!("expected database error, found {err}");
        };
        assert_eq!(response.to_string(), "ERROR 57P01: terminating");
        assert!(!err.is_fatal());
    }

    #[test]
    fn unknown_messages_are_fatal() {
        let mut out = BytesMut::new();
        xlog(&mut out, b"Z");
        let mut decoder = PgOutputDecoder::new(PgReader::new(&out[..]));
        let err = block_on(decoder.advance()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::UnknownReplication { tag: b'Z' })));
        assert!(err.is_fatal());

        let mut out = BytesMut::new();
        frame(&mut out, b'Z', b"I");
        let mut decoder = PgOutputDecoder::new(PgReader::new(&out[..]));
        let err = block_on(decoder.advance()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::Unexpected { found: b'Z', .. })));
    }
}
