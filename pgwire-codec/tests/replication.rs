use bytes::{BufMut, Bytes, BytesMut};
use pgwire_codec::{
    ErrorKind,
    io::{Chunked, PgReader, PgWriter, TokioIo},
    postgres::ProtocolError,
    replication::{
        DeleteKind, PgOutputDecoder, PgOutputMessage, ReplicaIdentity, ReplicationEvent,
        ReplicationStream, StartReplication, TupleData, UpdateKind,
    },
    types::Lsn,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const USERS: u32 = 16384;

fn copy_data(out: &mut BytesMut, payload: &[u8]) {
    out.put_u8(b'd');
    out.put_i32(payload.len() as i32 + 4);
    out.put_slice(payload);
}

fn xlog(out: &mut BytesMut, wal_start: u64, message: &[u8]) {
    let mut payload = BytesMut::new();
    payload.put_u8(b'w');
    payload.put_u64(wal_start);
    payload.put_u64(wal_start + 0x100);
    payload.put_i64(0);
    payload.put_slice(message);
    copy_data(out, &payload);
}

fn keepalive(out: &mut BytesMut, wal_end: u64, reply: bool) {
    let mut payload = BytesMut::new();
    payload.put_u8(b'k');
    payload.put_u64(wal_end);
    payload.put_i64(0);
    payload.put_u8(reply as u8);
    copy_data(out, &payload);
}

fn copy_done(out: &mut BytesMut) {
    out.put_u8(b'c');
    out.put_i32(4);
}

fn tuple(out: &mut BytesMut, columns: &[Option<&str>]) {
    out.put_i16(columns.len() as i16);
    for column in columns {
        match column {
            Some(text) => {
                out.put_u8(b't');
                out.put_i32(text.len() as i32);
                out.put_slice(text.as_bytes());
            }
            None => out.put_u8(b'n'),
        }
    }
}

fn begin(xid: u32) -> BytesMut {
    let mut msg = BytesMut::new();
    msg.put_u8(b'B');
    msg.put_u64(0x2000);
    msg.put_i64(0);
    msg.put_u32(xid);
    msg
}

fn commit() -> BytesMut {
    let mut msg = BytesMut::new();
    msg.put_u8(b'C');
    msg.put_u8(0);
    msg.put_u64(0x2000);
    msg.put_u64(0x2010);
    msg.put_i64(0);
    msg
}

fn relation(xid: Option<u32>) -> BytesMut {
    let mut msg = BytesMut::new();
    msg.put_u8(b'R');
    if let Some(xid) = xid {
        msg.put_u32(xid);
    }
    msg.put_u32(USERS);
    msg.put_slice(b"public\0users\0");
    msg.put_u8(b'f');
    msg.put_i16(2);
    msg.put_u8(1);
    msg.put_slice(b"id\0");
    msg.put_u32(23);
    msg.put_i32(-1);
    msg.put_u8(0);
    msg.put_slice(b"name\0");
    msg.put_u32(25);
    msg.put_i32(-1);
    msg
}

fn insert(oid: u32, id: &str, name: &str) -> BytesMut {
    let mut msg = BytesMut::new();
    msg.put_u8(b'I');
    msg.put_u32(oid);
    msg.put_u8(b'N');
    tuple(&mut msg, &[Some(id), Some(name)]);
    msg
}

fn transaction() -> Bytes {
    let mut out = BytesMut::new();
    xlog(&mut out, 0x1000, &begin(742));
    xlog(&mut out, 0x1010, &relation(None));
    xlog(&mut out, 0x1020, &insert(USERS, "1", "alice"));

    let mut update = BytesMut::new();
    update.put_u8(b'U');
    update.put_u32(USERS);
    update.put_u8(b'O');
    tuple(&mut update, &[Some("1"), Some("alice")]);
    update.put_u8(b'N');
    tuple(&mut update, &[Some("1"), Some("bob")]);
    xlog(&mut out, 0x1030, &update);

    let mut delete = BytesMut::new();
    delete.put_u8(b'D');
    delete.put_u32(USERS);
    delete.put_u8(b'K');
    tuple(&mut delete, &[Some("1"), None]);
    xlog(&mut out, 0x1040, &delete);

    xlog(&mut out, 0x1050, &commit());
    keepalive(&mut out, 0x1060, true);
    copy_done(&mut out);
    out.freeze()
}

fn text(value: &str) -> TupleData {
    TupleData::Text(Bytes::copy_from_slice(value.as_bytes()))
}

#[tokio::test]
async fn decode_transaction() {
    let reader = PgReader::with_capacity(Chunked::new(transaction(), 3), 16);
    let mut decoder = PgOutputDecoder::new(reader);

    let Some(ReplicationEvent::Message(header, PgOutputMessage::Begin(begin))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected begin");
    };
    assert_eq!(header.wal_start, Lsn(0x1000));
    assert_eq!(header.server_clock.year(), 2000);
    assert_eq!(begin.xid, 742);
    assert_eq!(begin.final_lsn, Lsn(0x2000));

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Relation(relation))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected relation");
    };
    assert_eq!(relation.name, "users");
    assert_eq!(relation.namespace, "public");
    assert_eq!(relation.replica_identity, ReplicaIdentity::Full);
    assert_eq!(relation.columns.len(), 2);
    assert!(relation.columns[0].is_key());
    assert!(!relation.columns[1].is_key());
    assert_eq!(relation.columns[1].type_oid, 25);

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Insert(mut insert))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected insert");
    };
    assert_eq!(insert.relation().oid, USERS);
    let mut row = insert.new_row().await.unwrap().unwrap();
    assert_eq!(row.len(), 2);
    let (column, data) = row.next_column().await.unwrap().unwrap();
    assert_eq!(column.name, "id");
    assert_eq!(data, text("1"));
    let (column, data) = row.next_column().await.unwrap().unwrap();
    assert_eq!(column.name, "name");
    assert_eq!(data, text("alice"));
    assert!(row.next_column().await.unwrap().is_none());
    assert!(insert.new_row().await.unwrap().is_none());

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Update(mut update))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected update");
    };
    assert_eq!(update.kind, UpdateKind::Full);
    let old = update.old_row().await.unwrap().unwrap().collect().await.unwrap();
    assert_eq!(old, [text("1"), text("alice")]);
    let new = update.new_row().await.unwrap().unwrap().collect().await.unwrap();
    assert_eq!(new, [text("1"), text("bob")]);

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Delete(mut delete))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected delete");
    };
    assert_eq!(delete.kind, DeleteKind::Key);
    let key = delete.old_row().await.unwrap().unwrap().collect().await.unwrap();
    assert_eq!(key, [text("1"), TupleData::Null]);

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Commit(commit))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected commit");
    };
    assert_eq!(commit.end_lsn, Lsn(0x2010));

    let Some(ReplicationEvent::Keepalive(keepalive)) = decoder.next().await.unwrap() else {
        panic!("expected keepalive");
    };
    assert_eq!(keepalive.wal_end, Lsn(0x1060));
    assert!(keepalive.reply_requested);

    assert!(decoder.next().await.unwrap().is_none());
    assert_eq!(decoder.relation(USERS).unwrap().name, "users");
}

#[tokio::test]
async fn unread_rows_are_skipped() {
    let data = transaction();
    let mut decoder = PgOutputDecoder::new(PgReader::new(&data[..]));

    let mut tags = vec![];
    loop {
        match decoder.next().await.unwrap() {
            Some(ReplicationEvent::Message(_, PgOutputMessage::Update(mut update))) => {
                tags.push(b'U');
                // read one column of the old row, then abandon the message
                let mut old = update.old_row().await.unwrap().unwrap();
                assert!(old.next_column().await.unwrap().is_some());
            }
            Some(ReplicationEvent::Message(_, message)) => tags.push(message.tag()),
            Some(ReplicationEvent::Keepalive(_)) => tags.push(b'k'),
            Some(ReplicationEvent::Notice(_)) => tags.push(b'N'),
            None => break,
        }
    }
    assert_eq!(tags, b"BRIUDCk");
}

#[tokio::test]
async fn new_row_skips_old_row() {
    let data = transaction();
    let mut decoder = PgOutputDecoder::new(PgReader::new(&data[..]));

    for _ in 0..4 {
        decoder.advance().await.unwrap();
    }
    let Some(PgOutputMessage::Update(mut update)) = decoder.message() else {
        panic!("expected update");
    };
    let new = update.new_row().await.unwrap().unwrap().collect().await.unwrap();
    assert_eq!(new, [text("1"), text("bob")]);
    assert!(update.old_row().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_relation_is_fatal() {
    let mut out = BytesMut::new();
    xlog(&mut out, 0x1000, &insert(99, "1", "alice"));
    let data = out.freeze();

    let mut decoder = PgOutputDecoder::new(PgReader::new(&data[..]));
    let err = decoder.next().await.unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Protocol(ProtocolError::UnknownRelation { oid: 99 })
    ));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn streamed_transaction_carries_xid() {
    let mut out = BytesMut::new();
    let mut start = BytesMut::new();
    start.put_u8(b'S');
    start.put_u32(900);
    start.put_u8(1);
    xlog(&mut out, 0x1000, &start);
    xlog(&mut out, 0x1010, &relation(Some(900)));

    let mut row = BytesMut::new();
    row.put_u8(b'I');
    row.put_u32(900);
    row.put_u32(USERS);
    row.put_u8(b'N');
    tuple(&mut row, &[Some("2"), None]);
    xlog(&mut out, 0x1020, &row);
    xlog(&mut out, 0x1030, b"E");
    xlog(&mut out, 0x1040, &insert(USERS, "3", "carol"));
    let data = out.freeze();

    let mut decoder = PgOutputDecoder::new(PgReader::new(&data[..]));

    let Some(ReplicationEvent::Message(_, PgOutputMessage::StreamStart(start))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected stream start");
    };
    assert_eq!(start.xid, 900);
    assert!(start.first_segment);
    assert!(decoder.in_stream());

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Relation(relation))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected relation");
    };
    assert_eq!(relation.xid, Some(900));

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Insert(mut insert))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected insert");
    };
    assert_eq!(insert.xid, Some(900));
    let row = insert.new_row().await.unwrap().unwrap().collect().await.unwrap();
    assert_eq!(row, [text("2"), TupleData::Null]);

    let Some(ReplicationEvent::Message(_, PgOutputMessage::StreamStop)) =
        decoder.next().await.unwrap()
    else {
        panic!("expected stream stop");
    };
    assert!(!decoder.in_stream());

    let Some(ReplicationEvent::Message(_, PgOutputMessage::Insert(insert))) =
        decoder.next().await.unwrap()
    else {
        panic!("expected insert");
    };
    assert_eq!(insert.xid, None);
}

#[tokio::test]
async fn stream_answers_keepalive() {
    let mut out = BytesMut::new();
    xlog(&mut out, 0x1000, &begin(7));
    keepalive(&mut out, 0x1800, true);
    xlog(&mut out, 0x1010, &commit());
    copy_done(&mut out);

    let (client, mut server) = tokio::io::duplex(4096);
    let (rd, wr) = tokio::io::split(client);
    server.write_all(&out).await.unwrap();

    let mut stream = ReplicationStream::new(PgReader::new(TokioIo(rd)), PgWriter::new(TokioIo(wr)));

    let Some((_, PgOutputMessage::Begin(begin))) = stream.next().await.unwrap() else {
        panic!("expected begin");
    };
    assert_eq!(begin.xid, 7);
    stream.acknowledge(Lsn(0x1000));

    let Some((header, PgOutputMessage::Commit(_))) = stream.next().await.unwrap() else {
        panic!("expected commit");
    };
    stream.acknowledge(header.wal_start);
    assert_eq!(stream.received(), Lsn(0x1800));
    assert!(stream.next().await.unwrap().is_none());
    stream.close().await.unwrap();

    let mut sent = [0u8; 39 * 2 + 5];
    server.read_exact(&mut sent).await.unwrap();

    let (reply, rest) = sent.split_at(39);
    assert_eq!(&reply[..6], b"d\0\0\0\x26r");
    assert_eq!(&reply[6..14], &0x1800u64.to_be_bytes());
    assert_eq!(&reply[22..30], &0x1000u64.to_be_bytes());
    assert_eq!(reply[38], 0);

    let (last, done) = rest.split_at(39);
    assert_eq!(&last[22..30], &0x1010u64.to_be_bytes());
    assert_eq!(done, b"c\0\0\0\x04");
}

fn backend(out: &mut BytesMut, msgtype: u8, body: &[u8]) {
    out.put_u8(msgtype);
    out.put_i32(body.len() as i32 + 4);
    out.put_slice(body);
}

#[tokio::test]
async fn start_replication_handshake() {
    let mut out = BytesMut::new();
    backend(&mut out, b'N', b"SWARNING\0Mslot is behind\0\0");
    backend(&mut out, b'S', b"server_version\017.2\0");
    backend(&mut out, b'W', b"\0\0\0");
    xlog(&mut out, 0x2000, &begin(12));
    copy_done(&mut out);

    let (client, mut server) = tokio::io::duplex(4096);
    let (rd, wr) = tokio::io::split(client);
    server.write_all(&out).await.unwrap();

    let command = StartReplication::new("cdc", Lsn(0x1F00))
        .publication("users")
        .publication("it's");
    let mut stream = ReplicationStream::start(
        PgReader::new(TokioIo(rd)),
        PgWriter::new(TokioIo(wr)),
        &command,
    )
    .await
    .unwrap();
    assert_eq!(stream.applied(), Lsn(0x1F00));
    let notices = stream.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].to_string(), "WARNING: slot is behind");

    let Some((_, PgOutputMessage::Begin(begin))) = stream.next().await.unwrap() else {
        panic!("expected begin");
    };
    assert_eq!(begin.xid, 12);
    assert!(stream.next().await.unwrap().is_none());

    let sql = "START_REPLICATION SLOT \"cdc\" LOGICAL 0/1F00 \
               (proto_version '2', publication_names '\"users\",\"it''s\"')";
    let mut sent = vec![0u8; 5 + sql.len() + 1];
    server.read_exact(&mut sent).await.unwrap();
    assert_eq!(sent[0], b'Q');
    assert_eq!(&sent[1..5], &(sql.len() as i32 + 5).to_be_bytes());
    assert_eq!(&sent[5..sent.len() - 1], sql.as_bytes());
}

#[tokio::test]
async fn start_replication_rejected() {
    let mut out = BytesMut::new();
    backend(&mut out, b'E', b"SERROR\0C42704\0Mreplication slot \"cdc\" does not exist\0\0");

    let (client, mut server) = tokio::io::duplex(4096);
    let (rd, wr) = tokio::io::split(client);
    server.write_all(&out).await.unwrap();

    let command = StartReplication::new("cdc", Lsn::INVALID);
    let err = ReplicationStream::start(PgReader::new(TokioIo(rd)), PgWriter::new(TokioIo(wr)), &command)
        .await
        .unwrap_err();
    let ErrorKind::Database(response) = err.kind() else {
        panic!("expected database error, found {err}");
    };
    assert_eq!(response.code().as_deref(), Some(&b"42704"[..]));
    assert!(!err.is_fatal());

    let mut out = BytesMut::new();
    backend(&mut out, b'Z', b"I");
    let (client, mut server) = tokio::io::duplex(4096);
    let (rd, wr) = tokio::io::split(client);
    server.write_all(&out).await.unwrap();
    let err = ReplicationStream::start(PgReader::new(TokioIo(rd)), PgWriter::new(TokioIo(wr)), &command)
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::Protocol(ProtocolError::Unexpected { found: b'Z', .. })
    ));
}
