use std::fmt;

use super::{
    PgOutputDecoder, PgOutputMessage, ReplicationFrame, StandbyStatusUpdate, XLogDataHeader,
};
use crate::{
    Error, Result,
    common::{verbose, warning},
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{
        BackendMessage, NoticeResponse, ProtocolError,
        frontend::{CopyDone, Query},
    },
    types::Lsn,
};

/// `START_REPLICATION` command for the `pgoutput` plugin.
///
/// ```
/// use pgwire_codec::{replication::StartReplication, types::Lsn};
///
/// let cmd = StartReplication::new("app_slot", Lsn(0x16B3748))
///     .publication("users")
///     .streaming(true);
/// assert_eq!(
///     cmd.to_string(),
///     "START_REPLICATION SLOT \"app_slot\" LOGICAL 0/16B3748 \
///      (proto_version '2', publication_names '\"users\"', streaming 'on')",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StartReplication {
    slot: String,
    start: Lsn,
    publications: Vec<String>,
    proto_version: u32,
    messages: bool,
    streaming: bool,
    two_phase: bool,
}

impl StartReplication {
    /// Protocol version 2, which allows streaming of in progress transactions.
    pub fn new(slot: impl Into<String>, start: Lsn) -> Self {
        Self {
            slot: slot.into(),
            start,
            publications: vec![],
            proto_version: 2,
            messages: false,
            streaming: false,
            two_phase: false,
        }
    }

    pub fn publication(mut self, name: impl Into<String>) -> Self {
        self.publications.push(name.into());
        self
    }

    pub fn proto_version(mut self, version: u32) -> Self {
        self.proto_version = version;
        self
    }

    /// Include `pg_logical_emit_message` output.
    pub fn messages(mut self, enabled: bool) -> Self {
        self.messages = enabled;
        self
    }

    /// Stream transactions before they commit, needs version 2.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Decode prepared transactions, needs version 3.
    pub fn two_phase(mut self, enabled: bool) -> Self {
        self.two_phase = enabled;
        self
    }
}

impl fmt::Display for StartReplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "START_REPLICATION SLOT \"{}\" LOGICAL {} (proto_version '{}', publication_names '",
            self.slot.replace('"', "\"\""),
            self.start,
            self.proto_version,
        )?;
        for (i, name) in self.publications.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            // identifier quoting inside a string literal
            write!(f, "\"{}\"", name.replace('"', "\"\"").replace('\'', "''"))?;
        }
        f.write_str("'")?;
        if self.messages {
            f.write_str(", messages 'on'")?;
        }
        if self.streaming {
            f.write_str(", streaming 'on'")?;
        }
        if self.two_phase {
            f.write_str(", two_phase 'on'")?;
        }
        f.write_str(")")
    }
}

/// Logical replication session over an established copy both stream.
///
/// Keepalives that request a reply are answered with the last acknowledged position.
/// Server notices are collected until [`take_notices`][ReplicationStream::take_notices].
#[derive(Debug)]
pub struct ReplicationStream<R, W> {
    decoder: PgOutputDecoder<R>,
    writer: PgWriter<W>,
    received: Lsn,
    applied: Lsn,
    notices: Vec<NoticeResponse>,
}

impl<R, W> ReplicationStream<R, W> {
    pub fn new(reader: PgReader<R>, writer: PgWriter<W>) -> Self {
        Self {
            decoder: PgOutputDecoder::new(reader),
            writer,
            received: Lsn::INVALID,
            applied: Lsn::INVALID,
            notices: vec![],
        }
    }

    pub fn decoder(&self) -> &PgOutputDecoder<R> {
        &self.decoder
    }

    /// Highest WAL position received.
    pub fn received(&self) -> Lsn {
        self.received
    }

    /// Position reported as flushed and applied.
    pub fn applied(&self) -> Lsn {
        self.applied
    }

    /// Mark WAL up to `lsn` as processed, reported by the next status update.
    pub fn acknowledge(&mut self, lsn: Lsn) {
        self.applied = self.applied.max(lsn);
    }

    /// Notices received since the last call.
    pub fn take_notices(&mut self) -> Vec<NoticeResponse> {
        std::mem::take(&mut self.notices)
    }

    pub fn into_parts(self) -> (PgOutputDecoder<R>, PgWriter<W>) {
        (self.decoder, self.writer)
    }
}

impl<R: ReadSource, W: WriteSink> ReplicationStream<R, W> {
    /// Issue `START_REPLICATION` on an authenticated replication connection and wait for the
    /// copy both stream.
    ///
    /// Notices are kept for [`take_notices`][ReplicationStream::take_notices], a server error is
    /// returned as [`Database`][crate::ErrorKind::Database].
    pub async fn start(
        mut reader: PgReader<R>,
        mut writer: PgWriter<W>,
        command: &StartReplication,
    ) -> Result<Self> {
        let sql = command.to_string();
        verbose!(%sql, "start replication");
        writer.send(Query { sql: &sql }).await?;

        let mut notices = vec![];
        loop {
            match reader.recv::<BackendMessage>().await? {
                BackendMessage::CopyBothResponse(_) => break,
                BackendMessage::ErrorResponse(err) => return Err(err.into()),
                BackendMessage::NoticeResponse(notice) => {
                    warning!("{notice}");
                    notices.push(notice);
                }
                BackendMessage::ParameterStatus(_) => {}
                other => {
                    return Err(ProtocolError::unexpected_phase(other.msgtype(), "start replication").into());
                }
            }
        }

        let mut stream = Self::new(reader, writer);
        stream.received = command.start;
        stream.applied = command.start;
        stream.notices = notices;
        Ok(stream)
    }

    /// Next `pgoutput` message.
    ///
    /// Returns `None` when the server ends the copy stream.
    pub async fn next(&mut self) -> Result<Option<(XLogDataHeader, PgOutputMessage<'_, R>)>> {
        loop {
            match self.decoder.advance().await? {
                None => return Ok(None),
                Some(ReplicationFrame::Keepalive(keepalive)) => {
                    self.received = self.received.max(keepalive.wal_end);
                    if keepalive.reply_requested {
                        self.send_status(false).await?;
                    }
                }
                Some(ReplicationFrame::Notice(notice)) => {
                    warning!("{notice}");
                    self.notices.push(notice);
                }
                Some(ReplicationFrame::XLogData(header)) => {
                    self.received = self.received.max(header.wal_start);
                    return match self.decoder.message() {
                        Some(message) => Ok(Some((header, message))),
                        None => Err(Error::internal("xlog data decoded without message")),
                    };
                }
            }
        }
    }

    /// Report progress to the server.
    pub async fn send_status(&mut self, reply_requested: bool) -> Result<()> {
        let mut update = StandbyStatusUpdate::applied(self.applied);
        update.written = self.received.max(self.applied);
        update.reply_requested = reply_requested;
        verbose!(written = %update.written, applied = %update.applied, "standby status");
        self.writer.send(update).await
    }

    /// End the copy stream from the client side.
    pub async fn close(mut self) -> Result<PgOutputDecoder<R>> {
        self.send_status(false).await?;
        self.writer.send(CopyDone).await?;
        Ok(self.decoder)
    }
}
