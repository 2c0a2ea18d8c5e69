//! Streaming replication copy sub-protocol.
//!
//! Once `START_REPLICATION` succeeds, both directions exchange [`CopyData`][crate::postgres::backend::CopyData]
//! messages whose first byte tells the payload kind.
//!
//! <https://www.postgresql.org/docs/current/protocol-replication.html#PROTOCOL-REPLICATION-XLOGDATA>
use bytes::BufMut;
use time::UtcDateTime;

use crate::{
    Result,
    io::{PgReader, ReadSource},
    postgres::{FrontendProtocol, ProtocolError},
    types::{
        Lsn,
        datetime::{micros_to_utc, utc_to_micros},
    },
};

/// Header of WAL data, followed by a logical decoding message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XLogDataHeader {
    /// The starting point of the WAL data in this message.
    pub wal_start: Lsn,
    /// The current end of WAL on the server.
    pub wal_end: Lsn,
    /// The server's system clock at the time of transmission.
    pub server_clock: UtcDateTime,
}

impl XLogDataHeader {
    pub const TAG: u8 = b'w';
    pub(crate) const SIZE: usize = 8 + 8 + 8;

    pub(crate) async fn read<S: ReadSource>(reader: &mut PgReader<S>) -> Result<Self> {
        reader.ensure(Self::SIZE).await?;
        Ok(Self {
            wal_start: Lsn(reader.read_u64()),
            wal_end: Lsn(reader.read_u64()),
            server_clock: read_clock(reader)?,
        })
    }
}

/// Server heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryKeepalive {
    /// The current end of WAL on the server.
    pub wal_end: Lsn,
    /// The server's system clock at the time of transmission.
    pub server_clock: UtcDateTime,
    /// The client should reply to this message as soon as possible, to avoid a timeout
    /// disconnect.
    pub reply_requested: bool,
}

impl PrimaryKeepalive {
    pub const TAG: u8 = b'k';
    pub(crate) const SIZE: usize = 8 + 8 + 1;

    pub(crate) async fn read<S: ReadSource>(reader: &mut PgReader<S>) -> Result<Self> {
        reader.ensure(Self::SIZE).await?;
        Ok(Self {
            wal_end: Lsn(reader.read_u64()),
            server_clock: read_clock(reader)?,
            reply_requested: reader.read_u8() != 0,
        })
    }
}

/// Replication progress report, sent as frontend `CopyData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyStatusUpdate {
    /// The location of the last WAL byte + 1 received and written to disk in the standby.
    pub written: Lsn,
    /// The location of the last WAL byte + 1 flushed to disk in the standby.
    pub flushed: Lsn,
    /// The location of the last WAL byte + 1 applied in the standby.
    pub applied: Lsn,
    /// The client's system clock at the time of transmission.
    pub client_clock: UtcDateTime,
    /// Ask the server to reply to this message immediately.
    pub reply_requested: bool,
}

impl StandbyStatusUpdate {
    pub const TAG: u8 = b'r';

    /// Report the same position for written, flushed and applied, clocked now.
    pub fn applied(lsn: Lsn) -> Self {
        Self {
            written: lsn,
            flushed: lsn,
            applied: lsn,
            client_clock: UtcDateTime::now(),
            reply_requested: false,
        }
    }
}

impl FrontendProtocol for StandbyStatusUpdate {
    const MSGTYPE: u8 = b'd';

    fn size_hint(&self) -> u32 {
        1 + 8 + 8 + 8 + 8 + 1
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(Self::TAG);
        buf.put_u64(self.written.0);
        buf.put_u64(self.flushed.0);
        buf.put_u64(self.applied.0);
        // `UtcDateTime` is always representable in microseconds
        buf.put_i64(utc_to_micros(self.client_clock).unwrap_or_default());
        buf.put_u8(self.reply_requested as u8);
    }
}

/// Read postgres epoch microseconds, the caller must have buffered 8 bytes.
pub(crate) fn read_clock<S>(reader: &mut PgReader<S>) -> Result<UtcDateTime> {
    let micros = reader.read_i64();
    micros_to_utc(micros)
        .ok_or_else(|| ProtocolError::malformed(format!("clock {micros} out of range")).into())
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;
    use crate::{io::block_on, postgres::frontend};

    #[test]
    fn status_update_layout() {
        let mut update = StandbyStatusUpdate::applied(Lsn(0x1_0000_0002));
        update.client_clock = UtcDateTime::UNIX_EPOCH;
        update.reply_requested = true;

        let mut buf = BytesMut::new();
        frontend::write(update, &mut buf);
        assert_eq!(&buf[..6], b"d\0\0\0\x26r");
        assert_eq!(&buf[6..14], &0x1_0000_0002u64.to_be_bytes());
        // unix epoch is 30 years before postgres epoch
        assert_eq!(&buf[30..38], &(-946_684_800_000_000i64).to_be_bytes());
        assert_eq!(buf[38], 1);
        assert_eq!(buf.len(), 39);
    }

    #[test]
    fn keepalive() {
        let mut data = vec![];
        data.extend_from_slice(&7u64.to_be_bytes());
        data.extend_from_slice(&0i64.to_be_bytes());
        data.push(1);

        let mut reader = PgReader::new(&data[..]);
        let keepalive = block_on(PrimaryKeepalive::read(&mut reader)).unwrap();
        assert_eq!(keepalive.wal_end, Lsn(7));
        assert!(keepalive.reply_requested);
        assert_eq!(keepalive.server_clock.year(), 2000);
    }
}
