/// Format code of a value on the wire.
///
/// Every converter in this crate reads and writes [`Binary`][PgFormat::Binary]. `Text` still
/// appears in replication messages, e.g. `CopyBothResponse` and `RowDescription` of replication
/// commands.
///
/// <https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgFormat {
    /// Code `0`.
    Text,
    /// Code `1`, integers in network byte order.
    Binary,
}

impl PgFormat {
    pub fn format_code(&self) -> u16 {
        match self {
            PgFormat::Text => 0,
            PgFormat::Binary => 1,
        }
    }

    /// `None` for codes other than `0` and `1`.
    pub fn from_code(code: u16) -> Option<PgFormat> {
        match code {
            0 => Some(PgFormat::Text),
            1 => Some(PgFormat::Binary),
            _ => None,
        }
    }
}
