//! Backend messages of a replication session.
//!
//! Covers the authentication challenges a driver answers, then what the server sends on a
//! `replication=database` connection: command results, the copy both stream, and
//! asynchronous reports.
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{Buf, Bytes};
use std::fmt;

use super::{Oid, PgFormat, ProtocolError};
use crate::ext::{BytesExt, FmtExt};

/// A type that can be decoded from a backend message body.
pub trait BackendProtocol: Sized {
    fn decode(msgtype: u8, body: Bytes) -> Result<Self,ProtocolError>;
}

/// Any backend message of a replication session.
#[derive(Debug)]
pub enum BackendMessage {
    Authentication(Authentication),
    BackendKeyData(BackendKeyData),
    CommandComplete(CommandComplete),
    CopyBothResponse(CopyBothResponse),
    CopyData(CopyData),
    CopyDone(CopyDone),
    DataRow(DataRow),
    EmptyQueryResponse(EmptyQueryResponse),
    ErrorResponse(ErrorResponse),
    NoticeResponse(NoticeResponse),
    ParameterStatus(ParameterStatus),
    ReadyForQuery(ReadyForQuery),
    RowDescription(RowDescription),
}

macro_rules! match_backend {
    ($($name:ident,)*) => {
        impl BackendMessage {
            pub fn msgtype(&self) -> u8 {
                match self {
                    $(Self::$name(_) => $name::MSGTYPE,)*
                }
            }

            /// Name of a message type, `"Unknown"` if it is not part of a replication session.
            pub fn message_name(msgtype: u8) -> &'static str {
                match msgtype {
                    $($name::MSGTYPE => stringify!($name),)*
                    _ => "Unknown",
                }
            }
        }

        impl BackendProtocol for BackendMessage {
            fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError> {
                let message = match msgtype {
                    $($name::MSGTYPE => Self::$name(<$name as BackendProtocol>::decode(msgtype, body)?),)*
                    _ => return Err(ProtocolError::unknown(msgtype)),
                };
                Ok(message)
            }
        }
    };
}

match_backend! {
    Authentication,
    BackendKeyData,
    CommandComplete,
    CopyBothResponse,
    CopyData,
    CopyDone,
    DataRow,
    EmptyQueryResponse,
    ErrorResponse,
    NoticeResponse,
    ParameterStatus,
    ReadyForQuery,
    RowDescription,
}

macro_rules! assert_msgtype {
    ($typ:ident) => {
        if Self::MSGTYPE != $typ {
            return Err(ProtocolError::unexpected(Self::MSGTYPE,$typ))
        }
    };
}

macro_rules! assert_len {
    ($body:ident, $len:expr) => {
        if $body.remaining() < $len {
            return Err(ProtocolError::malformed(format!(
                "{} needs {} bytes, found {}",
                BackendMessage::message_name(Self::MSGTYPE),
                $len,
                $body.remaining(),
            )))
        }
    };
}

/// Authentication challenge, or its outcome.
///
/// Only the codes a driver can answer are decoded, the mechanisms themselves live elsewhere.
#[derive(Debug, PartialEq, Eq)]
pub enum Authentication {
    Ok,
    CleartextPassword,
    /// Hash the password with this salt, `md5(md5(password + user) + salt)`.
    MD5Password { salt: [u8; 4] },
    GSS,
    SSPI,
    /// GSS or SSPI token.
    GSSContinue { data: Bytes },
    /// SASL mechanisms the server accepts, most preferred first.
    SASL { mechanisms: Vec<String> },
    SASLContinue { data: Bytes },
    SASLFinal { data: Bytes },
}

impl Authentication {
    pub const MSGTYPE: u8 = b'R';
}

impl BackendProtocol for Authentication {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 4);
        let auth = match body.get_u32() {
            0 => Self::Ok,
            3 => Self::CleartextPassword,
            5 => {
                assert_len!(body, 4);
                let mut salt = [0u8; 4];
                body.copy_to_slice(&mut salt);
                Self::MD5Password { salt }
            }
            7 => Self::GSS,
            8 => Self::GSSContinue { data: body },
            9 => Self::SSPI,
            10 => {
                let mut mechanisms = vec![];
                loop {
                    let name = body.get_nul_string()?;
                    if name.is_empty() {
                        break;
                    }
                    mechanisms.push(name);
                }
                Self::SASL { mechanisms }
            }
            11 => Self::SASLContinue { data: body },
            12 => Self::SASLFinal { data: body },
            code => return Err(ProtocolError::unknown_auth(code)),
        };
        Ok(auth)
    }
}

/// Key for a later cancel request.
#[derive(Debug)]
pub struct BackendKeyData {
    pub process_id: u32,
    pub secret_key: u32,
}

impl BackendKeyData {
    pub const MSGTYPE: u8 = b'K';
}

impl BackendProtocol for BackendKeyData {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 8);
        Ok(Self {
            process_id: body.get_u32(),
            secret_key: body.get_u32(),
        })
    }
}

/// Server setting report, sent at startup and whenever a reported setting changes.
#[derive(Debug)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String
}

impl ParameterStatus {
    pub const MSGTYPE: u8 = b'S';
}

impl BackendProtocol for ParameterStatus {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            name: body.get_nul_string()?,
            value: body.get_nul_string()?,
        })
    }
}

/// Transaction state reported by [`ReadyForQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// `I`
    Idle,
    /// `T`
    Transaction,
    /// `E`, commands are rejected until the block ends.
    Failed,
}

/// The server finished a command, including the end of a replication stream.
#[derive(Debug)]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

impl ReadyForQuery {
    pub const MSGTYPE: u8 = b'Z';
}

impl BackendProtocol for ReadyForQuery {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 1);
        let status = match body.get_u8() {
            b'I' => TransactionStatus::Idle,
            b'T' => TransactionStatus::Transaction,
            b'E' => TransactionStatus::Failed,
            s => return Err(ProtocolError::malformed(format!("unknown transaction status `{}`", s as char))),
        };
        Ok(Self { status })
    }
}

macro_rules! field_message {
    ($(#[$doc:meta])* $name:ident, $ty:literal) => {
        $(#[$doc])*
        pub struct $name {
            pub body: Bytes,
        }

        impl $name {
            pub const MSGTYPE: u8 = $ty;

            /// Iterate `(code, value)` fields.
            pub fn fields(&self) -> Fields {
                Fields { body: self.body.clone() }
            }

            fn field(&self, code: u8) -> Option<Bytes> {
                self.fields().find(|(c,_)|*c == code).map(|(_,v)|v)
            }

            /// `S`, localized severity.
            pub fn severity(&self) -> Option<Bytes> {
                self.field(b'S')
            }

            /// `C`, SQLSTATE code.
            pub fn code(&self) -> Option<Bytes> {
                self.field(b'C')
            }

            /// `M`, primary message.
            pub fn message(&self) -> Option<Bytes> {
                self.field(b'M')
            }

            /// `D`, optional detail.
            pub fn detail(&self) -> Option<Bytes> {
                self.field(b'D')
            }
        }

        impl BackendProtocol for $name {
            fn decode(msgtype: u8, body: Bytes) -> Result<Self,ProtocolError> {
                assert_msgtype!(msgtype);
                Ok(Self { body })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.severity() {
                    Some(severity) => write!(f, "{}", severity.lossy())?,
                    None => f.write_str(stringify!($name))?,
                }
                if let Some(code) = self.code() {
                    write!(f, " {}", code.lossy())?;
                }
                if let Some(message) = self.message() {
                    write!(f, ": {}", message.lossy())?;
                }
                if let Some(detail) = self.detail() {
                    write!(f, " ({})", detail.lossy())?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

field_message! {
    /// Warning from the server, the session continues.
    NoticeResponse, b'N'
}

field_message! {
    /// Error from the server, the current command is aborted.
    ErrorResponse, b'E'
}

impl std::error::Error for ErrorResponse { }

/// Iterator of [`ErrorResponse`] or [`NoticeResponse`] fields.
pub struct Fields {
    body: Bytes,
}

impl Iterator for Fields {
    type Item = (u8, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.body.has_remaining() {
            return None;
        }
        match self.body.get_u8() {
            0 => None,
            code => self.body.get_nul_bytes().ok().map(|value|(code,value)),
        }
    }
}

/// Columns of the rows a replication command returns, such as `IDENTIFY_SYSTEM`.
#[derive(Debug)]
pub struct RowDescription {
    pub field_len: u16,
    /// Field descriptions, decoded lazily by [`fields`][RowDescription::fields].
    pub body: Bytes,
}

impl RowDescription {
    pub const MSGTYPE: u8 = b'T';

    pub fn fields(&self) -> FieldDescriptions {
        FieldDescriptions { remaining: self.field_len, body: self.body.clone() }
    }
}

impl BackendProtocol for RowDescription {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 2);
        Ok(Self {
            field_len: body.get_u16(),
            body,
        })
    }
}

/// One column of a [`RowDescription`].
#[derive(Debug)]
pub struct FieldDescription {
    pub name: String,
    /// Zero if the column is not from a table.
    pub table_oid: Oid,
    pub column_id: i16,
    pub type_oid: Oid,
    /// Negative for variable width types.
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: PgFormat,
}

/// Iterator of [`FieldDescription`].
pub struct FieldDescriptions {
    remaining: u16,
    body: Bytes,
}

impl Iterator for FieldDescriptions {
    type Item = Result<FieldDescription, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        // table_oid, column_id, type_oid, type_size, type_modifier, format_code
        const SUFFIX: usize = 4 + 2 + 4 + 2 + 4 + 2;

        let body = &mut self.body;
        let name = match body.get_nul_string() {
            Ok(ok) => ok,
            Err(err) => return Some(Err(err)),
        };
        if body.remaining() < SUFFIX {
            return Some(Err(ProtocolError::malformed("RowDescription field truncated")));
        }
        let table_oid = body.get_u32();
        let column_id = body.get_i16();
        let type_oid = body.get_u32();
        let type_size = body.get_i16();
        let type_modifier = body.get_i32();
        let Some(format) = PgFormat::from_code(body.get_u16()) else {
            return Some(Err(ProtocolError::malformed("unknown format code")));
        };

        Some(Ok(FieldDescription {
            name,
            table_oid,
            column_id,
            type_oid,
            type_size,
            type_modifier,
            format,
        }))
    }
}

/// One row of a replication command result.
#[derive(Debug)]
pub struct DataRow {
    pub column_len: u16,
    pub body: Bytes,
}

impl DataRow {
    pub const MSGTYPE: u8 = b'D';

    /// Iterate column values, `None` is `NULL`.
    pub fn columns(&self) -> Columns {
        Columns { remaining: self.column_len, body: self.body.clone() }
    }
}

impl BackendProtocol for DataRow {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 2);
        Ok(Self {
            column_len: body.get_u16(),
            body,
        })
    }
}

/// Iterator of [`DataRow`] values.
pub struct Columns {
    remaining: u16,
    body: Bytes,
}

impl Iterator for Columns {
    type Item = Result<Option<Bytes>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.body.remaining() < 4 {
            return Some(Err(ProtocolError::malformed("DataRow column truncated")));
        }
        let len = self.body.get_i32();
        if len < 0 {
            return Some(Ok(None));
        }
        let len = len as usize;
        if self.body.remaining() < len {
            return Some(Err(ProtocolError::malformed("DataRow column truncated")));
        }
        Some(Ok(Some(self.body.split_to(len))))
    }
}

/// A command finished, `tag` names it, e.g. `START_REPLICATION` or `IDENTIFY_SYSTEM`.
#[derive(Debug)]
pub struct CommandComplete {
    pub tag: Bytes,
}

impl CommandComplete {
    pub const MSGTYPE: u8 = b'C';
}

impl BackendProtocol for CommandComplete {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self {
            tag: body.get_nul_bytes()?,
        })
    }
}

/// `START_REPLICATION` accepted, both sides now exchange [`CopyData`].
#[derive(Debug)]
pub struct CopyBothResponse {
    /// Always [`Text`][PgFormat::Text] for replication.
    pub format: PgFormat,
    pub column_len: u16,
    /// Per column format codes.
    pub column_formats: Bytes,
}

impl CopyBothResponse {
    pub const MSGTYPE: u8 = b'W';
}

impl BackendProtocol for CopyBothResponse {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        assert_len!(body, 3);
        let Some(format) = PgFormat::from_code(body.get_u8().into()) else {
            return Err(ProtocolError::malformed("unknown copy format"));
        };
        Ok(Self {
            format,
            column_len: body.get_u16(),
            column_formats: body,
        })
    }
}

/// Copy stream payload, see [`replication`][crate::replication] for its content.
#[derive(Debug)]
pub struct CopyData {
    pub data: Bytes,
}

impl CopyData {
    pub const MSGTYPE: u8 = b'd';
}

impl BackendProtocol for CopyData {
    fn decode(msgtype: u8, data: Bytes) -> Result<Self,ProtocolError> {
        assert_msgtype!(msgtype);
        Ok(Self { data })
    }
}

macro_rules! unit_msg {
    ($(
        $(#[$doc:meta])* struct $name:ident, $ty:literal;
    )*) => {$(
            $(#[$doc])*
            #[derive(Debug)]
            pub struct $name;

            impl $name {
                pub const MSGTYPE: u8 = $ty;
            }

            impl BackendProtocol for $name {
                fn decode(msgtype: u8, _: Bytes) -> Result<Self,ProtocolError> {
                    assert_msgtype!(msgtype);
                    Ok(Self)
                }
            }
    )*};
}

unit_msg! {
    /// The server ended the copy stream.
    struct CopyDone, b'c';

    /// Reply to an empty command string.
    struct EmptyQueryResponse, b'I';
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn decode_dispatch() {
        let msg = BackendMessage::decode(b'Z', Bytes::from_static(b"T")).unwrap();
        assert!(matches!(msg, BackendMessage::ReadyForQuery(ReadyForQuery { status: TransactionStatus::Transaction })));
        assert_eq!(msg.msgtype(), b'Z');

        let msg = BackendMessage::decode(b'W', Bytes::from_static(b"\0\0\0")).unwrap();
        assert!(matches!(msg, BackendMessage::CopyBothResponse(CopyBothResponse { format: PgFormat::Text, column_len: 0, .. })));

        assert!(BackendMessage::decode(b'G', Bytes::new()).is_err());
        assert!(CopyBothResponse::decode(b'W', Bytes::from_static(b"\x02\0\0")).is_err());
        assert!(ReadyForQuery::decode(b'K', Bytes::from_static(b"I")).is_err());
        assert_eq!(BackendMessage::message_name(b'd'), "CopyData");
    }

    #[test]
    fn authentication_challenges() {
        let auth = Authentication::decode(b'R', Bytes::from_static(b"\0\0\0\x05\x01\x02\x03\x04")).unwrap();
        assert_eq!(auth, Authentication::MD5Password { salt: [1, 2, 3, 4] });

        let body = Bytes::from_static(b"\0\0\0\x0aSCRAM-SHA-256-PLUS\0SCRAM-SHA-256\0\0");
        let Authentication::SASL { mechanisms } = Authentication::decode(b'R', body).unwrap() else {
            panic!("expected sasl");
        };
        assert_eq!(mechanisms, ["SCRAM-SHA-256-PLUS", "SCRAM-SHA-256"]);

        let auth = Authentication::decode(b'R', Bytes::from_static(b"\0\0\0\x0br=abc")).unwrap();
        assert_eq!(auth, Authentication::SASLContinue { data: Bytes::from_static(b"r=abc") });

        assert!(matches!(
            Authentication::decode(b'R', Bytes::from_static(b"\0\0\0\x02")),
            Err(ProtocolError::UnknownAuth { auth: 2 })
        ));
        assert!(Authentication::decode(b'R', Bytes::from_static(b"\0\0\0\x05\x01")).is_err());

        let key = BackendKeyData::decode(b'K', Bytes::from_static(b"\0\0\x01\0\0\0\0\x2a")).unwrap();
        assert_eq!((key.process_id, key.secret_key), (256, 42));
    }

    #[test]
    fn error_and_notice_fields() {
        let body = Bytes::from_static(b"SERROR\0C42704\0Mreplication slot \"s1\" does not exist\0\0");
        let err = ErrorResponse::decode(b'E', body).unwrap();
        assert_eq!(err.code().unwrap(), &b"42704"[..]);
        assert_eq!(err.to_string(), "ERROR 42704: replication slot \"s1\" does not exist");

        let notice = NoticeResponse::decode(b'N', Bytes::from_static(b"Mslot lagging\0\0")).unwrap();
        assert_eq!(format!("{notice:?}"), "\"NoticeResponse: slot lagging\"");
        assert_eq!(notice.fields().count(), 1);
    }

    #[test]
    fn identify_system_rows() {
        let mut body = bytes::BytesMut::new();
        body.put_u16(1);
        body.put_slice(b"xlogpos\0");
        body.put_u32(0);
        body.put_i16(0);
        body.put_u32(25);
        body.put_i16(-1);
        body.put_i32(-1);
        body.put_u16(0);
        let desc = RowDescription::decode(b'T', body.freeze()).unwrap();
        let fields = desc.fields().collect::<Result<Vec<_>,_>>().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "xlogpos");
        assert_eq!(fields[0].type_oid, 25);
        assert_eq!(fields[0].format, PgFormat::Text);

        let mut body = bytes::BytesMut::new();
        body.put_u16(2);
        body.put_i32(9);
        body.put_slice(b"0/16B3748");
        body.put_i32(-1);
        let row = DataRow::decode(b'D', body.freeze()).unwrap();
        let cols = row.columns().collect::<Result<Vec<_>,_>>().unwrap();
        assert_eq!(cols[0].as_deref(), Some(&b"0/16B3748"[..]));
        assert!(cols[1].is_none());

        let mut body = bytes::BytesMut::new();
        body.put_u16(1);
        body.put_i32(10);
        assert!(DataRow::decode(b'D', body.freeze()).unwrap().columns().next().unwrap().is_err());
    }
}
