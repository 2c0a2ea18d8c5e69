//! `pgwire-codec` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt, io, str::Utf8Error, string::FromUtf8Error};

use crate::{
    postgres::{ErrorResponse, Oid, ProtocolError},
    resolve::{ConfigError, UnsupportedError},
};

/// A specialized [`Result`] type for `pgwire-codec` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `pgwire-codec` library.
pub struct Error {
    context: Cow<'static, str>,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Attach context that is printed before the error itself.
    pub fn context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns `true` if the stream that produced this error must not be used anymore.
    ///
    /// Once a fatal error is returned, the position within the wire stream is unknown.
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    pub(crate) fn internal(msg: &'static str) -> Self {
        ErrorKind::Internal(msg).into()
    }
}

/// All possible error kind from `pgwire-codec` library.
pub enum ErrorKind {
    /// Invalid configuration value.
    Config(ConfigError),
    /// Requested type mapping is disabled or does not exist.
    Unsupported(UnsupportedError),
    /// Backend sent something the codec did not expect.
    Protocol(ProtocolError),
    /// Codec invariant violated.
    Internal(&'static str),
    /// Textual input could not be parsed.
    Format(FormatError),
    /// Value cannot be represented on the wire.
    OutOfRange(OutOfRangeError),
    /// Wire value cannot be represented by the requested type.
    Decode(DecodeError),
    /// Backend reported an error.
    Database(ErrorResponse),
    /// Operation cancelled while waiting for io.
    Cancelled,
    Io(io::Error),
    Utf8(Utf8Error),
}

impl ErrorKind {
    fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Internal(_) | Self::Cancelled | Self::Io(_)
        )
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: Cow::Borrowed(""), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ConfigError>e => ErrorKind::Config(e));
from!(<UnsupportedError>e => ErrorKind::Unsupported(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<FormatError>e => ErrorKind::Format(e));
from!(<OutOfRangeError>e => ErrorKind::OutOfRange(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<ErrorResponse>e => ErrorKind::Database(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));
from!(<FromUtf8Error>e => ErrorKind::Utf8(e.utf8_error()));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Unsupported(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Internal(msg) => write!(f, "internal codec error: {msg}"),
            Self::Format(e) => e.fmt(f),
            Self::OutOfRange(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Cancelled => f.write_str("operation cancelled, stream is desynchronized"),
            Self::Io(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when parsing textual representation of a value.
pub struct FormatError {
    pub(crate) message: Cow<'static, str>,
    pub(crate) position: usize,
}

impl FormatError {
    pub(crate) fn new(message: impl Into<Cow<'static, str>>, position: usize) -> Self {
        Self { message: message.into(), position }
    }

    /// Character offset in the input where parsing failed.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::error::Error for FormatError { }

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl fmt::Debug for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// A value exceeds what the wire format can carry.
///
/// Always returned before any byte of the value is written.
pub struct OutOfRangeError {
    pub(crate) message: Cow<'static, str>,
}

impl OutOfRangeError {
    pub(crate) fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self { message: message.into() }
    }
}

impl std::error::Error for OutOfRangeError { }

impl fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value out of range: {}", self.message)
    }
}

impl fmt::Debug for OutOfRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when decoding wire value.
pub enum DecodeError {
    /// Oid sent by postgres missmatch with the expected one.
    OidMissmatch { expected: Oid, found: Oid },
    /// Value is null.
    Null,
    /// Wire value is not valid for the target type.
    Invalid(Cow<'static, str>),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::OidMissmatch { expected, found } => {
                write!(f, "data type missmatch, expected oid {expected} found {found}")
            }
            Self::Null => f.write_str("unexpected NULL value"),
            Self::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fatal_classes() {
        let err = Error::from(ErrorKind::Cancelled);
        assert!(err.is_fatal());

        let err = Error::internal("stack not empty");
        assert!(err.is_fatal());

        let err = Error::from(FormatError::new("unexpected token", 3));
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("unexpected token at position 3"));

        let err = Error::from(OutOfRangeError::new("too long")).context("tsquery");
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("tsquery: value out of range: too long"));
    }
}
