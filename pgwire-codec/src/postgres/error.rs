//! Wire level errors.
use std::{borrow::Cow, fmt};

use super::{BackendMessage, Oid};

/// Message that does not fit where it was received.
pub enum ProtocolError {
    Unexpected {
        expect: Option<u8>,
        found: u8,
        phase: Option<&'static str>,
    },
    /// Authentication request code this crate does not know.
    UnknownAuth {
        auth: u32,
    },
    /// Row change referenced a relation that was never described.
    UnknownRelation {
        oid: Oid,
    },
    /// Unknown logical replication message tag.
    UnknownReplication {
        tag: u8,
    },
    Malformed {
        reason: Cow<'static, str>,
    },
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Unexpected { expect, found, phase } => {
                let found = BackendMessage::message_name(*found);
                match expect {
                    Some(m) => {
                        write!(
                            f,
                            "Expected message `{}` found `{found}`",
                            BackendMessage::message_name(*m),
                        )?
                    },
                    None => write!(f, "Unexpected message `{found}`")?,
                }
                if let Some(phase) = phase {
                    write!(f, " in `{phase}`")?
                }
                Ok(())
            },
            ProtocolError::UnknownAuth { auth } => {
                write!(f, "Unsupported authentication request `{auth}`")
            },
            ProtocolError::UnknownRelation { oid } => {
                write!(f, "Relation `{oid}` referenced before its Relation message")
            },
            ProtocolError::UnknownReplication { tag } => {
                write!(f, "Unknown logical replication message `{}`", *tag as char)
            },
            ProtocolError::Malformed { reason } => write!(f, "Malformed message: {reason}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl ProtocolError {
    pub(crate) fn unknown(found: u8) -> ProtocolError {
        Self::Unexpected {
            expect: None,
            found,
            phase: None,
        }
    }

    pub(crate) fn unexpected(expect: u8, found: u8) -> ProtocolError {
        Self::Unexpected {
            expect: Some(expect),
            found,
            phase: None,
        }
    }

    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected {
            expect: None,
            found,
            phase: Some(phase),
        }
    }

    pub(crate) fn unknown_auth(auth: u32) -> ProtocolError {
        Self::UnknownAuth { auth }
    }

    pub(crate) fn unknown_relation(oid: Oid) -> ProtocolError {
        Self::UnknownRelation { oid }
    }

    pub(crate) fn unknown_replication(tag: u8) -> ProtocolError {
        Self::UnknownReplication { tag }
    }

    pub(crate) fn malformed(reason: impl Into<Cow<'static, str>>) -> ProtocolError {
        Self::Malformed { reason: reason.into() }
    }
}
