use std::{borrow::Cow, fmt};

use super::{ClientType, DataTypeName};
use crate::postgres::Oid;

/// Requested type mapping is not available.
pub enum UnsupportedError {
    /// Mapping exists but its feature is disabled.
    NotEnabled {
        what: Cow<'static, str>,
        flag: &'static str,
    },
    /// No resolver knows the combination.
    NoMapping {
        client: Option<ClientType>,
        name: Option<DataTypeName>,
    },
    /// Oid is not a well known type.
    UnknownOid {
        oid: Oid,
    },
    /// Dynamic value does not match the codec it is written with.
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl UnsupportedError {
    pub(crate) fn not_enabled(what: impl Into<Cow<'static, str>>, flag: &'static str) -> Self {
        Self::NotEnabled { what: what.into(), flag }
    }
}

impl std::error::Error for UnsupportedError { }

impl fmt::Display for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnabled { what, flag } => {
                write!(f, "{what} is not enabled, enable it with `{flag}`")
            }
            Self::NoMapping { client, name } => {
                f.write_str("no type mapping")?;
                if let Some(client) = client {
                    write!(f, " for `{client}`")?;
                }
                if let Some(name) = name {
                    write!(f, " to `{name}`")?;
                }
                Ok(())
            }
            Self::UnknownOid { oid } => write!(f, "oid {oid} is not a well known type"),
            Self::ValueMismatch { expected, found } => {
                write!(f, "codec expects {expected} value, found {found}")
            }
        }
    }
}

impl fmt::Debug for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
