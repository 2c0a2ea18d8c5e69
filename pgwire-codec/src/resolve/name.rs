use std::{borrow::Cow, fmt};

use crate::postgres::{Oid, type_name, type_oid};

const CATALOG: &str = "pg_catalog";

/// Fully qualified postgres data type name.
///
/// Unqualified names are assumed to live in `pg_catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataTypeName {
    name: Cow<'static, str>,
}

impl DataTypeName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let name = match name.contains('.') {
            true => name,
            false => Cow::Owned(format!("{CATALOG}.{name}")),
        };
        Self { name }
    }

    /// Name of a well known type oid.
    pub fn from_oid(oid: Oid) -> Option<Self> {
        type_name(oid).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &str {
        self.name.split_once('.').map_or(CATALOG, |(schema, _)| schema)
    }

    pub fn unqualified_name(&self) -> &str {
        self.name.split_once('.').map_or(&*self.name, |(_, name)| name)
    }

    /// Postgres prefixes array type names with `_`.
    pub fn is_array(&self) -> bool {
        self.unqualified_name().starts_with('_')
    }

    /// Element type name of an array type.
    pub fn element(&self) -> Option<DataTypeName> {
        let element = self.unqualified_name().strip_prefix('_')?;
        Some(Self::new(format!("{}.{element}", self.schema())))
    }

    /// Oid if this is a well known `pg_catalog` type.
    pub fn well_known_oid(&self) -> Option<Oid> {
        match self.schema() {
            CATALOG => type_oid(self.unqualified_name()),
            _ => None,
        }
    }
}

impl From<&'static str> for DataTypeName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for DataTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
