//! Type mapper configuration.
use std::{borrow::Cow, env::var, fmt};

use super::TypeMapper;
use crate::convert::DEFAULT_TSQUERY_DEPTH;

/// Feature switches of a [`TypeMapper`].
///
/// Use [`TypeMapperBuilder`] to construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapperOptions {
    pub(crate) ranges: bool,
    pub(crate) multiranges: bool,
    pub(crate) arrays: bool,
    pub(crate) full_text_search: bool,
    pub(crate) records: bool,
    pub(crate) legacy_timestamp_behavior: bool,
    pub(crate) infinity_conversions: bool,
    pub(crate) supports_multirange: bool,
    pub(crate) max_tsquery_depth: usize,
}

impl Default for TypeMapperOptions {
    fn default() -> Self {
        Self {
            ranges: true,
            multiranges: true,
            arrays: true,
            full_text_search: true,
            records: true,
            legacy_timestamp_behavior: false,
            infinity_conversions: false,
            supports_multirange: true,
            max_tsquery_depth: DEFAULT_TSQUERY_DEPTH,
        }
    }
}

macro_rules! getters {
    ($($name:ident: $ty:ty),* $(,)?) => {$(
        pub fn $name(&self) -> $ty {
            self.$name
        }
    )*};
}

impl TypeMapperOptions {
    /// Retrieve options from environment variable, missing variables keep their default.
    ///
    /// It reads:
    /// - `PGCODEC_RANGES`
    /// - `PGCODEC_MULTIRANGES`
    /// - `PGCODEC_ARRAYS`
    /// - `PGCODEC_FULL_TEXT_SEARCH`
    /// - `PGCODEC_RECORDS`
    /// - `PGCODEC_LEGACY_TIMESTAMP_BEHAVIOR`
    /// - `PGCODEC_INFINITY_CONVERSIONS`
    /// - `PGCODEC_SUPPORTS_MULTIRANGE`
    /// - `PGCODEC_MAX_TSQUERY_DEPTH`
    ///
    /// Switches accept `1`, `true`, `on`, `yes` and `0`, `false`, `off`, `no`.
    pub fn from_env() -> Result<TypeMapperOptions, ConfigError> {
        Self::from_lookup(|name| var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<TypeMapperOptions, ConfigError> {
        let mut options = Self::default();

        macro_rules! env {
            ($name:literal, $field:ident) => {
                if let Some(value) = lookup($name) {
                    options.$field = parse_switch($name, &value)?;
                }
            };
        }

        env!("PGCODEC_RANGES", ranges);
        env!("PGCODEC_MULTIRANGES", multiranges);
        env!("PGCODEC_ARRAYS", arrays);
        env!("PGCODEC_FULL_TEXT_SEARCH", full_text_search);
        env!("PGCODEC_RECORDS", records);
        env!("PGCODEC_LEGACY_TIMESTAMP_BEHAVIOR", legacy_timestamp_behavior);
        env!("PGCODEC_INFINITY_CONVERSIONS", infinity_conversions);
        env!("PGCODEC_SUPPORTS_MULTIRANGE", supports_multirange);

        if let Some(value) = lookup("PGCODEC_MAX_TSQUERY_DEPTH") {
            let Ok(depth) = value.trim().parse() else {
                return Err(ConfigError::new(format!("PGCODEC_MAX_TSQUERY_DEPTH `{value}` is not a number")));
            };
            options.max_tsquery_depth = depth;
        }

        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tsquery_depth == 0 {
            return Err(ConfigError::new("max tsquery depth must be at least 1"));
        }
        Ok(())
    }

    /// Multiranges are resolved only if enabled and the server has them.
    pub fn multiranges_available(&self) -> bool {
        self.multiranges && self.supports_multirange
    }

    getters! {
        ranges: bool,
        multiranges: bool,
        arrays: bool,
        full_text_search: bool,
        records: bool,
        legacy_timestamp_behavior: bool,
        infinity_conversions: bool,
        supports_multirange: bool,
        max_tsquery_depth: usize,
    }
}

fn parse_switch(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::new(format!("{name} `{value}` is not a switch"))),
    }
}

/// [`TypeMapper`] builder.
///
/// Every optional feature starts enabled, [`slim`][TypeMapperBuilder::slim] starts with all of
/// them disabled.
#[derive(Debug, Clone, Default)]
pub struct TypeMapperBuilder {
    options: TypeMapperOptions,
}

macro_rules! switches {
    ($($(#[$doc:meta])* $fn:ident => $field:ident;)*) => {$(
        $(#[$doc])*
        pub fn $fn(mut self, value: bool) -> Self {
            self.options.$field = value;
            self
        }
    )*};
}

impl TypeMapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with ranges, multiranges, arrays, full text search and records disabled.
    pub fn slim() -> Self {
        Self::from_options(TypeMapperOptions {
            ranges: false,
            multiranges: false,
            arrays: false,
            full_text_search: false,
            records: false,
            ..Default::default()
        })
    }

    pub fn from_options(options: TypeMapperOptions) -> Self {
        Self { options }
    }

    switches! {
        enable_ranges => ranges;
        enable_multiranges => multiranges;
        /// Arrays of ranges and of multiranges.
        enable_arrays => arrays;
        enable_full_text_search => full_text_search;
        enable_records => records;
        /// Allow mixing `timestamp` and `timestamptz` representations in ranges.
        legacy_timestamp_behavior => legacy_timestamp_behavior;
        /// Map `infinity` onto the minimum and maximum of date and time types.
        infinity_conversions => infinity_conversions;
        /// Whether the server knows multirange types, postgres 14 and later.
        supports_multirange => supports_multirange;
    }

    /// Deepest tsquery accepted from the wire.
    pub fn max_tsquery_depth(mut self, depth: usize) -> Self {
        self.options.max_tsquery_depth = depth;
        self
    }

    pub fn options(&self) -> &TypeMapperOptions {
        &self.options
    }

    pub fn build(self) -> Result<TypeMapper, ConfigError> {
        self.options.validate()?;
        Ok(TypeMapper::new(self.options))
    }
}

/// Error when building type mapper configuration.
pub struct ConfigError {
    pub(crate) reason: Cow<'static, str>,
}

impl ConfigError {
    pub(crate) fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self { reason: reason.into() }
    }
}

impl std::error::Error for ConfigError { }

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason)
        }
        write!(f, "invalid configuration: {}", self.reason)
    }
}

impl fmt::Debug for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_switches() {
        let options = TypeMapperOptions::from_lookup(lookup(&[
            ("PGCODEC_RANGES", "off"),
            ("PGCODEC_INFINITY_CONVERSIONS", "1"),
            ("PGCODEC_MAX_TSQUERY_DEPTH", " 64 "),
        ]))
        .unwrap();
        assert!(!options.ranges());
        assert!(options.infinity_conversions());
        assert!(options.multiranges());
        assert_eq!(options.max_tsquery_depth(), 64);
    }

    #[test]
    fn env_errors() {
        let err = TypeMapperOptions::from_lookup(lookup(&[("PGCODEC_ARRAYS", "maybe")])).unwrap_err();
        assert_eq!(format!("{err:#}"), "PGCODEC_ARRAYS `maybe` is not a switch");

        let err = TypeMapperOptions::from_lookup(lookup(&[("PGCODEC_MAX_TSQUERY_DEPTH", "0")])).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn builder() {
        let builder = TypeMapperBuilder::slim().enable_ranges(true).supports_multirange(false);
        assert!(builder.options().ranges());
        assert!(!builder.options().arrays());
        assert!(!builder.options().multiranges_available());
        assert!(TypeMapperBuilder::new().max_tsquery_depth(0).build().is_err());
    }
}
