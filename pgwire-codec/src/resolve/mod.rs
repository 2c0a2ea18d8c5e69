//! Runtime type resolution.
//!
//! A [`TypeMapper`] walks an ordered chain of [`TypeInfoResolver`]s to find the [`Codec`] for a
//! postgres type name, a requested [`ClientType`], or both. The chain is assembled from
//! [`TypeMapperOptions`], so disabled features never resolve and instead report the switch that
//! would enable them.
//!
//! ```
//! use pgwire_codec::resolve::{ClientType, ElementType, TypeMapper};
//!
//! let mapper = TypeMapper::builder().build().unwrap();
//! let info = mapper.resolve_name("tstzrange").unwrap();
//! assert_eq!(info.client, ClientType::Range(ElementType::TimestampTz));
//! ```
mod options;
mod name;
mod client;
mod error;
mod value;
mod codec;
mod resolver;

pub use options::{ConfigError, TypeMapperBuilder, TypeMapperOptions};
pub use name::DataTypeName;
pub use client::{ClientType, ClientTyped, Container, ElementType, RangeElement};
pub use error::UnsupportedError;
pub use value::Value;
pub use codec::{Codec, ElementCodec, MultirangeCodec};
pub use resolver::{TypeInfo, TypeInfoMapping, TypeInfoMappings, TypeInfoResolver};

use crate::{Result, common::{span, verbose}, postgres::Oid};

/// Resolve postgres types into codecs.
pub struct TypeMapper {
    options: TypeMapperOptions,
    resolvers: Vec<Box<dyn TypeInfoResolver>>,
}

impl TypeMapper {
    /// Create a mapper with the built in resolver chain.
    ///
    /// Options are not validated, prefer [`TypeMapperBuilder::build`].
    pub fn new(options: TypeMapperOptions) -> TypeMapper {
        let mut resolvers: Vec<Box<dyn TypeInfoResolver>> = vec![
            Box::new(resolver::elements(&options)),
            Box::new(resolver::geometric()),
            Box::new(resolver::network()),
        ];
        if options.full_text_search {
            resolvers.push(Box::new(resolver::full_text_search()));
        }
        if options.records {
            resolvers.push(Box::new(resolver::records()));
        }
        if options.ranges {
            resolvers.push(Box::new(resolver::ranges(&options)));
            if options.arrays {
                resolvers.push(Box::new(resolver::range_arrays(&options)));
            }
        }
        if options.multiranges_available() {
            resolvers.push(Box::new(resolver::multiranges(&options)));
            if options.arrays {
                resolvers.push(Box::new(resolver::multirange_arrays(&options)));
            }
        }
        resolvers.push(Box::new(resolver::UnsupportedResolver));
        TypeMapper { options, resolvers }
    }

    pub fn builder() -> TypeMapperBuilder {
        TypeMapperBuilder::new()
    }

    pub fn options(&self) -> &TypeMapperOptions {
        &self.options
    }

    /// Add a resolver in front of the chain.
    pub fn prepend_resolver(&mut self, resolver: impl TypeInfoResolver + 'static) {
        self.resolvers.insert(0, Box::new(resolver));
    }

    /// Resolve by client type, postgres type name, or both.
    ///
    /// With only a name, the default mapping of that name is used.
    pub fn resolve(&self, client: Option<&ClientType>, name: Option<&str>) -> Result<TypeInfo> {
        span!("resolve", ?client, ?name);
        let name = name.map(|n| DataTypeName::new(n.to_owned()));
        for resolver in &self.resolvers {
            if let Some(info) = resolver.get_type_info(client, name.as_ref(), &self.options)? {
                verbose!(name = %info.name, client = %info.client, "resolved");
                return Ok(info);
            }
        }
        Err(UnsupportedError::NoMapping { client: client.copied(), name }.into())
    }

    /// Default mapping of a postgres type name.
    pub fn resolve_name(&self, name: &str) -> Result<TypeInfo> {
        self.resolve(None, Some(name))
    }

    /// Mapping of a well known type oid.
    pub fn resolve_oid(&self, oid: Oid, client: Option<&ClientType>) -> Result<TypeInfo> {
        let Some(name) = DataTypeName::from_oid(oid) else {
            return Err(UnsupportedError::UnknownOid { oid }.into());
        };
        self.resolve(client, Some(name.as_str()))
    }

    /// Mapping of a rust type, optionally to a specific postgres type.
    pub fn resolve_typed<T: ClientTyped>(&self, name: Option<&str>) -> Result<TypeInfo> {
        self.resolve(Some(&T::CLIENT_TYPE), name)
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new(TypeMapperOptions::default())
    }
}

impl std::fmt::Debug for TypeMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMapper")
            .field("options", &self.options)
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;
    use time::UtcDateTime;

    use super::*;
    use crate::{
        convert::ConverterExt,
        error::ErrorKind,
        postgres::oid,
        types::{Point, Range, RangeBound},
    };

    fn not_enabled(err: crate::Error) -> &'static str {
        match err.kind() {
            ErrorKind::Unsupported(UnsupportedError::NotEnabled { flag, .. }) => *flag,
            kind => panic!("expected not enabled, found {kind}"),
        }
    }

    #[test]
    fn name_only_takes_default() {
        let mapper = TypeMapper::default();
        let info = mapper.resolve_name("pg_catalog.tstzrange").unwrap();
        assert_eq!(info.oid, oid::TSTZRANGE);
        assert_eq!(info.client, ClientType::Range(ElementType::TimestampTz));

        let info = mapper.resolve_oid(oid::DATEMULTIRANGE, None).unwrap();
        assert_eq!(info.client, ClientType::Multirange(ElementType::Date, Container::Array));

        let info = mapper.resolve_typed::<Vec<Range<i64>>>(Some("int8multirange")).unwrap();
        assert_eq!(info.client, ClientType::Multirange(ElementType::Int8, Container::List));

        let info = mapper.resolve_typed::<Vec<Range<i64>>>(None).unwrap();
        assert_eq!(info.oid, oid::INT8RANGE_ARRAY);
    }

    #[test]
    fn legacy_timestamp() {
        let modern = TypeMapper::default();
        let legacy = TypeMapper::builder().legacy_timestamp_behavior(true).build().unwrap();

        let info = legacy.resolve_name("tstzrange").unwrap();
        assert_eq!(info.client, ClientType::Range(ElementType::Timestamp));

        let client = ClientType::Range(ElementType::Timestamp);
        assert!(legacy.resolve(Some(&client), Some("tstzrange")).is_ok());
        let err = modern.resolve(Some(&client), Some("tstzrange")).unwrap_err();
        assert_eq!(not_enabled(err), "legacy_timestamp_behavior");
    }

    #[test]
    fn disabled_features_name_the_flag() {
        let mapper = TypeMapperBuilder::slim().build().unwrap();
        assert_eq!(not_enabled(mapper.resolve_name("int4range").unwrap_err()), "enable_ranges");
        assert_eq!(not_enabled(mapper.resolve_name("tsquery").unwrap_err()), "enable_full_text_search");
        assert_eq!(not_enabled(mapper.resolve_typed::<crate::types::Record>(None).unwrap_err()), "enable_records");
        assert_eq!(
            not_enabled(mapper.resolve_name("_datemultirange").unwrap_err()),
            "enable_multiranges"
        );
        assert!(mapper.resolve_name("point").is_ok());

        let mapper = TypeMapperBuilder::slim().enable_ranges(true).enable_arrays(false).build().unwrap();
        assert_eq!(not_enabled(mapper.resolve_name("_numrange").unwrap_err()), "enable_arrays");

        let mapper = TypeMapper::builder().supports_multirange(false).build().unwrap();
        assert_eq!(
            not_enabled(mapper.resolve_name("nummultirange").unwrap_err()),
            "supports_multirange"
        );
        assert!(mapper.resolve_name("numrange").is_ok());
    }

    #[test]
    fn unknown() {
        let mapper = TypeMapper::default();
        let err = mapper.resolve_oid(1, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(UnsupportedError::UnknownOid { oid: 1 })));
        let err = mapper.resolve_name("public.mood").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(UnsupportedError::NoMapping { .. })));
        assert!(!err.is_fatal());
    }

    #[test]
    fn resolved_codec_round_trip() {
        let mapper = TypeMapper::default();

        let info = mapper.resolve_name("numrange").unwrap();
        let value = Value::from(Range::new(
            RangeBound::Inclusive(Decimal::new(-15, 1)),
            RangeBound::Unbounded,
        ));
        let bytes = info.codec.encode(&value).unwrap();
        assert_eq!(info.codec.decode(bytes.freeze()).unwrap(), value);

        let info = mapper.resolve_typed::<Vec<Box<[Range<UtcDateTime>]>>>(None).unwrap();
        assert_eq!(info.oid, oid::TSTZMULTIRANGE_ARRAY);
        let value = Value::MultirangeArray(vec![Value::Multirange(
            vec![Range::half_open(UtcDateTime::UNIX_EPOCH, UtcDateTime::UNIX_EPOCH).map(Value::from)]
                .into_boxed_slice(),
        )]);
        let bytes = info.codec.encode(&value).unwrap();
        assert_eq!(info.codec.decode(bytes.freeze()).unwrap(), value);

        let info = mapper.resolve_name("point").unwrap();
        let err = info.codec.encode(&Value::Int4(0)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(UnsupportedError::ValueMismatch { .. })));
        assert_eq!(info.codec.encode(&Point::new(0.0, 1.0).into()).unwrap().len(), 16);
    }
}
