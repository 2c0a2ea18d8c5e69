//! Ordered chain of type info resolvers.
use std::borrow::Cow;

use super::{
    ClientType, Codec, Container, DataTypeName, ElementType, TypeMapperOptions, UnsupportedError,
};
use crate::postgres::{Oid, oid};

use ElementType as E;

/// Resolved type mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub name: DataTypeName,
    pub oid: Oid,
    pub client: ClientType,
    pub codec: Codec,
}

/// A link of the resolver chain.
///
/// Returning `Ok(None)` passes the lookup to the next resolver.
pub trait TypeInfoResolver: Send + Sync {
    fn get_type_info(
        &self,
        client: Option<&ClientType>,
        name: Option<&DataTypeName>,
        options: &TypeMapperOptions,
    ) -> Result<Option<TypeInfo>, UnsupportedError>;
}

/// Association of a postgres type with a client representation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfoMapping {
    pub name: DataTypeName,
    pub oid: Oid,
    pub client: ClientType,
    /// Array element type oid, `0` for non array types.
    pub element_oid: Oid,
    /// Mapping used when only the name is known.
    pub is_default: bool,
}

impl TypeInfoMapping {
    pub fn new(name: impl Into<Cow<'static, str>>, oid: Oid, client: ClientType) -> Self {
        Self { name: DataTypeName::new(name), oid, client, element_oid: 0, is_default: true }
    }

    pub fn array_of(mut self, element_oid: Oid) -> Self {
        self.element_oid = element_oid;
        self
    }

    pub fn non_default(mut self) -> Self {
        self.is_default = false;
        self
    }

    pub fn type_info(&self, options: &TypeMapperOptions) -> TypeInfo {
        TypeInfo {
            name: self.name.clone(),
            oid: self.oid,
            client: self.client,
            codec: Codec::for_client(&self.client, self.element_oid, options),
        }
    }
}

/// Ordered list of mappings.
#[derive(Debug, Clone, Default)]
pub struct TypeInfoMappings {
    mappings: Vec<TypeInfoMapping>,
}

impl TypeInfoMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mapping: TypeInfoMapping) {
        self.mappings.push(mapping);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypeInfoMapping> {
        self.mappings.iter()
    }

    /// First mapping matching the lookup.
    ///
    /// Without a client type, only default mappings are considered.
    pub fn find(
        &self,
        client: Option<&ClientType>,
        name: Option<&DataTypeName>,
    ) -> Option<&TypeInfoMapping> {
        self.mappings.iter().find(|m| match (client, name) {
            (Some(client), Some(name)) => &m.name == name && client.accepts(&m.client),
            (None, Some(name)) => &m.name == name && m.is_default,
            (Some(client), None) => client.accepts(&m.client),
            (None, None) => false,
        })
    }
}

impl FromIterator<TypeInfoMapping> for TypeInfoMappings {
    fn from_iter<T: IntoIterator<Item = TypeInfoMapping>>(iter: T) -> Self {
        Self { mappings: iter.into_iter().collect() }
    }
}

impl Extend<TypeInfoMapping> for TypeInfoMappings {
    fn extend<T: IntoIterator<Item = TypeInfoMapping>>(&mut self, iter: T) {
        self.mappings.extend(iter);
    }
}

impl TypeInfoResolver for TypeInfoMappings {
    fn get_type_info(
        &self,
        client: Option<&ClientType>,
        name: Option<&DataTypeName>,
        options: &TypeMapperOptions,
    ) -> Result<Option<TypeInfo>, UnsupportedError> {
        Ok(self.find(client, name).map(|m| m.type_info(options)))
    }
}

// ===== Built in mappings =====

/// Postgres types of a range family, paired with their oid.
struct Family {
    element: (&'static str, Oid),
    range: (&'static str, Oid),
    range_array: (&'static str, Oid),
    multirange: (&'static str, Oid),
    multirange_array: (&'static str, Oid),
    /// Client elements, the first one is the default.
    modern: &'static [ElementType],
    legacy: &'static [ElementType],
}

impl Family {
    fn elements(&self, options: &TypeMapperOptions) -> &'static [ElementType] {
        match options.legacy_timestamp_behavior {
            true => self.legacy,
            false => self.modern,
        }
    }

    fn contains(&self, name: &DataTypeName) -> bool {
        let name = name.unqualified_name();
        [self.element, self.range, self.range_array, self.multirange, self.multirange_array]
            .iter()
            .any(|(n, _)| *n == name)
    }
}

const FAMILIES: [Family; 6] = [
    Family {
        element: ("int4", oid::INT4),
        range: ("int4range", oid::INT4RANGE),
        range_array: ("_int4range", oid::INT4RANGE_ARRAY),
        multirange: ("int4multirange", oid::INT4MULTIRANGE),
        multirange_array: ("_int4multirange", oid::INT4MULTIRANGE_ARRAY),
        modern: &[E::Int4],
        legacy: &[E::Int4],
    },
    Family {
        element: ("int8", oid::INT8),
        range: ("int8range", oid::INT8RANGE),
        range_array: ("_int8range", oid::INT8RANGE_ARRAY),
        multirange: ("int8multirange", oid::INT8MULTIRANGE),
        multirange_array: ("_int8multirange", oid::INT8MULTIRANGE_ARRAY),
        modern: &[E::Int8],
        legacy: &[E::Int8],
    },
    Family {
        element: ("numeric", oid::NUMERIC),
        range: ("numrange", oid::NUMRANGE),
        range_array: ("_numrange", oid::NUMRANGE_ARRAY),
        multirange: ("nummultirange", oid::NUMMULTIRANGE),
        multirange_array: ("_nummultirange", oid::NUMMULTIRANGE_ARRAY),
        modern: &[E::Numeric],
        legacy: &[E::Numeric],
    },
    Family {
        element: ("timestamp", oid::TIMESTAMP),
        range: ("tsrange", oid::TSRANGE),
        range_array: ("_tsrange", oid::TSRANGE_ARRAY),
        multirange: ("tsmultirange", oid::TSMULTIRANGE),
        multirange_array: ("_tsmultirange", oid::TSMULTIRANGE_ARRAY),
        modern: &[E::Timestamp, E::Int8],
        legacy: &[E::Timestamp, E::TimestampTz, E::Int8],
    },
    Family {
        element: ("timestamptz", oid::TIMESTAMPTZ),
        range: ("tstzrange", oid::TSTZRANGE),
        range_array: ("_tstzrange", oid::TSTZRANGE_ARRAY),
        multirange: ("tstzmultirange", oid::TSTZMULTIRANGE),
        multirange_array: ("_tstzmultirange", oid::TSTZMULTIRANGE_ARRAY),
        modern: &[E::TimestampTz, E::OffsetTimestampTz, E::Int8],
        legacy: &[E::Timestamp, E::TimestampTz, E::OffsetTimestampTz, E::Int8],
    },
    Family {
        element: ("date", oid::DATE),
        range: ("daterange", oid::DATERANGE),
        range_array: ("_daterange", oid::DATERANGE_ARRAY),
        multirange: ("datemultirange", oid::DATEMULTIRANGE),
        multirange_array: ("_datemultirange", oid::DATEMULTIRANGE_ARRAY),
        modern: &[E::Date, E::Int4],
        legacy: &[E::Date, E::Int4],
    },
];

/// Map every element of every family with `f`, the first element of a family is default.
fn per_element(
    options: &TypeMapperOptions,
    mut f: impl FnMut(&Family, ElementType, bool) -> Vec<TypeInfoMapping>,
) -> TypeInfoMappings {
    let mut mappings = TypeInfoMappings::new();
    for family in &FAMILIES {
        for (i, &e) in family.elements(options).iter().enumerate() {
            mappings.extend(f(family, e, i == 0));
        }
    }
    mappings
}

fn default_if(mapping: TypeInfoMapping, is_default: bool) -> TypeInfoMapping {
    match is_default {
        true => mapping,
        false => mapping.non_default(),
    }
}

/// Scalar range elements, integer representation of datetimes is only available inside ranges.
pub(crate) fn elements(options: &TypeMapperOptions) -> TypeInfoMappings {
    per_element(options, |family, e, is_default| {
        let (name, oid) = family.element;
        match is_default || e.is_datetime() {
            true => vec![default_if(TypeInfoMapping::new(name, oid, ClientType::Element(e)), is_default)],
            false => vec![],
        }
    })
}

pub(crate) fn geometric() -> TypeInfoMappings {
    TypeInfoMappings::from_iter([
        TypeInfoMapping::new("point", oid::POINT, ClientType::Point),
        TypeInfoMapping::new("line", oid::LINE, ClientType::Line),
        TypeInfoMapping::new("lseg", oid::LSEG, ClientType::LineSegment),
        TypeInfoMapping::new("box", oid::BOX, ClientType::Box),
        TypeInfoMapping::new("path", oid::PATH, ClientType::Path),
        TypeInfoMapping::new("polygon", oid::POLYGON, ClientType::Polygon),
        TypeInfoMapping::new("circle", oid::CIRCLE, ClientType::Circle),
    ])
}

pub(crate) fn network() -> TypeInfoMappings {
    TypeInfoMappings::from_iter([
        TypeInfoMapping::new("inet", oid::INET, ClientType::Inet),
        TypeInfoMapping::new("cidr", oid::CIDR, ClientType::Cidr),
        TypeInfoMapping::new("tid", oid::TID, ClientType::Tid),
        TypeInfoMapping::new("pg_lsn", oid::PG_LSN, ClientType::Lsn),
    ])
}

pub(crate) fn full_text_search() -> TypeInfoMappings {
    TypeInfoMappings::from_iter([
        TypeInfoMapping::new("tsvector", oid::TSVECTOR, ClientType::TsVector),
        TypeInfoMapping::new("tsquery", oid::TSQUERY, ClientType::TsQuery),
    ])
}

pub(crate) fn records() -> TypeInfoMappings {
    TypeInfoMappings::from_iter([TypeInfoMapping::new("record", oid::RECORD, ClientType::Record)])
}

pub(crate) fn ranges(options: &TypeMapperOptions) -> TypeInfoMappings {
    per_element(options, |family, e, is_default| {
        let (name, oid) = family.range;
        vec![default_if(TypeInfoMapping::new(name, oid, ClientType::Range(e)), is_default)]
    })
}

pub(crate) fn range_arrays(options: &TypeMapperOptions) -> TypeInfoMappings {
    per_element(options, |family, e, is_default| {
        let (name, oid) = family.range_array;
        let mapping = TypeInfoMapping::new(name, oid, ClientType::RangeArray(e));
        vec![default_if(mapping.array_of(family.range.1), is_default)]
    })
}

pub(crate) fn multiranges(options: &TypeMapperOptions) -> TypeInfoMappings {
    per_element(options, |family, e, is_default| {
        let (name, oid) = family.multirange;
        vec![
            default_if(
                TypeInfoMapping::new(name, oid, ClientType::Multirange(e, Container::Array)),
                is_default,
            ),
            TypeInfoMapping::new(name, oid, ClientType::Multirange(e, Container::List)).non_default(),
        ]
    })
}

pub(crate) fn multirange_arrays(options: &TypeMapperOptions) -> TypeInfoMappings {
    per_element(options, |family, e, is_default| {
        let (name, oid) = family.multirange_array;
        let element_oid = family.multirange.1;
        vec![
            default_if(
                TypeInfoMapping::new(name, oid, ClientType::MultirangeArray(e, Container::Array))
                    .array_of(element_oid),
                is_default,
            ),
            TypeInfoMapping::new(name, oid, ClientType::MultirangeArray(e, Container::List))
                .array_of(element_oid)
                .non_default(),
        ]
    })
}

/// Last link of the chain, explains why nothing resolved.
pub(crate) struct UnsupportedResolver;

impl UnsupportedResolver {
    fn disabled_name(name: &DataTypeName, options: &TypeMapperOptions) -> Option<&'static str> {
        let unqualified = name.unqualified_name();
        let family = FAMILIES.iter().find(|f| f.contains(name));
        let is = |part: fn(&Family) -> (&'static str, Oid)| family.is_some_and(|f| part(f).0 == unqualified);

        if is(|f| f.range) || is(|f| f.range_array) {
            if !options.ranges {
                return Some("enable_ranges");
            }
        }
        if is(|f| f.multirange) || is(|f| f.multirange_array) {
            if !options.multiranges {
                return Some("enable_multiranges");
            }
            if !options.supports_multirange {
                return Some("supports_multirange");
            }
        }
        if is(|f| f.range_array) || is(|f| f.multirange_array) {
            if !options.arrays {
                return Some("enable_arrays");
            }
        }
        match unqualified {
            "tsvector" | "tsquery" if !options.full_text_search => Some("enable_full_text_search"),
            "record" if !options.records => Some("enable_records"),
            _ => None,
        }
    }

    fn disabled_client(client: &ClientType, options: &TypeMapperOptions) -> Option<&'static str> {
        match client {
            ClientType::Range(_) | ClientType::RangeArray(_) if !options.ranges => {
                Some("enable_ranges")
            }
            ClientType::Multirange(..) | ClientType::MultirangeArray(..) if !options.multiranges => {
                Some("enable_multiranges")
            }
            ClientType::Multirange(..) | ClientType::MultirangeArray(..)
                if !options.supports_multirange =>
            {
                Some("supports_multirange")
            }
            ClientType::RangeArray(_) | ClientType::MultirangeArray(..) if !options.arrays => {
                Some("enable_arrays")
            }
            ClientType::TsVector | ClientType::TsQuery if !options.full_text_search => {
                Some("enable_full_text_search")
            }
            ClientType::Record if !options.records => Some("enable_records"),
            _ => None,
        }
    }

    /// Datetime representation that only the legacy mapping provides.
    fn legacy_only(client: &ClientType, name: &DataTypeName, options: &TypeMapperOptions) -> bool {
        let Some(element) = client.element() else {
            return false;
        };
        !options.legacy_timestamp_behavior
            && FAMILIES
                .iter()
                .find(|f| f.contains(name))
                .is_some_and(|f| f.legacy.contains(&element) && !f.modern.contains(&element))
    }
}

impl TypeInfoResolver for UnsupportedResolver {
    fn get_type_info(
        &self,
        client: Option<&ClientType>,
        name: Option<&DataTypeName>,
        options: &TypeMapperOptions,
    ) -> Result<Option<TypeInfo>, UnsupportedError> {
        if let Some(name) = name {
            if let Some(flag) = Self::disabled_name(name, options) {
                return Err(UnsupportedError::not_enabled(name.to_string(), flag));
            }
        }
        if let Some(client) = client {
            if let Some(flag) = Self::disabled_client(client, options) {
                return Err(UnsupportedError::not_enabled(client.to_string(), flag));
            }
            if let Some(name) = name {
                if Self::legacy_only(client, name, options) {
                    return Err(UnsupportedError::not_enabled(
                        format!("`{client}` for `{name}`"),
                        "legacy_timestamp_behavior",
                    ));
                }
            }
        }
        Err(UnsupportedError::NoMapping { client: client.copied(), name: name.cloned() })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_default() {
        let options = TypeMapperOptions::default();
        let ranges = ranges(&options);
        let tstz = DataTypeName::new("tstzrange");

        let found = ranges.find(None, Some(&tstz)).unwrap();
        assert_eq!(found.client, ClientType::Range(E::TimestampTz));

        let client = ClientType::Range(E::Int8);
        let found = ranges.find(Some(&client), Some(&tstz)).unwrap();
        assert!(!found.is_default);
        assert_eq!(found.oid, oid::TSTZRANGE);

        // client only lookup takes the first family declaring it
        let found = ranges.find(Some(&client), None).unwrap();
        assert_eq!(found.oid, oid::INT8RANGE);
    }

    #[test]
    fn elements_skip_integer_datetimes() {
        let options = TypeMapperOptions::default();
        let elements = elements(&options);
        let date = DataTypeName::new("date");
        assert!(elements.find(Some(&ClientType::Element(E::Int4)), Some(&date)).is_none());
        assert!(elements.find(Some(&ClientType::Element(E::Date)), Some(&date)).is_some());
        assert_eq!(elements.iter().filter(|m| m.is_default).count(), FAMILIES.len());
    }

    #[test]
    fn array_mappings_carry_element_oid() {
        let options = TypeMapperOptions::default();
        let arrays = multirange_arrays(&options);
        let name = DataTypeName::new("_datemultirange");
        let found = arrays.find(None, Some(&name)).unwrap();
        assert_eq!(found.element_oid, oid::DATEMULTIRANGE);
        assert_eq!(found.client, ClientType::MultirangeArray(E::Date, Container::Array));
    }

    #[test]
    fn unsupported_names_flag() {
        let mut options = TypeMapperOptions::default();
        options.arrays = false;
        let name = DataTypeName::new("_int4range");
        let err = UnsupportedResolver.get_type_info(None, Some(&name), &options).unwrap_err();
        assert!(matches!(err, UnsupportedError::NotEnabled { flag: "enable_arrays", .. }));

        let client = ClientType::Range(E::Timestamp);
        let name = DataTypeName::new("tstzrange");
        let err = UnsupportedResolver.get_type_info(Some(&client), Some(&name), &options).unwrap_err();
        assert!(matches!(err, UnsupportedError::NotEnabled { flag: "legacy_timestamp_behavior", .. }));

        let client = ClientType::Range(E::Numeric);
        let err = UnsupportedResolver.get_type_info(Some(&client), Some(&name), &options).unwrap_err();
        assert!(matches!(err, UnsupportedError::NoMapping { .. }));
    }
}
