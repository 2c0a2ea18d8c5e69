use rust_decimal::Decimal;
use time::macros::datetime;

use pgwire_codec::{
    ConverterExt, Result,
    resolve::{TypeMapper, TypeMapperBuilder, Value},
    types::{Range, RangeBound},
};

pub async fn main() -> Result<()> {
    let mapper = TypeMapper::builder().build()?;

    // Name only, the default representation

    let info = mapper.resolve_name("numrange")?;
    tracing::info!(name = %info.name, client = %info.client, "resolved");

    let value = Value::from(Range::new(
        RangeBound::Inclusive(Decimal::new(15, 1)),
        RangeBound::Exclusive(Decimal::new(1_000, 0)),
    ));
    let bytes = info.codec.encode(&value)?;
    assert_eq!(info.codec.decode(bytes.freeze())?, value);

    // Rust type, any matching postgres type

    let info = mapper.resolve_typed::<Vec<Range<time::UtcDateTime>>>(Some("tstzmultirange"))?;
    let value = Value::MultirangeList(vec![
        Range::half_open(
            datetime!(2025-01-01 00:00 UTC).to_utc(),
            datetime!(2025-02-01 00:00 UTC).to_utc(),
        )
        .map(Value::from),
    ]);
    let bytes = info.codec.encode(&value)?;
    assert_eq!(info.codec.decode(bytes.freeze())?, value);

    // Legacy timestamps map `timestamptz` to a naive datetime

    let legacy = TypeMapper::builder().legacy_timestamp_behavior(true).build()?;
    let info = legacy.resolve_name("tstzrange")?;
    tracing::info!(client = %info.client, "legacy");

    // Disabled features name the switch

    let slim = TypeMapperBuilder::slim().build()?;
    let Err(err) = slim.resolve_typed::<Range<i32>>(None) else {
        unreachable!("ranges are disabled");
    };
    tracing::info!(%err, "unsupported");

    Ok(())
}
