use pgwire_codec::{
    ConverterExt, Result,
    convert::TsQueryConverter,
    types::{TsQuery, TsQueryLexeme, Weight},
};

pub async fn main() -> Result<()> {
    // Parse

    let query = TsQuery::parse("'supernovae' & !crab:AB & (star:* <2> nebula)")?;
    tracing::info!(%query, "parsed");

    let built = TsQuery::phrase(
        TsQuery::Lexeme(TsQueryLexeme::new("star").with_prefix(true)),
        2,
        TsQuery::Lexeme(TsQueryLexeme::new("nebula").with_weight(Weight::A | Weight::B)),
    );
    tracing::info!(query = %built, "built");

    // Binary

    let converter = TsQueryConverter::new();
    for query in [query, built, TsQuery::parse("")?] {
        let bytes = converter.encode(&query)?;
        let decoded = converter.decode(bytes.freeze())?;
        assert_eq!(decoded, query);
    }

    // Nesting beyond the limit is rejected

    let deep = (0..8).fold(TsQuery::lexeme("a"), |query, _| TsQuery::not(query));
    let bytes = converter.encode(&deep)?;
    let err = TsQueryConverter::new().with_max_depth(4).decode(bytes.freeze()).unwrap_err();
    tracing::info!(%err, "rejected");

    Ok(())
}
