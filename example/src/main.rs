use tracing::{Instrument, trace_span};
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use pgwire_codec::Result;

mod text_search;
mod ranges;
mod replication;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    text_search::main().instrument(trace_span!("text_search")).await?;
    ranges::main().instrument(trace_span!("ranges")).await?;
    replication::main().instrument(trace_span!("replication")).await?;

    Ok(())
}
