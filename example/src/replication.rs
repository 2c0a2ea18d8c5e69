use std::env;

use pgwire_codec::{
    Result,
    io::{PgReader, TokioIo},
    replication::{PgOutputDecoder, PgOutputMessage, ReplicationEvent},
};

/// Decode a captured `pgoutput` copy stream, the raw backend bytes following `CopyBothResponse`.
pub async fn main() -> Result<()> {
    let Ok(path) = env::var("REPLICATION_DUMP") else {
        tracing::info!("REPLICATION_DUMP not set, skipping");
        return Ok(());
    };

    let file = tokio::fs::File::open(&path).await?;
    let mut decoder = PgOutputDecoder::new(PgReader::new(TokioIo(file)));

    while let Some(event) = decoder.next().await? {
        let (header, message) = match event {
            ReplicationEvent::Keepalive(keepalive) => {
                tracing::debug!(wal_end = %keepalive.wal_end, "keepalive");
                continue;
            }
            ReplicationEvent::Notice(notice) => {
                tracing::warn!(%notice, "server notice");
                continue;
            }
            ReplicationEvent::Message(header, message) => (header, message),
        };

        match message {
            PgOutputMessage::Begin(begin) => {
                tracing::info!(xid = begin.xid, lsn = %header.wal_start, "begin");
            }
            PgOutputMessage::Commit(commit) => {
                tracing::info!(lsn = %commit.end_lsn, "commit");
            }
            PgOutputMessage::Relation(relation) => {
                tracing::info!(
                    table = %format_args!("{}.{}", relation.namespace, relation.name),
                    columns = relation.columns.len(),
                    "relation",
                );
            }
            PgOutputMessage::Insert(mut insert) => {
                let table = &insert.relation().name;
                if let Some(mut row) = insert.new_row().await? {
                    while let Some((column, data)) = row.next_column().await? {
                        tracing::info!(%table, column = %column.name, ?data, "insert");
                    }
                }
            }
            PgOutputMessage::Update(mut update) => {
                let table = &update.relation().name;
                if let Some(row) = update.new_row().await? {
                    tracing::info!(%table, row = ?row.collect().await?, "update");
                }
            }
            PgOutputMessage::Delete(delete) => {
                // old row left unread, skipped by the decoder
                tracing::info!(table = %delete.relation().name, kind = ?delete.kind, "delete");
            }
            message => tracing::debug!(tag = %(message.tag() as char), "other"),
        }
    }

    Ok(())
}
