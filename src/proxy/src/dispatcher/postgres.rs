//! Dual-pipe dispatcher for one PostgreSQL client connection.
use super::{ClientWriter, ExitFlag};
use crate::classifier::{Classifier, Statement};
use crate::protocol::postgres::frame::extract_query;
use crate::protocol::postgres::synth;
use crate::weighted::WeightedReplicas;

use std::sync::Arc;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_BUF_LEN: usize = 65536;

enum RouteOutcome {
    Unrouted,
    Routed,
    Failed,
}

pub async fn dispatch(
    client: TcpStream,
    primary_addr: String,
    replicas: Arc<WeightedReplicas>,
    classifier: Classifier,
) -> io::Result<()> {
    let primary = TcpStream::connect(&primary_addr).await?;
    let (mut primary_read, mut primary_write) = primary.into_split();
    let (mut client_read, client_write) = client.into_split();

    let client_writer = ClientWriter::spawn(client_write);
    let exit = ExitFlag::default();

    let outbound_exit = exit.clone();
    let mut outbound_writer = client_writer.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUF_LEN];
        loop {
            let n = match primary_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    if !outbound_exit.is_set() {
                        tracing::warn!(error = %e, "reading from primary");
                    }
                    break;
                }
            };
            if outbound_writer.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    });

    let mut in_transaction = false;
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = match client_read.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "reading from client");
                break;
            }
        };

        let outcome = route_if_select(
            &buf,
            n,
            &replicas,
            &classifier,
            &mut in_transaction,
            client_writer.clone(),
        )
        .await;

        match outcome {
            RouteOutcome::Routed => {}
            RouteOutcome::Failed => break,
            RouteOutcome::Unrouted => {
                if primary_write.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
        }
    }

    exit.set();
    Ok(())
}

async fn route_if_select(
    buffer: &[u8],
    n: usize,
    replicas: &WeightedReplicas,
    classifier: &Classifier,
    in_transaction: &mut bool,
    mut client_writer: ClientWriter,
) -> RouteOutcome {
    let Some(sql) = extract_query(buffer, n) else {
        return RouteOutcome::Unrouted;
    };
    let sql = sql.trim();

    match classifier.classify(sql) {
        Statement::Select if !*in_transaction => {}
        Statement::BeginTransaction => {
            *in_transaction = true;
            return RouteOutcome::Unrouted;
        }
        Statement::EndTransaction => {
            *in_transaction = false;
            return RouteOutcome::Unrouted;
        }
        _ => return RouteOutcome::Unrouted,
    }

    let replica = replicas.choose().expect("replica set is never empty");

    let mut conn = match replica.pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(replica = %replica.name, error = %e, "checking out replica connection");
            return RouteOutcome::Failed;
        }
    };

    let result = match conn.execute(sql).await {
        Ok(result) => {
            replica.pool.put(conn).await;
            result
        }
        Err(e) => {
            tracing::warn!(replica = %replica.name, error = %e, "executing routed query");
            conn.close().await;
            return RouteOutcome::Failed;
        }
    };

    if let Err(e) = synth::write_result(&mut client_writer, &result).await {
        tracing::warn!(error = %e, "writing synthesized result to client");
        return RouteOutcome::Failed;
    }
    RouteOutcome::Routed
}
