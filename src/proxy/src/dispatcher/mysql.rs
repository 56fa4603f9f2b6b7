//! Dual-pipe dispatcher for one MySQL client connection.
use super::{ClientWriter, ExitFlag};
use crate::classifier::{Classifier, Statement};
use crate::protocol::mysql::frame::extract_query;
use crate::protocol::mysql::packet::packet_writer::PacketWriter;
use crate::protocol::mysql::synth;
use crate::weighted::WeightedReplicas;

use std::sync::Arc;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Matches the original proxy's read buffer size; large enough for any
/// single-packet `COM_QUERY` this proxy is expected to classify.
const READ_BUF_LEN: usize = 65536;

enum RouteOutcome {
    Unrouted,
    Routed,
    /// A replica was supposed to answer and didn't; the client never got
    /// a response to its `COM_QUERY`, so the session must end rather than
    /// silently hang or fall back to the primary.
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

/// Mirrors `delegateSelect`: classifies the statement and updates
/// `in_transaction`.
async fn route_if_select(
    buffer: &[u8],
    n: usize,
    replicas: &WeightedReplicas,
    classifier: &Classifier,
    in_transaction: &mut bool,
    client_writer: ClientWriter,
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

    // every instance refuses to start with an empty replica set, so this
    // is always Some once we get here
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

    let seq = buffer[3].wrapping_add(1);
    let mut writer = PacketWriter::new(client_writer);
    if let Err(e) = synth::write_result(&mut writer, seq, &result).await {
        tracing::warn!(error = %e, "writing synthesized result to client");
        return RouteOutcome::Failed;
    }
    RouteOutcome::Routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ReplicaConnector, ReplicaPool};
    use crate::replica::{ReplicaColumn, ReplicaConnection, ReplicaError, ReplicaResult};
    use crate::weighted::WeightedReplica;
    use std::time::Duration;
    use tokio::net::TcpListener;

    struct FixedConn {
        result: ReplicaResult,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ReplicaConnection for FixedConn {
        async fn execute(&mut self, _query: &str) -> Result<ReplicaResult, ReplicaError> {
            if self.fail {
                return Err(ReplicaError::Query("boom".into()));
            }
            Ok(self.result.clone())
        }
        fn is_healthy(&self) -> bool {
            true
        }
        async fn close(self: Box<Self>) {}
    }

    struct FixedConnector {
        result: ReplicaResult,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ReplicaConnector for FixedConnector {
        async fn open(&self) -> Result<Box<dyn ReplicaConnection>, ReplicaError> {
            Ok(Box::new(FixedConn {
                result: self.result.clone(),
                fail: self.fail,
            }))
        }
    }

    /// A loopback TCP pair standing in for the client socket: the returned
    /// `ClientWriter` drives the write half exactly as the dispatcher
    /// would, and the returned `TcpStream` is the peer the test reads the
    /// synthesized bytes back from.
    async fn client_writer_pair() -> (ClientWriter, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client_side, accepted) =
            tokio::join!(TcpStream::connect(addr), listener.accept());
        let (_, write_half) = client_side.unwrap().into_split();
        (ClientWriter::spawn(write_half), accepted.unwrap().0)
    }

    async fn single_replica(result: ReplicaResult, fail: bool) -> Arc<WeightedReplicas> {
        let pool = ReplicaPool::open(
            Arc::new(FixedConnector { result, fail }),
            0,
            1,
            Duration::from_secs(60),
        )
        .await
        .unwrap();
        Arc::new(WeightedReplicas::new(vec![WeightedReplica {
            name: "r1".into(),
            pool,
            weight: 1,
        }]))
    }

    fn com_query(seq: u8, sql: &str) -> Vec<u8> {
        let mut buf = vec![0u8, 0, 0, seq, 0x03];
        buf.extend_from_slice(sql.as_bytes());
        buf
    }

    #[tokio::test]
    async fn select_outside_transaction_routes_and_synthesizes_response() {
        let result = ReplicaResult {
            columns: vec![ReplicaColumn {
                name: "a".into(),
                type_name: "VARCHAR".into(),
            }],
            rows: vec![vec![Some(b"x".to_vec())], vec![Some(b"y".to_vec())]],
        };
        let replicas = single_replica(result, false).await;
        let classifier = Classifier::new();
        let (writer, mut server_side) = client_writer_pair().await;
        let mut in_tx = false;

        let buf = com_query(7, "SELECT a FROM t");
        let n = buf.len();
        let outcome =
            route_if_select(&buf, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(matches!(outcome, RouteOutcome::Routed));
        assert!(!in_tx, "a bare SELECT must not open a transaction");

        let mut out = vec![0u8; 4096];
        let read = server_side.read(&mut out).await.unwrap();
        assert!(read > 0, "synthesized response must reach the client");
        // sequence numbers continue from the client's COM_QUERY seq byte
        assert_eq!(out[3], 8);
    }

    #[tokio::test]
    async fn insert_is_unrouted_and_leaves_transaction_state_untouched() {
        let replicas = single_replica(ReplicaResult::default(), false).await;
        let classifier = Classifier::new();
        let (writer, _server_side) = client_writer_pair().await;
        let mut in_tx = false;

        let buf = com_query(0, "INSERT INTO t VALUES (1)");
        let n = buf.len();
        let outcome =
            route_if_select(&buf, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(matches!(outcome, RouteOutcome::Unrouted));
        assert!(!in_tx);
    }

    #[tokio::test]
    async fn select_inside_transaction_is_unrouted() {
        let replicas = single_replica(ReplicaResult::default(), false).await;
        let classifier = Classifier::new();
        let (writer, _server_side) = client_writer_pair().await;
        let mut in_tx = true;

        let buf = com_query(0, "SELECT 1");
        let n = buf.len();
        let outcome =
            route_if_select(&buf, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(matches!(outcome, RouteOutcome::Unrouted));
        assert!(in_tx, "a SELECT inside a transaction stays in it");
    }

    #[tokio::test]
    async fn begin_and_commit_toggle_transaction_state() {
        let replicas = single_replica(ReplicaResult::default(), false).await;
        let classifier = Classifier::new();
        let mut in_tx = false;

        let (writer, _s1) = client_writer_pair().await;
        let begin = com_query(0, "START TRANSACTION");
        let n = begin.len();
        route_if_select(&begin, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(in_tx);

        let (writer, _s2) = client_writer_pair().await;
        let commit = com_query(0, "COMMIT");
        let n = commit.len();
        route_if_select(&commit, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(!in_tx);
    }

    #[tokio::test]
    async fn replica_failure_ends_the_session_instead_of_falling_back() {
        let replicas = single_replica(ReplicaResult::default(), true).await;
        let classifier = Classifier::new();
        let (writer, _server_side) = client_writer_pair().await;
        let mut in_tx = false;

        let buf = com_query(0, "SELECT 1");
        let n = buf.len();
        let outcome =
            route_if_select(&buf, n, &replicas, &classifier, &mut in_tx, writer).await;
        assert!(matches!(outcome, RouteOutcome::Failed));
    }
}
