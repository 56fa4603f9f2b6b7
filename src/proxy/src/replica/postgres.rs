//! Concrete C2 implementation backed by `tokio_postgres`.
//!
//! Column shape comes from `prepare()` (a parse + describe round trip,
//! no execution) and row values come from `simple_query()`, which always
//! returns text-format values — exactly what the Postgres response
//! synthesizer needs to re-emit as `DataRow` values.
use super::{ReplicaColumn, ReplicaConnection, ReplicaError, ReplicaResult, ReplicaRow};

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

#[derive(Debug, Clone)]
pub struct PgConnectOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db_name: String,
}

impl PgConnectOpts {
    fn conn_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.db_name
        )
    }
}

pub async fn connect(opts: &PgConnectOpts) -> Result<PgReplicaConnection, ReplicaError> {
    let (client, connection) = tokio_postgres::connect(&opts.conn_string(), NoTls)
        .await
        .map_err(|e| ReplicaError::Connect(e.to_string()))?;

    // The connection object performs the actual IO; it must be driven to
    // completion by a task of its own for the lifetime of this slot.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "postgres replica connection task ended");
        }
    });

    Ok(PgReplicaConnection {
        client,
        healthy: true,
    })
}

pub struct PgReplicaConnection {
    client: Client,
    healthy: bool,
}

#[async_trait]
impl ReplicaConnection for PgReplicaConnection {
    async fn execute(&mut self, query: &str) -> Result<ReplicaResult, ReplicaError> {
        let columns = match self.client.prepare(query).await {
            Ok(stmt) => stmt
                .columns()
                .iter()
                .map(|c| ReplicaColumn {
                    name: c.name().to_string(),
                    type_name: c.type_().name().to_uppercase(),
                })
                .collect(),
            Err(e) => {
                self.healthy = false;
                return Err(ReplicaError::Query(e.to_string()));
            }
        };

        let messages = self.client.simple_query(query).await.map_err(|e| {
            self.healthy = false;
            ReplicaError::Query(e.to_string())
        })?;

        let rows = messages
            .into_iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| row.get(i).map(|s| s.as_bytes().to_vec()))
                    .collect::<ReplicaRow>()
            })
            .collect();

        Ok(ReplicaResult { columns, rows })
    }

    fn is_healthy(&self) -> bool {
        self.healthy && !self.client.is_closed()
    }

    async fn close(self: Box<Self>) {}
}
