//! Concrete C2 implementation backed by `mysql_async`.
//!
//! Each [`MysqlReplicaConnection`] wraps exactly one `mysql_async::Conn` —
//! `mysql_async`'s own pooling is never used here. The proxy's
//! [`crate::pool::ReplicaPool`] is the single source of truth for how many
//! connections to a secondary are open at once.
use super::{ReplicaColumn, ReplicaConnection, ReplicaError, ReplicaResult, ReplicaRow};

use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Value};

#[derive(Debug, Clone)]
pub struct MysqlConnectOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db_name: String,
}

impl From<&MysqlConnectOpts> for Opts {
    fn from(o: &MysqlConnectOpts) -> Self {
        OptsBuilder::default()
            .ip_or_hostname(o.host.clone())
            .tcp_port(o.port)
            .user(Some(o.user.clone()))
            .pass(Some(o.password.clone()))
            .db_name(Some(o.db_name.clone()))
            .into()
    }
}

pub async fn connect(opts: &MysqlConnectOpts) -> Result<MysqlReplicaConnection, ReplicaError> {
    let conn = Conn::new(Opts::from(opts))
        .await
        .map_err(|e| ReplicaError::Connect(e.to_string()))?;
    Ok(MysqlReplicaConnection { conn, healthy: true })
}

pub struct MysqlReplicaConnection {
    conn: Conn,
    healthy: bool,
}

#[async_trait]
impl ReplicaConnection for MysqlReplicaConnection {
    async fn execute(&mut self, query: &str) -> Result<ReplicaResult, ReplicaError> {
        let query_result = self.conn.query_iter(query).await.map_err(|e| {
            self.healthy = false;
            ReplicaError::Query(e.to_string())
        });
        let mut query_result = query_result?;

        let columns = query_result
            .columns()
            .map(|cols| {
                cols.as_ref()
                    .iter()
                    .map(|c| ReplicaColumn {
                        name: c.name_str().into_owned(),
                        type_name: column_type_name(c.column_type()).to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<mysql_async::Row> = query_result
            .collect()
            .await
            .map_err(|e| ReplicaError::Query(e.to_string()))?;

        let rows = rows
            .into_iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| value_to_bytes(row.as_ref(i)))
                    .collect::<ReplicaRow>()
            })
            .collect();

        Ok(ReplicaResult { columns, rows })
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    async fn close(self: Box<Self>) {
        let _ = self.conn.disconnect().await;
    }
}

/// The database type name used to pick a wire column type when the result
/// is re-synthesized for the client. Kept deliberately small: only the
/// types the text protocol distinguishes from a plain string matter here.
fn column_type_name(t: ColumnType) -> &'static str {
    use ColumnType::*;
    match t {
        MYSQL_TYPE_TINY => "TINYINT",
        MYSQL_TYPE_SHORT => "SMALLINT",
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 => "INT",
        MYSQL_TYPE_LONGLONG => "BIGINT",
        MYSQL_TYPE_FLOAT => "FLOAT",
        MYSQL_TYPE_DOUBLE => "DOUBLE",
        MYSQL_TYPE_NEWDECIMAL | MYSQL_TYPE_DECIMAL => "DECIMAL",
        MYSQL_TYPE_DATE => "DATE",
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP => "DATETIME",
        MYSQL_TYPE_TIME => "TIME",
        MYSQL_TYPE_BLOB | MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB => {
            "BLOB"
        }
        _ => "VARCHAR",
    }
}

/// Renders one cell in the same textual form the MySQL text protocol uses,
/// since the response synthesizer always writes length-encoded strings.
fn value_to_bytes(v: Option<&Value>) -> Option<Vec<u8>> {
    match v {
        None | Some(Value::NULL) => None,
        Some(Value::Bytes(b)) => Some(b.clone()),
        Some(Value::Int(i)) => Some(i.to_string().into_bytes()),
        Some(Value::UInt(i)) => Some(i.to_string().into_bytes()),
        Some(Value::Float(f)) => Some(f.to_string().into_bytes()),
        Some(Value::Double(f)) => Some(f.to_string().into_bytes()),
        Some(other) => Some(format!("{other:?}").into_bytes()),
    }
}
