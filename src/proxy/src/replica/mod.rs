//! C2: the abstract surface a dispatcher routes a SELECT through. Neither
//! `mysql_async` nor `tokio_postgres` is exposed past this module — the
//! rest of the proxy only ever sees a [`ReplicaConnection`].
pub mod mysql;
pub mod postgres;

use async_trait::async_trait;

/// A column of a synthesized result set, as reported by the replica driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaColumn {
    pub name: String,
    /// The driver's database-level type name (e.g. `"VARCHAR"`, `"INT4"`),
    /// used by the protocol-specific synthesizer to pick a wire type.
    pub type_name: String,
}

/// One row of raw column bytes. `None` stands for SQL NULL.
pub type ReplicaRow = Vec<Option<Vec<u8>>>;

/// A single query's result: its column shape and its rows.
#[derive(Debug, Clone, Default)]
pub struct ReplicaResult {
    pub columns: Vec<ReplicaColumn>,
    pub rows: Vec<ReplicaRow>,
}

/// A pooled connection to one secondary. Implementations wrap a concrete
/// driver connection; the pool only knows how to open, execute, and close
/// one of these.
#[async_trait]
pub trait ReplicaConnection: Send {
    async fn execute(&mut self, query: &str) -> Result<ReplicaResult, ReplicaError>;

    /// Whether this connection is still believed to be usable. A pool
    /// consults this before handing a connection back out, and drops it
    /// instead of recycling it if this returns `false`.
    fn is_healthy(&self) -> bool;

    async fn close(self: Box<Self>);
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("connecting to replica: {0}")]
    Connect(String),
    #[error("executing query: {0}")]
    Query(String),
}
