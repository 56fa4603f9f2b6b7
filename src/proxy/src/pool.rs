//! C1: a bounded pool of replica connections for a single secondary.
//!
//! Mirrors the shape of the original connection pool this proxy replaces:
//! a channel of idle connections, a non-blocking `get` that synthesizes a
//! fresh connection when the channel is empty, a `put` that drops the
//! connection instead of blocking when the channel is full, and a coarse
//! background reaper that trims idle connections down toward `min_conns`
//! on a fixed tick rather than tracking a per-connection TTL.
use crate::replica::ReplicaConnection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,
    #[error("opening replica connection: {0}")]
    Connect(#[from] crate::replica::ReplicaError),
}

/// Something that can open a brand-new connection on demand. Implemented
/// by the concrete MySQL/Postgres connector functions in `replica::*`.
#[async_trait]
pub trait ReplicaConnector: Send + Sync + 'static {
    async fn open(&self) -> Result<Box<dyn ReplicaConnection>, crate::replica::ReplicaError>;
}

pub struct ReplicaPool {
    connector: Arc<dyn ReplicaConnector>,
    idle_tx: mpsc::Sender<Box<dyn ReplicaConnection>>,
    idle_rx: tokio::sync::Mutex<mpsc::Receiver<Box<dyn ReplicaConnection>>>,
    min_conns: usize,
    max_conns: usize,
    closed: Arc<AtomicBool>,
}

impl ReplicaPool {
    /// Opens `min_conns` connections up front and starts the idle reaper.
    /// `max_conns` bounds the idle channel's capacity, not the number of
    /// connections ever issued: `get` still synthesizes a new connection
    /// when the channel is drained, same as the pool it replaces.
    ///
    /// Fails on the first pre-warm connection the factory can't establish,
    /// mirroring the original pool's sequential `Open()` loop: it returns
    /// the error immediately rather than continuing to try the rest of
    /// `min_conns`.
    pub async fn open(
        connector: Arc<dyn ReplicaConnector>,
        min_conns: usize,
        max_conns: usize,
        idle_timeout: Duration,
    ) -> Result<Arc<Self>, PoolError> {
        let max_conns = max_conns.max(min_conns).max(1);
        let (idle_tx, idle_rx) = mpsc::channel(max_conns);

        for _ in 0..min_conns {
            match connector.open().await {
                // capacity was just sized to at least min_conns, so this can't block
                Ok(conn) => {
                    let _ = idle_tx.try_send(conn);
                }
                Err(e) => return Err(PoolError::Connect(e)),
            }
        }

        let pool = Arc::new(Self {
            connector,
            idle_tx,
            idle_rx: tokio::sync::Mutex::new(idle_rx),
            min_conns,
            max_conns,
            closed: Arc::new(AtomicBool::new(false)),
        });

        pool.clone().spawn_reaper(idle_timeout);
        Ok(pool)
    }

    fn spawn_reaper(self: Arc<Self>, idle_timeout: Duration) {
        tokio::spawn(async move {
            let mut ticks = interval(idle_timeout);
            loop {
                ticks.tick().await;
                if self.closed.load(Ordering::Acquire) {
                    return;
                }
                self.reap_once().await;
            }
        });
    }

    /// Drains and closes however many connections sit above `min_conns`
    /// right now. This is a point-in-time snapshot, not a per-connection
    /// idle timer: a connection that arrived a moment ago is just as
    /// eligible as one that's been idle the whole interval.
    async fn reap_once(&self) {
        let mut rx = self.idle_rx.lock().await;
        let idle_len = rx.len();
        let excess = idle_len.saturating_sub(self.min_conns);
        for _ in 0..excess {
            match rx.try_recv() {
                Ok(conn) => conn.close().await,
                Err(_) => break,
            }
        }
    }

    /// Never blocks: pops an idle connection if one's waiting, otherwise
    /// opens a brand-new one.
    pub async fn get(&self) -> Result<Box<dyn ReplicaConnection>, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let popped = {
            let mut rx = self.idle_rx.lock().await;
            rx.try_recv().ok()
        };
        match popped {
            Some(conn) if conn.is_healthy() => Ok(conn),
            Some(conn) => {
                conn.close().await;
                Ok(self.connector.open().await?)
            }
            None => Ok(self.connector.open().await?),
        }
    }

    /// Returns a connection to the idle set, or closes it immediately if
    /// the pool is closed or already at capacity.
    pub async fn put(&self, conn: Box<dyn ReplicaConnection>) {
        if self.closed.load(Ordering::Acquire) || !conn.is_healthy() {
            conn.close().await;
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(conn))
        | Err(mpsc::error::TrySendError::Closed(conn)) = self.idle_tx.try_send(conn)
        {
            conn.close().await;
        }
    }

    pub fn max_conns(&self) -> usize {
        self.max_conns
    }

    /// Marks the pool closed and drains and closes every idle connection.
    /// Connections already checked out simply get closed by `put` once
    /// their caller returns them.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut rx = self.idle_rx.lock().await;
        while let Ok(conn) = rx.try_recv() {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::{ReplicaError, ReplicaResult};

    struct FakeConn {
        healthy: bool,
    }

    #[async_trait]
    impl ReplicaConnection for FakeConn {
        async fn execute(&mut self, _query: &str) -> Result<ReplicaResult, ReplicaError> {
            Ok(ReplicaResult::default())
        }

        fn is_healthy(&self) -> bool {
            self.healthy
        }

        async fn close(self: Box<Self>) {}
    }

    struct FakeConnector;

    #[async_trait]
    impl ReplicaConnector for FakeConnector {
        async fn open(&self) -> Result<Box<dyn ReplicaConnection>, ReplicaError> {
            Ok(Box::new(FakeConn { healthy: true }))
        }
    }

    #[tokio::test]
    async fn get_synthesizes_when_idle_set_is_empty() {
        let pool = ReplicaPool::open(Arc::new(FakeConnector), 0, 4, Duration::from_secs(60))
            .await
            .unwrap();
        let conn = pool.get().await.unwrap();
        assert!(conn.is_healthy());
    }

    #[tokio::test]
    async fn put_closes_unhealthy_connections_instead_of_recycling() {
        let pool = ReplicaPool::open(Arc::new(FakeConnector), 0, 4, Duration::from_secs(60))
            .await
            .unwrap();
        pool.put(Box::new(FakeConn { healthy: false })).await;
        // the unhealthy connection was dropped, not queued, so get() must
        // synthesize a fresh one rather than returning it back out
        let conn = pool.get().await.unwrap();
        assert!(conn.is_healthy());
    }

    #[tokio::test]
    async fn close_drains_idle_connections() {
        let pool = ReplicaPool::open(Arc::new(FakeConnector), 2, 4, Duration::from_secs(60))
            .await
            .unwrap();
        pool.close().await;
        assert!(matches!(pool.get().await, Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn reaper_trims_idle_connections_toward_min() {
        let pool = ReplicaPool::open(Arc::new(FakeConnector), 1, 4, Duration::from_secs(60))
            .await
            .unwrap();
        pool.put(Box::new(FakeConn { healthy: true })).await;
        pool.put(Box::new(FakeConn { healthy: true })).await;
        pool.put(Box::new(FakeConn { healthy: true })).await;
        // 1 pre-warmed + 3 returned = 4 idle, min is 1
        pool.reap_once().await;
        let mut rx = pool.idle_rx.lock().await;
        assert_eq!(rx.len(), 1);
    }
}
