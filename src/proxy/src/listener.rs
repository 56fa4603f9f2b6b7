//! C9: binds one listening socket per configured proxy instance and
//! spawns a dispatcher for each accepted client.
use crate::classifier::Classifier;
use crate::config::{Proxy, SecondaryDb};
use crate::dispatcher::{mysql as mysql_dispatch, postgres as pg_dispatch};
use crate::error::ProxyError;
use crate::pool::{ReplicaConnector, ReplicaPool};
use crate::replica::mysql::{self as mysql_replica, MysqlConnectOpts};
use crate::replica::postgres::{self as pg_replica, PgConnectOpts};
use crate::replica::{ReplicaConnection, ReplicaError};
use crate::weighted::{WeightedReplica, WeightedReplicas};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    MySql,
    Postgres,
}

struct MysqlConnector(MysqlConnectOpts);

#[async_trait]
impl ReplicaConnector for MysqlConnector {
    async fn open(&self) -> Result<Box<dyn ReplicaConnection>, ReplicaError> {
        Ok(Box::new(mysql_replica::connect(&self.0).await?))
    }
}

struct PgConnector(PgConnectOpts);

#[async_trait]
impl ReplicaConnector for PgConnector {
    async fn open(&self) -> Result<Box<dyn ReplicaConnection>, ReplicaError> {
        Ok(Box::new(pg_replica::connect(&self.0).await?))
    }
}

async fn open_weighted_pool(
    protocol: Protocol,
    secondary: &SecondaryDb,
) -> Result<Option<WeightedReplica>, ProxyError> {
    if secondary.weight <= 0 {
        return Ok(None);
    }

    let connector: Arc<dyn ReplicaConnector> = match protocol {
        Protocol::MySql => Arc::new(MysqlConnector(MysqlConnectOpts {
            host: secondary.host.clone(),
            port: secondary.port,
            user: secondary.user.clone(),
            password: secondary.password.clone(),
            db_name: secondary.db_name.clone(),
        })),
        Protocol::Postgres => Arc::new(PgConnector(PgConnectOpts {
            host: secondary.host.clone(),
            port: secondary.port,
            user: secondary.user.clone(),
            password: secondary.password.clone(),
            db_name: secondary.db_name.clone(),
        })),
    };

    let pool = ReplicaPool::open(
        connector,
        secondary.max_idle_conn_count() as usize,
        secondary.max_open_conns_count() as usize,
        secondary.conn_max_lifetime(),
    )
    .await?;

    Ok(Some(WeightedReplica {
        name: secondary.name.clone(),
        pool,
        weight: secondary.weight as u32,
    }))
}

/// A bound, running proxy instance: one listening socket forwarding or
/// routing to one primary and a weighted set of secondaries.
pub struct ProxyInstance {
    pub name: String,
    listener: TcpListener,
    primary_addr: String,
    replicas: Arc<WeightedReplicas>,
    classifier: Classifier,
    protocol: Protocol,
}

impl ProxyInstance {
    pub async fn bind(protocol: Protocol, proxy: &Proxy) -> Result<Self, ProxyError> {
        let listener = TcpListener::bind(&proxy.server.proxy_addr).await?;

        let mut replicas = Vec::with_capacity(proxy.db.secondaries.len());
        for secondary in &proxy.db.secondaries {
            if let Some(weighted) = open_weighted_pool(protocol, secondary).await? {
                replicas.push(weighted);
            }
        }

        // a weighted draw over zero replicas has no defined outcome, so an
        // instance with none configured (or all filtered by weight <= 0)
        // must not come up at all
        if replicas.is_empty() {
            return Err(ProxyError::NoReplicas {
                name: proxy.name.clone(),
            });
        }

        Ok(Self {
            name: proxy.name.clone(),
            listener,
            primary_addr: proxy.db.main.addr.clone(),
            replicas: Arc::new(WeightedReplicas::new(replicas)),
            classifier: Classifier::new(),
            protocol,
        })
    }

    /// Accepts clients until the listener errors. A single failed accept
    /// is logged and retried; it never brings down the instance.
    pub async fn serve(&self) {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(instance = %self.name, error = %e, "accept failed");
                    continue;
                }
            };

            tracing::debug!(instance = %self.name, %peer, "accepted client");

            let primary_addr = self.primary_addr.clone();
            let replicas = self.replicas.clone();
            let classifier = self.classifier.clone();
            let protocol = self.protocol;
            let instance_name = self.name.clone();

            tokio::spawn(async move {
                let result = match protocol {
                    Protocol::MySql => {
                        mysql_dispatch::dispatch(socket, primary_addr, replicas, classifier).await
                    }
                    Protocol::Postgres => {
                        pg_dispatch::dispatch(socket, primary_addr, replicas, classifier).await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(instance = %instance_name, %peer, error = %e, "client session ended");
                }
            });
        }
    }

    /// Closes every secondary pool. Called once on process shutdown.
    pub async fn close(&self) {
        for replica in self.replicas.iter() {
            replica.pool.close().await;
        }
    }
}
