//! Weighted-random selection among a proxy instance's secondaries (C8.1).
use crate::pool::ReplicaPool;

use rand::Rng;
use std::sync::Arc;

/// One weighted secondary: its configured name, its pool, and the weight
/// it contributes to the selection draw.
pub struct WeightedReplica {
    pub name: String,
    pub pool: Arc<ReplicaPool>,
    pub weight: u32,
}

/// Holds the replica set for one proxy instance and draws one of them
/// proportionally to its configured weight.
pub struct WeightedReplicas {
    replicas: Vec<WeightedReplica>,
    total_weight: u32,
}

impl WeightedReplicas {
    /// Secondaries with a weight of zero or less are filtered out by the
    /// config loader before this is constructed, so every entry here
    /// contributes at least 1 to `total_weight`.
    pub fn new(replicas: Vec<WeightedReplica>) -> Self {
        let total_weight = replicas.iter().map(|r| r.weight).sum();
        Self {
            replicas,
            total_weight,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedReplica> {
        self.replicas.iter()
    }

    /// Draws `r` in `[0, total_weight)` and walks the cumulative weight
    /// until it exceeds `r`, returning the first replica that does.
    pub fn choose(&self) -> Option<&WeightedReplica> {
        if self.replicas.is_empty() || self.total_weight == 0 {
            return None;
        }
        let r = rand::thread_rng().gen_range(0..self.total_weight);
        let mut cumulative = 0u32;
        for replica in &self.replicas {
            cumulative += replica.weight;
            if r < cumulative {
                return Some(replica);
            }
        }
        self.replicas.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ReplicaConnector;
    use crate::replica::{ReplicaConnection, ReplicaError, ReplicaResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct NoopConn;

    #[async_trait]
    impl ReplicaConnection for NoopConn {
        async fn execute(&mut self, _query: &str) -> Result<ReplicaResult, ReplicaError> {
            Ok(ReplicaResult::default())
        }
        fn is_healthy(&self) -> bool {
            true
        }
        async fn close(self: Box<Self>) {}
    }

    struct NoopConnector;

    #[async_trait]
    impl ReplicaConnector for NoopConnector {
        async fn open(&self) -> Result<Box<dyn ReplicaConnection>, ReplicaError> {
            Ok(Box::new(NoopConn))
        }
    }

    async fn replica(name: &str, weight: u32) -> WeightedReplica {
        let pool = ReplicaPool::open(Arc::new(NoopConnector), 0, 1, Duration::from_secs(60))
            .await
            .unwrap();
        WeightedReplica {
            name: name.to_string(),
            pool,
            weight,
        }
    }

    #[tokio::test]
    async fn selection_is_roughly_proportional_to_weight() {
        let replicas = vec![replica("heavy", 9).await, replica("light", 1).await];
        let set = WeightedReplicas::new(replicas);

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..10_000 {
            let chosen = set.choose().expect("non-empty replica set");
            *counts.entry(chosen.name.clone()).or_default() += 1;
        }

        let heavy = *counts.get("heavy").unwrap_or(&0) as f64;
        let light = *counts.get("light").unwrap_or(&0) as f64;
        let ratio = heavy / light.max(1.0);
        // expected ratio is 9:1; allow generous slack for a statistical test
        assert!(ratio > 5.0 && ratio < 15.0, "ratio was {ratio}");
    }

    #[tokio::test]
    async fn empty_set_chooses_nothing() {
        let set = WeightedReplicas::new(vec![]);
        assert!(set.choose().is_none());
    }
}
