// aurs-core/src/registry.rs
use std::sync::Arc;

use aurs_common::error::Result;
use aurs_common::model::PackageRef;
use aurs_common::universe::RegistryClient;
use aurs_net::{RpcClient, RpcPackage};
use tracing::debug;

use crate::pipeline::engine::WorkerPool;

/// `RegistryClient` that splits an info lookup into RPC-sized batches and
/// runs them concurrently on a bounded pool.
pub struct BatchedRegistry {
    client: Arc<RpcClient>,
    pool: WorkerPool,
}

impl BatchedRegistry {
    pub fn new(client: RpcClient, pool: WorkerPool) -> Self {
        Self {
            client: Arc::new(client),
            pool,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

impl RegistryClient for BatchedRegistry {
    fn info(&self, names: &[String]) -> Result<Vec<PackageRef>> {
        let batches: Vec<Vec<String>> = names
            .chunks(self.client.batch_size())
            .map(<[String]>::to_vec)
            .collect();
        debug!(
            "Fetching AUR info for {} name(s) in {} batch(es)",
            names.len(),
            batches.len()
        );
        let jobs: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let client = Arc::clone(&self.client);
                move || client.info_batch(&batch)
            })
            .collect();
        Ok(self
            .pool
            .run_batch(jobs)?
            .into_iter()
            .flatten()
            .map(RpcPackage::into_package_ref)
            .collect())
    }
}
