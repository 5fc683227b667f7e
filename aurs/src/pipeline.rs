// aurs/src/pipeline.rs
pub mod planner;
pub mod runner;

use std::sync::Arc;

use aurs_common::config::Config;
use aurs_common::error::{AursError, Result};
use aurs_common::Session;
use aurs_core::{BatchedRegistry, PacmanDatabase, WorkerPool};
use aurs_net::RpcClient;
use tokio::task::JoinError;

/// Session backed by pacman and the AUR RPC, with registry lookups fanned
/// out over `pool`.
pub fn open_session(config: &Config, pool: &WorkerPool) -> Result<Session> {
    let database = PacmanDatabase::new()?;
    let registry = BatchedRegistry::new(RpcClient::new(config)?, pool.clone());
    Ok(Session::new(Arc::new(database), Arc::new(registry)))
}

pub(crate) fn join_error(e: JoinError) -> AursError {
    if e.is_panic() {
        let payload = e.into_panic();
        let message = match payload.downcast_ref::<&'static str>() {
            Some(s) => (*s).to_string(),
            None => match payload.downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Unknown panic payload".to_string(),
            },
        };
        AursError::Generic(format!("Worker task panicked: {message}"))
    } else {
        AursError::Cancelled(format!("Worker task did not finish: {e}"))
    }
}
