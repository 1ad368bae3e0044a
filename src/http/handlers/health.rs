use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Serialize)]
pub struct ChainHealth {
    pub enabled: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok`, or `degraded` when the chain is enabled but unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub users: usize,
    pub provisioning_in_flight: usize,
    pub blockchain: ChainHealth,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let blockchain = match &state.blockchain {
        Some(client) => {
            let block_number = client.get_block_number().await.ok();
            let healthy = block_number.is_some();
            metrics::record_rpc_health(healthy);
            ChainHealth {
                enabled: true,
                healthy,
                block_number,
            }
        }
        None => ChainHealth {
            enabled: false,
            healthy: false,
            block_number: None,
        },
    };

    let status = if blockchain.enabled && !blockchain.healthy {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        users: state.store.len(),
        provisioning_in_flight: state.provisioner.in_flight(),
        blockchain,
    })
}
