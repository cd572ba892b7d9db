//! Viewer-count gateway capability
//!
//! The external gateway knows how many spectators are watching each live
//! game. The trait keeps the live-games service testable without HTTP.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{OrchestrationError, Result};
use crate::types::GameId;

/// Capability to fetch current viewer counts for live games
#[async_trait]
pub trait ViewerGateway: Send + Sync {
    /// Viewer counts for all currently live games, keyed by game id.
    /// Games absent from the map have zero viewers.
    async fn live_games_viewers(&self) -> Result<HashMap<GameId, i64>>;
}

/// HTTP client for the spectator gateway
pub struct HttpViewerGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpViewerGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/live-games/viewers", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ViewerGateway for HttpViewerGateway {
    async fn live_games_viewers(&self) -> Result<HashMap<GameId, i64>> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| OrchestrationError::GatewayFailed {
                message: format!("request failed: {}", e),
            })?
            .error_for_status()
            .map_err(|e| OrchestrationError::GatewayFailed {
                message: format!("gateway returned error status: {}", e),
            })?;

        let counts: HashMap<GameId, i64> =
            response
                .json()
                .await
                .map_err(|e| OrchestrationError::GatewayFailed {
                    message: format!("invalid gateway response: {}", e),
                })?;

        debug!("Fetched viewer counts for {} games", counts.len());
        Ok(counts)
    }
}

/// Mock gateway with settable counts, for tests
#[derive(Debug, Default)]
pub struct MockViewerGateway {
    counts: Mutex<HashMap<GameId, i64>>,
}

impl MockViewerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewers(&self, game_id: GameId, viewers: i64) {
        self.counts
            .lock()
            .expect("gateway lock poisoned")
            .insert(game_id, viewers);
    }
}

#[async_trait]
impl ViewerGateway for MockViewerGateway {
    async fn live_games_viewers(&self) -> Result<HashMap<GameId, i64>> {
        Ok(self.counts.lock().expect("gateway lock poisoned").clone())
    }
}
