//! Utility functions for the orchestration service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique game ID
pub fn generate_game_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate an identifier for this service instance, used to key the
/// owned-game list in the distributed cache
pub fn generate_instance_id() -> String {
    format!("arbiter-{}", Uuid::new_v4())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
