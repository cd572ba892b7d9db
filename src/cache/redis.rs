//! Redis-backed game cache
//!
//! Game creation runs as a Lua script so the create-if-absent check, both
//! player index writes, and the owned-list append land in one atomic round
//! trip. Sweep deactivations go through a single pipeline per tick.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::{debug, info};

use super::{game_key, instance_games_key, player_key, CachedGameRecord, GameCache};
use crate::error::{OrchestrationError, Result};
use crate::game::Game;
use crate::types::GameId;

/// Creates the game entry only if absent; index writes happen only on
/// successful creation.
const ADD_GAME_SCRIPT: &str = r#"
if redis.call('SETNX', KEYS[1], ARGV[1]) == 1 then
    redis.call('SET', KEYS[2], ARGV[2])
    redis.call('SET', KEYS[3], ARGV[2])
    redis.call('RPUSH', KEYS[4], ARGV[2])
    return 1
end
return 0
"#;

/// Game cache backed by a shared Redis deployment.
pub struct RedisGameCache {
    conn: ConnectionManager,
    instance_id: String,
    finished_game_ttl: Duration,
    add_game_script: Script,
}

impl RedisGameCache {
    /// Connect to Redis. Fails when the backend is unreachable, which must
    /// abort service startup.
    pub async fn connect(
        url: &str,
        instance_id: String,
        finished_game_ttl: Duration,
    ) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| OrchestrationError::CacheFailed {
            message: format!("invalid redis url: {}", e),
        })?;

        let conn = client.get_connection_manager().await.map_err(|e| {
            OrchestrationError::CacheFailed {
                message: format!("failed to connect to redis: {}", e),
            }
        })?;

        info!("Connected to game cache at {}", url);

        Ok(Self {
            conn,
            instance_id,
            finished_game_ttl,
            add_game_script: Script::new(ADD_GAME_SCRIPT),
        })
    }

    fn cache_err(context: &str, e: redis::RedisError) -> anyhow::Error {
        OrchestrationError::CacheFailed {
            message: format!("{}: {}", context, e),
        }
        .into()
    }

    fn record_json(game: &Game) -> Result<String> {
        serde_json::to_string(&CachedGameRecord::from_game(game)).map_err(|e| {
            OrchestrationError::InternalError {
                message: format!("failed to serialize game record: {}", e),
            }
            .into()
        })
    }

    fn parse_record(raw: &str) -> Result<Game> {
        let record: CachedGameRecord =
            serde_json::from_str(raw).map_err(|e| OrchestrationError::MalformedGame {
                reason: format!("corrupt cache record: {}", e),
            })?;
        record.into_game()
    }

    /// Append the delete-indexes-and-expire commands for one game.
    fn push_deactivation(pipe: &mut redis::Pipeline, game: &Game, record: &str, ttl_secs: u64) {
        pipe.del(player_key(&game.player1().id))
            .ignore()
            .del(player_key(&game.player2().id))
            .ignore()
            .cmd("SET")
            .arg(game_key(&game.id()))
            .arg(record)
            .arg("EX")
            .arg(ttl_secs)
            .ignore();
    }
}

#[async_trait]
impl GameCache for RedisGameCache {
    async fn add_game(&self, game: &Game) -> Result<bool> {
        let record = Self::record_json(game)?;
        let mut conn = self.conn.clone();

        let created: i64 = self
            .add_game_script
            .key(game_key(&game.id()))
            .key(player_key(&game.player1().id))
            .key(player_key(&game.player2().id))
            .key(instance_games_key(&self.instance_id))
            .arg(record)
            .arg(game.id().to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::cache_err("add_game", e))?;

        if created == 0 {
            debug!("Game {} already present in cache", game.id());
        }
        Ok(created == 1)
    }

    async fn update_game_move(&self, game: &Game) -> Result<()> {
        let record = Self::record_json(game)?;
        let mut conn = self.conn.clone();

        conn.set::<_, _, ()>(game_key(&game.id()), record)
            .await
            .map_err(|e| Self::cache_err("update_game_move", e))?;
        Ok(())
    }

    async fn update_and_deactivate_game(&self, game: &Game) -> Result<()> {
        self.deactivate_games(std::slice::from_ref(game)).await
    }

    async fn deactivate_games(&self, games: &[Game]) -> Result<()> {
        if games.is_empty() {
            return Ok(());
        }

        let ttl_secs = self.finished_game_ttl.as_secs().max(1);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for game in games {
            let record = Self::record_json(game)?;
            Self::push_deactivation(&mut pipe, game, &record, ttl_secs);
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| Self::cache_err("deactivate_games", e))?;
        Ok(())
    }

    async fn player_has_game(&self, player_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(player_key(player_id))
            .await
            .map_err(|e| Self::cache_err("player_has_game", e))
    }

    async fn get_game_by_id(&self, game_id: &GameId) -> Result<Option<Game>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(game_key(game_id))
            .await
            .map_err(|e| Self::cache_err("get_game_by_id", e))?;

        raw.map(|r| Self::parse_record(&r)).transpose()
    }

    async fn get_games_by_id(&self, game_ids: &[GameId]) -> Result<Vec<Option<Game>>> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = game_ids.iter().map(game_key).collect();
        let mut conn = self.conn.clone();
        let raws: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| Self::cache_err("get_games_by_id", e))?;

        raws.into_iter()
            .map(|raw| raw.map(|r| Self::parse_record(&r)).transpose())
            .collect()
    }

    async fn get_game_id_by_player_id(&self, player_id: &str) -> Result<Option<GameId>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(player_key(player_id))
            .await
            .map_err(|e| Self::cache_err("get_game_id_by_player_id", e))?;

        raw.map(|r| {
            r.parse().map_err(|e| {
                OrchestrationError::CacheFailed {
                    message: format!("corrupt player index entry: {}", e),
                }
                .into()
            })
        })
        .transpose()
    }

    async fn get_games_by_owning_instance(&self, instance_id: &str) -> Result<Vec<Game>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(instance_games_key(instance_id), 0, -1)
            .await
            .map_err(|e| Self::cache_err("get_games_by_owning_instance", e))?;

        let game_ids: Vec<GameId> = ids.iter().filter_map(|id| id.parse().ok()).collect();

        let games = self.get_games_by_id(&game_ids).await?;
        Ok(games.into_iter().flatten().collect())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| Self::cache_err("ping", e))?;
        Ok(())
    }
}
