// =============================================================================
// Log Store Adapter — append-only rows plus in-place-updated status tiles
// =============================================================================
//
// One `StoreLogClient` is owned per bot instance. The tile map is the
// engine's only record of which row currently represents a live
// `(symbol, tile-kind)` status — the store itself has no notion of tiles.
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::types::{LogType, TileKind};

use super::client::StoreClient;

pub struct StoreLogClient {
    store: StoreClient,
    bot_id: String,
    owner_id: String,
    tile_ids: RwLock<HashMap<(String, TileKind), String>>,
}

impl StoreLogClient {
    pub fn new(store: StoreClient, bot_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            store,
            bot_id: bot_id.into(),
            owner_id: owner_id.into(),
            tile_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Unconditional insert. Swallows store failures after a warn — logging
    /// must never fail the engine operationally (§7).
    #[instrument(skip(self, data), name = "store::log_append")]
    pub async fn append(&self, kind: LogType, message: &str, data: Value) {
        let row = json!({
            "bot_id": self.bot_id,
            "user_id": self.owner_id,
            "log_type": kind.to_string(),
            "message": message,
            "data": data,
        });
        if let Err(e) = self.store.insert("bot_logs", &row).await {
            warn!(bot_id = %self.bot_id, log_type = %kind, error = %e, "failed to append log row");
        }
    }

    /// Updates the row remembered for `(symbol, kind)` in place, refreshing
    /// its `created_at` so a UI sorted by `created_at desc` keeps the tile
    /// pinned. Inserts (and remembers) a new row when none is tracked yet, or
    /// when the tracked row no longer exists (deleted externally).
    #[instrument(skip(self, data), name = "store::update_tile")]
    pub async fn update_tile(&self, kind: TileKind, symbol: &str, message: &str, data: Value) {
        let key = (symbol.to_string(), kind);
        let existing_id = self.tile_ids.read().get(&key).cloned();

        if let Some(id) = existing_id {
            let body = json!({
                "message": message,
                "data": data,
                "created_at": chrono::Utc::now().to_rfc3339(),
            });
            match self.store.update("bot_logs", &format!("id=eq.{id}"), &body).await {
                Ok(rows) if !rows.is_empty() => return,
                Ok(_) => {
                    warn!(bot_id = %self.bot_id, symbol, ?kind, "tile row missing on update, falling back to insert");
                }
                Err(e) => {
                    warn!(bot_id = %self.bot_id, symbol, ?kind, error = %e, "tile update failed, falling back to insert");
                }
            }
        }

        self.insert_tile(kind, symbol, message, data).await;
    }

    async fn insert_tile(&self, kind: TileKind, symbol: &str, message: &str, data: Value) {
        let row = json!({
            "bot_id": self.bot_id,
            "user_id": self.owner_id,
            "log_type": LogType::Info.to_string(),
            "message": message,
            "data": data,
        });
        match self.store.insert("bot_logs", &row).await {
            Ok(inserted) => {
                if let Some(id) = inserted.get("id").and_then(|v| v.as_str()) {
                    self.tile_ids.write().insert((symbol.to_string(), kind), id.to_string());
                }
            }
            Err(e) => warn!(bot_id = %self.bot_id, symbol, ?kind, error = %e, "failed to insert tile row"),
        }
    }

    /// Best-effort removal of the tile tracked for `(symbol, kind)`, e.g.
    /// when a monitoring tile is superseded by an opened position.
    #[instrument(skip(self), name = "store::delete_tile")]
    pub async fn delete_tile(&self, kind: TileKind, symbol: &str) {
        let key = (symbol.to_string(), kind);
        let id = self.tile_ids.write().remove(&key);
        if let Some(id) = id {
            if let Err(e) = self.store.delete("bot_logs", &format!("id=eq.{id}")).await {
                warn!(bot_id = %self.bot_id, symbol, ?kind, error = %e, "failed to delete tile row");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StoreLogClient {
        StoreLogClient::new(
            StoreClient::new("https://example.test", "service-role-key").unwrap(),
            "bot-1",
            "owner-1",
        )
    }

    #[test]
    fn tile_map_starts_empty() {
        let client = client();
        assert!(client.tile_ids.read().is_empty());
    }

    #[tokio::test]
    async fn delete_tile_on_untracked_key_is_a_no_op() {
        let client = client();
        client.delete_tile(TileKind::Monitoring, "BTC").await;
        assert!(client.tile_ids.read().is_empty());
    }
}
