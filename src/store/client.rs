// =============================================================================
// Store Client — PostgREST-shaped REST access to the row-store database
// =============================================================================
//
// The store is an external collaborator (contracts only): a PostgREST-style
// HTTP API in front of the database, authenticated with a service-role key
// sent as both `apikey` and a bearer `Authorization` header. All four
// store-facing modules (`positions`, `logs`, `scanner_levels`, `bots`) build
// on this client rather than opening their own connections.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct StoreClient {
    base_url: String,
    client: reqwest::Client,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let service_key = service_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&service_key).context("invalid store service key")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {service_key}"))
                .context("invalid store service key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build store HTTP client")?;

        Ok(Self { base_url, client })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Insert one row into `table`, returning the inserted row.
    #[instrument(skip(self, body), name = "store::insert")]
    pub async fn insert<T: Serialize + ?Sized>(&self, table: &str, body: &T) -> Result<Value> {
        let resp = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .context("store insert request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("store insert into {table} returned HTTP {}", resp.status());
        }
        let mut rows: Vec<Value> = resp
            .json()
            .await
            .context("failed to decode store insert response")?;
        rows.pop().context("store insert returned no row")
    }

    /// Update rows matching `filter` (a PostgREST query string, e.g.
    /// `id=eq.123`), returning the updated rows.
    #[instrument(skip(self, body), name = "store::update")]
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        filter: &str,
        body: &T,
    ) -> Result<Vec<Value>> {
        let url = format!("{}?{}", self.table_url(table), filter);
        let resp = self
            .client
            .patch(url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .context("store update request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("store update on {table} returned HTTP {}", resp.status());
        }
        resp.json().await.context("failed to decode store update response")
    }

    /// Select rows matching `filter`.
    #[instrument(skip(self), name = "store::select")]
    pub async fn select(&self, table: &str, filter: &str) -> Result<Vec<Value>> {
        let url = format!("{}?{}", self.table_url(table), filter);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("store select request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("store select on {table} returned HTTP {}", resp.status());
        }
        resp.json().await.context("failed to decode store select response")
    }

    /// Delete rows matching `filter`. Best-effort callers swallow errors
    /// themselves (see the log-tile adapter).
    #[instrument(skip(self), name = "store::delete")]
    pub async fn delete(&self, table: &str, filter: &str) -> Result<()> {
        let url = format!("{}?{}", self.table_url(table), filter);
        let resp = self
            .client
            .delete(url)
            .send()
            .await
            .context("store delete request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("store delete on {table} returned HTTP {}", resp.status());
        }
        Ok(())
    }

    /// Upsert one row into `table` on the given conflict key.
    #[instrument(skip(self, body), name = "store::upsert")]
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &T,
    ) -> Result<()> {
        let url = format!("{}?on_conflict={}", self.table_url(table), on_conflict);
        let resp = self
            .client
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await
            .context("store upsert request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("store upsert into {table} returned HTTP {}", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_does_not_panic() {
        let _client = StoreClient::new("https://example.test", "service-role-key").unwrap();
    }

    #[test]
    fn rejects_header_hostile_service_key() {
        let invalid_key = "bad\nkey";
        assert!(StoreClient::new("https://example.test", invalid_key).is_err());
    }
}
