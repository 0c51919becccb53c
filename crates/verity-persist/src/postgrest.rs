//! PostgREST record store
//!
//! Talks to hosted `claims` and `proofs` tables (Supabase or any PostgREST
//! server) at `{base}/rest/v1/{table}` with the `apikey` and bearer headers.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;
use verity_core::AnchorId;
use zeroize::Zeroizing;

use crate::backend::{RecordStore, StoreError};
use crate::models::{Claim, ClaimStatus, NewClaim, NewProof, Proof};

const CLAIMS: &str = "claims";
const PROOFS: &str = "proofs";

/// PostgREST record store
pub struct PostgrestStore {
    rest_url: String,
    api_key: Zeroizing<String>,
    client: Client,
}

impl fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_url", &self.rest_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl PostgrestStore {
    /// `base_url` is the project URL, e.g. `https://xyz.supabase.co`
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("verity-persist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Connection(format!("HTTP client: {}", e)))?;

        let base = base_url.trim_end_matches('/');
        let rest_url = if base.ends_with("/rest/v1") {
            base.to_string()
        } else {
            format!("{}/rest/v1", base)
        };

        tracing::info!(url = %rest_url, "PostgREST store configured");

        Ok(Self {
            rest_url,
            api_key: Zeroizing::new(api_key.into()),
            client,
        })
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
    }

    /// Send and decode the JSON row array; every failure goes through `fail`
    async fn rows<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        fail: fn(String) -> StoreError,
    ) -> Result<Vec<T>, StoreError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status, body)));
        }

        resp.json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, StoreError> {
        let req = self.client.get(self.table(table)).query(query);
        let mut rows = self.rows::<T>(req, StoreError::Read).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn insert<T: serde::Serialize + DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<T, StoreError> {
        let req = self
            .client
            .post(self.table(table))
            .header("Prefer", "return=representation")
            .json(row);
        self.rows::<T>(req, StoreError::Write)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Write(format!("insert into {} returned no rows", table)))
    }

    async fn patch(
        &self,
        table: &str,
        id: Uuid,
        body: serde_json::Value,
    ) -> Result<(), StoreError> {
        let req = self
            .client
            .patch(self.table(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body);
        let rows = self.rows::<serde_json::Value>(req, StoreError::Write).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn is_healthy(&self) -> bool {
        let req = self
            .client
            .get(self.table(CLAIMS))
            .query(&[("select", "id"), ("limit", "1")]);
        self.rows::<serde_json::Value>(req, StoreError::Read)
            .await
            .is_ok()
    }

    async fn insert_claim(&self, claim: NewClaim) -> Result<Uuid, StoreError> {
        let claim = Claim::from_new(claim, Utc::now());
        let stored = self.insert(CLAIMS, &claim).await?;
        Ok(stored.id)
    }

    async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError> {
        self.select_one(CLAIMS, &[("id", format!("eq.{}", id))])
            .await
    }

    async fn update_claim_status(&self, id: Uuid, status: ClaimStatus) -> Result<(), StoreError> {
        self.patch(
            CLAIMS,
            id,
            json!({ "status": status, "updated_at": Utc::now() }),
        )
        .await
    }

    async fn insert_proof(&self, proof: NewProof) -> Result<Uuid, StoreError> {
        let proof = Proof::from_new(proof, Utc::now());
        let stored = self.insert(PROOFS, &proof).await?;
        Ok(stored.id)
    }

    async fn get_proof(&self, id: Uuid) -> Result<Option<Proof>, StoreError> {
        self.select_one(PROOFS, &[("id", format!("eq.{}", id))])
            .await
    }

    async fn find_proof_by_anchor_id(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<Proof>, StoreError> {
        self.select_one(
            PROOFS,
            &[
                ("anchor_id", format!("eq.{}", anchor_id)),
                ("order", "created_at.asc".to_string()),
                ("limit", "1".to_string()),
            ],
        )
        .await
    }

    async fn update_proof_verified(&self, id: Uuid, verified: bool) -> Result<(), StoreError> {
        self.patch(PROOFS, id, json!({ "verified": verified })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> PostgrestStore {
        PostgrestStore::new(url, "anon-key", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_rest_url_normalization() {
        assert_eq!(
            store("https://xyz.supabase.co/").rest_url(),
            "https://xyz.supabase.co/rest/v1"
        );
        assert_eq!(
            store("http://localhost:3000/rest/v1").rest_url(),
            "http://localhost:3000/rest/v1"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", store("https://xyz.supabase.co"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("anon-key"));
    }

    #[tokio::test]
    async fn test_unreachable_server_maps_errors_by_direction() {
        let store = store("http://127.0.0.1:9");
        assert!(!store.is_healthy().await);

        assert!(matches!(
            store.get_claim(Uuid::new_v4()).await,
            Err(StoreError::Read(_))
        ));
        assert!(matches!(
            store
                .update_proof_verified(Uuid::new_v4(), true)
                .await,
            Err(StoreError::Write(_))
        ));
    }
}
