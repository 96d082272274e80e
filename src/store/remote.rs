//! Rate store backed by an HTTP key/value cache server.
//!
//! The server speaks a small REST protocol:
//! - `PUT /set` with `{"key", "value", "ttl"}` stores a value for `ttl` seconds
//! - `GET /get/{key}` returns `{"key", "value"}`, or 404 once missing or expired
//! - `DELETE /del/{key}` removes a key, 404 when it was not there
//!
//! Expiry happens on the server. Keys are prefixed so several tools can share
//! one server.

use crate::core::cache::CacheStore;
use crate::core::currency::{PairKey, RateEntry};
use crate::core::error::StoreError;
use crate::store::StoredRate;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "curconv";

#[derive(Debug, Serialize)]
struct SetRequest<'a> {
    key: &'a str,
    value: String,
    ttl: u64,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    value: String,
}

pub struct RemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent("curconv/0.1")
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn remote_key(key: &PairKey) -> String {
        format!("{KEY_PREFIX}:{key}")
    }
}

/// Whole seconds, rounded up so short TTLs do not become "no expiry".
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs.max(1)
    }
}

#[async_trait]
impl CacheStore for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &PairKey) -> Result<Option<RateEntry>, StoreError> {
        let remote_key = Self::remote_key(key);
        let url = format!("{}/get/{}", self.base_url, remote_key);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Cache MISS for key: {}", remote_key);
                Ok(None)
            }
            status if status.is_success() => {
                let body: GetResponse = response.json().await?;
                let record: StoredRate = serde_json::from_str(&body.value)?;
                debug!("Cache HIT for key: {}", remote_key);
                Ok(Some(record.into_entry()))
            }
            status => Err(StoreError::RemoteStatus {
                status: status.as_u16(),
                key: remote_key,
            }),
        }
    }

    async fn put(&self, key: &PairKey, entry: &RateEntry, ttl: Duration) -> Result<(), StoreError> {
        let remote_key = Self::remote_key(key);
        let record = StoredRate::new(key, entry, ttl);
        let body = SetRequest {
            key: &remote_key,
            value: serde_json::to_string(&record)?,
            ttl: ttl_secs(ttl),
        };

        let response = self
            .client
            .put(format!("{}/set", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::RemoteStatus {
                status: response.status().as_u16(),
                key: remote_key,
            });
        }
        debug!("Cache PUT for key: {}", remote_key);
        Ok(())
    }

    async fn delete(&self, key: &PairKey) -> Result<(), StoreError> {
        let remote_key = Self::remote_key(key);
        let url = format!("{}/del/{}", self.base_url, remote_key);
        let response = self.client.delete(&url).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!("Cache REMOVE for key: {}", remote_key);
            Ok(())
        } else {
            Err(StoreError::RemoteStatus {
                status: status.as_u16(),
                key: remote_key,
            })
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        // The server cannot list keys, so there is nothing to iterate
        Err(StoreError::Unsupported("clear", "remote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn usd_eur() -> RateEntry {
        RateEntry {
            base: "USD".parse().unwrap(),
            quote: "EUR".parse().unwrap(),
            rate: "0.92".parse().unwrap(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_ttl_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_put_sends_namespaced_key_and_ttl() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/set"))
            .and(body_partial_json(serde_json::json!({
                "key": "curconv:USD:EUR",
                "ttl": 300
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"message": "Key 'curconv:USD:EUR' set successfully", "key": "curconv:USD:EUR"}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = RemoteStore::new(&mock_server.uri()).unwrap();
        let entry = usd_eur();
        store
            .put(&entry.key(), &entry, Duration::from_secs(300))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_hit_decodes_record() {
        let mock_server = MockServer::start().await;
        let entry = usd_eur();
        let record = StoredRate::new(&entry.key(), &entry, Duration::from_secs(300));
        let body = serde_json::json!({
            "key": "curconv:USD:EUR",
            "value": serde_json::to_string(&record).unwrap(),
        });

        Mock::given(method("GET"))
            .and(path("/get/curconv:USD:EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let store = RemoteStore::new(&mock_server.uri()).unwrap();
        assert_eq!(store.get(&entry.key()).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_get_miss_on_404() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/curconv:USD:EUR"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error": "Key not found: curconv:USD:EUR"}"#),
            )
            .mount(&mock_server)
            .await;

        let store = RemoteStore::new(&mock_server.uri()).unwrap();
        assert!(store.get(&usd_eur().key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_store_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let store = RemoteStore::new(&mock_server.uri()).unwrap();
        let result = store.get(&usd_eur().key()).await;
        assert!(matches!(
            result,
            Err(StoreError::RemoteStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/del/curconv:USD:EUR"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = RemoteStore::new(&mock_server.uri()).unwrap();
        store.delete(&usd_eur().key()).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_is_unsupported() {
        let store = RemoteStore::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            store.clear().await,
            Err(StoreError::Unsupported("clear", "remote"))
        ));
    }
}
