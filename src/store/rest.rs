//! PostgREST client
//!
//! Talks to a PostgREST endpoint (as exposed by Supabase under `/rest/v1`):
//! - `GET` with `select=*` and an optional `order=` for select-all
//! - `POST` with `Prefer: return=representation` for insert
//! - `PATCH` / `DELETE` filtered with `id=eq.<id>`
//!
//! ureq is blocking, so every call runs on the blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{OrderBy, RemoteStore, Row};
use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    /// Accepts `https://x.supabase.co`, `http://localhost:3000` or a bare
    /// `localhost:3000` (treated as http).
    pub fn new(connection_string: &str, api_key: Option<String>) -> Self {
        let trimmed = connection_string.trim().trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            base_url: config.base_url,
            api_key: config.api_key,
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    fn request(&self, method: &str, collection: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, &self.table_url(collection))
            .set("Accept", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request
                .set("apikey", api_key)
                .set("Authorization", &format!("Bearer {}", api_key));
        }
        request
    }
}

/// Run a blocking ureq call off the async runtime.
async fn blocking<T, F>(call: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ServiceError::Other(format!("spawn_blocking failed: {}", e)))?
}

fn map_ureq_error(context: &str, err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            ServiceError::Api {
                status,
                message: extract_message(&body).unwrap_or_else(|| format!("{} failed", context)),
            }
        }
        ureq::Error::Transport(transport) => {
            ServiceError::Network(format!("{}: {}", context, transport))
        }
    }
}

/// PostgREST errors look like `{"code": "...", "message": "...", ...}`.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
}

fn rows_from_value(value: Value) -> ServiceResult<Vec<Row>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ServiceError::Other(format!(
                    "expected a row object, store returned {}",
                    other
                ))),
            })
            .collect(),
        other => Err(ServiceError::Other(format!(
            "expected an array of rows, store returned {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select_all(&self, collection: &str, order: Option<OrderBy>) -> ServiceResult<Vec<Row>> {
        let mut request = self.request("GET", collection).query("select", "*");
        if let Some(order) = order {
            let direction = if order.descending { "desc" } else { "asc" };
            request = request.query("order", &format!("{}.{}", order.column, direction));
        }
        debug!(collection, "select_all");
        let context = format!("select from {}", collection);

        blocking(move || {
            let response = request.call().map_err(|e| map_ureq_error(&context, e))?;
            let value: Value = response.into_json()?;
            rows_from_value(value)
        })
        .await
    }

    async fn insert_one(&self, collection: &str, row: Row) -> ServiceResult<Row> {
        let request = self
            .request("POST", collection)
            .set("Prefer", "return=representation");
        debug!(collection, "insert_one");
        let context = format!("insert into {}", collection);

        blocking(move || {
            let body = Value::Array(vec![Value::Object(row)]);
            let response = request
                .send_json(body)
                .map_err(|e| map_ureq_error(&context, e))?;
            let value: Value = response.into_json()?;
            rows_from_value(value)?
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::Other(format!("{} returned no row", context)))
        })
        .await
    }

    async fn update_by_id(&self, collection: &str, id: &str, patch: Row) -> ServiceResult<()> {
        let request = self
            .request("PATCH", collection)
            .query("id", &format!("eq.{}", id));
        debug!(collection, id, "update_by_id");
        let context = format!("update {} {}", collection, id);

        blocking(move || {
            request
                .send_json(Value::Object(patch))
                .map_err(|e| map_ureq_error(&context, e))?;
            Ok(())
        })
        .await
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> ServiceResult<()> {
        let request = self
            .request("DELETE", collection)
            .query("id", &format!("eq.{}", id));
        debug!(collection, id, "delete_by_id");
        let context = format!("delete {} {}", collection, id);

        blocking(move || {
            request.call().map_err(|e| map_ureq_error(&context, e))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_parsing() {
        let config = RestConfig::new("localhost:54321", None);
        assert_eq!(config.base_url, "http://localhost:54321");

        let config = RestConfig::new("https://abc.supabase.co/", Some("key".to_string()));
        assert_eq!(config.base_url, "https://abc.supabase.co");
        assert_eq!(config.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_blank_api_key_is_dropped() {
        let config = RestConfig::new("http://localhost:3000", Some("  ".to_string()));
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_table_url() {
        let store = RestStore::new(RestConfig::new("http://localhost:3000", None));
        assert_eq!(store.table_url("tasks"), "http://localhost:3000/rest/v1/tasks");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"code":"23502","message":"null value in column \"name\""}"#;
        assert_eq!(
            extract_message(body).as_deref(),
            Some("null value in column \"name\"")
        );
        assert_eq!(extract_message("not json"), None);
    }

    #[test]
    fn test_rows_from_value_rejects_non_objects() {
        let rows = rows_from_value(serde_json::json!([{"id": "1"}])).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows_from_value(serde_json::json!([1, 2])).is_err());
        assert!(rows_from_value(serde_json::json!({"id": "1"})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_a_network_error() {
        let config = RestConfig::new("http://127.0.0.1:9", None).with_timeout(Duration::from_secs(2));
        let store = RestStore::new(config);
        let err = store.select_all("projects", None).await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }
}
