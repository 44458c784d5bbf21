use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use ulid::Ulid;

use super::{OrderBy, RemoteStore, Row};
use crate::data::timestamp;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct MemoryData {
    tables: HashMap<String, Vec<Row>>,
    calls: HashMap<(StoreOp, String), usize>,
    failures: HashMap<StoreOp, VecDeque<String>>,
    next_ids: VecDeque<String>,
}

/// In-process table store with the same row semantics as the REST store.
///
/// Inserted rows get a ULID id (unless one was queued with
/// [`MemoryStore::push_next_id`]) and `created_at`/`updated_at` stamps.
/// Patching or deleting an unknown id is a silent no-op, as PostgREST does.
/// Failures can be injected per operation and every call is counted.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation, so concurrent callers actually overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Put rows into a collection as-is, bypassing counters and stamping.
    pub fn seed(&self, collection: &str, rows: Vec<Row>) {
        let mut data = self.lock();
        data.tables
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Use `id` for the next inserted row.
    pub fn push_next_id(&self, id: impl Into<String>) {
        self.lock().next_ids.push_back(id.into());
    }

    /// Make the next call of `op` fail with a transport error.
    pub fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    pub fn calls(&self, op: StoreOp, collection: &str) -> usize {
        self.lock()
            .calls
            .get(&(op, collection.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryData> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, op: StoreOp, collection: &str) -> ServiceResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut data = self.lock();
        *data.calls.entry((op, collection.to_string())).or_insert(0) += 1;
        if let Some(message) = data.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(ServiceError::Network(message));
        }
        Ok(())
    }
}

/// Row id as text; numeric ids compare by their decimal form.
fn row_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn sort_key(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select_all(&self, collection: &str, order: Option<OrderBy>) -> ServiceResult<Vec<Row>> {
        self.enter(StoreOp::Select, collection).await?;
        let mut rows = self.rows(collection);
        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = sort_key(a, order.column).cmp(&sort_key(b, order.column));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        Ok(rows)
    }

    async fn insert_one(&self, collection: &str, mut row: Row) -> ServiceResult<Row> {
        self.enter(StoreOp::Insert, collection).await?;
        let mut data = self.lock();
        let id = data
            .next_ids
            .pop_front()
            .unwrap_or_else(|| Ulid::new().to_string());
        let stamp = timestamp();
        row.insert("id".to_string(), Value::String(id));
        row.insert("created_at".to_string(), Value::String(stamp.clone()));
        row.insert("updated_at".to_string(), Value::String(stamp));
        data.tables
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update_by_id(&self, collection: &str, id: &str, patch: Row) -> ServiceResult<()> {
        self.enter(StoreOp::Update, collection).await?;
        let mut data = self.lock();
        if let Some(row) = data
            .tables
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r).as_deref() == Some(id)))
        {
            for (key, value) in patch {
                if key != "id" {
                    row.insert(key, value);
                }
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> ServiceResult<()> {
        self.enter(StoreOp::Delete, collection).await?;
        let mut data = self.lock();
        if let Some(rows) = data.tables.get_mut(collection) {
            rows.retain(|r| row_id(r).as_deref() != Some(id));
        }
        Ok(())
    }
}
