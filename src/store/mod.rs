//! Remote table store
//!
//! The board only needs four operations per collection: select everything,
//! insert one row, patch one row by id and delete one row by id. Rows travel
//! as untyped JSON objects with snake_case keys; `crate::mapper` owns the
//! translation to typed entities.

mod memory;
mod rest;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ServiceResult;

pub use memory::{MemoryStore, StoreOp};
pub use rest::{DEFAULT_TIMEOUT_SECS, RestConfig, RestStore};

/// One raw record as returned by the store.
pub type Row = Map<String, Value>;

/// Sort order for a select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// CRUD against named collections.
///
/// Implementations decide transport and timeouts. A returned error means the
/// operation did not take effect as far as the caller can tell.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every row of a collection.
    async fn select_all(&self, collection: &str, order: Option<OrderBy>) -> ServiceResult<Vec<Row>>;

    /// Insert one row and return it as stored (with generated id and timestamps).
    async fn insert_one(&self, collection: &str, row: Row) -> ServiceResult<Row>;

    /// Apply `patch` to the row with the given id.
    async fn update_by_id(&self, collection: &str, id: &str, patch: Row) -> ServiceResult<()>;

    /// Remove the row with the given id.
    async fn delete_by_id(&self, collection: &str, id: &str) -> ServiceResult<()>;
}
