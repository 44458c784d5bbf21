//! Per-collection query cache.
//!
//! Each entity kind gets one [`QueryCell`], a small state machine:
//!
//! ```text
//!   Unloaded --fetch-start--> Loading --ok--> Ready --invalidate--> Stale
//!                                |                                   |
//!                                +--err--> Error --invalidate--> Stale
//!   Stale --fetch-start--> Loading
//! ```
//!
//! Reads of `Ready` or `Error` cells are served from memory; any other state
//! goes through a per-cell gate, so only one fetch runs at a time and readers
//! that arrive while it is in flight wait for its result. An invalidation
//! that lands mid-fetch leaves the cell `Stale` once the fetch completes. A
//! read dropped mid-fetch puts the cell back to `Unloaded` or `Stale`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::types::EntityKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    Unloaded,
    Loading,
    Ready,
    Stale,
    Error,
}

/// What a reader sees: the collection plus its loading and error flags.
#[derive(Clone, Debug)]
pub struct QuerySnapshot<T> {
    pub data: Vec<T>,
    /// No fetch has completed yet.
    pub loading: bool,
    pub error: Option<Arc<ServiceError>>,
    pub status: QueryStatus,
}

impl<T> QuerySnapshot<T> {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

struct CellState<T> {
    status: QueryStatus,
    data: Vec<T>,
    error: Option<Arc<ServiceError>>,
    settled: bool,
    generation: u64,
}

pub struct QueryCell<T> {
    kind: EntityKind,
    state: Mutex<CellState<T>>,
    gate: tokio::sync::Mutex<()>,
}

impl<T: Clone> QueryCell<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            state: Mutex::new(CellState {
                status: QueryStatus::Unloaded,
                data: Vec::new(),
                error: None,
                settled: false,
                generation: 0,
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, CellState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> QueryStatus {
        self.lock().status
    }

    /// Current contents without triggering a fetch.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        let state = self.lock();
        QuerySnapshot {
            data: state.data.clone(),
            loading: !state.settled,
            error: state.error.clone(),
            status: state.status,
        }
    }

    /// Ready and Error are served as-is; every other state goes through the gate.
    fn is_settled(&self) -> bool {
        matches!(self.status(), QueryStatus::Ready | QueryStatus::Error)
    }

    /// Mark the cached collection out of date; the next read re-fetches.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation += 1;
        match state.status {
            QueryStatus::Ready | QueryStatus::Error => state.status = QueryStatus::Stale,
            // Loading resolves against the bumped generation; Unloaded/Stale already fetch.
            QueryStatus::Loading | QueryStatus::Unloaded | QueryStatus::Stale => {}
        }
        debug!(kind = %self.kind, status = ?state.status, "invalidated");
    }

    /// Serve the collection, fetching first unless the cell is Ready or Error.
    ///
    /// Readers arriving during a fetch wait on the gate and get its result.
    pub async fn read<F, Fut>(&self, fetch: F) -> QuerySnapshot<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<Vec<T>>>,
    {
        if self.is_settled() {
            return self.snapshot();
        }
        let _gate = self.gate.lock().await;
        // Another reader may have fetched while we waited.
        if self.is_settled() {
            return self.snapshot();
        }

        let pending = PendingFetch {
            cell: self,
            generation: self.begin_fetch(),
            finished: false,
        };
        let result = fetch().await;
        pending.finish(result);
        self.snapshot()
    }

    fn begin_fetch(&self) -> u64 {
        let mut state = self.lock();
        state.status = QueryStatus::Loading;
        debug!(kind = %self.kind, "fetch started");
        state.generation
    }

    fn finish_fetch(&self, started_at: u64, result: ServiceResult<Vec<T>>) {
        let mut state = self.lock();
        let current = state.generation == started_at;
        state.settled = true;
        match result {
            Ok(data) => {
                debug!(kind = %self.kind, rows = data.len(), current, "fetch succeeded");
                state.data = data;
                state.error = None;
                state.status = if current {
                    QueryStatus::Ready
                } else {
                    QueryStatus::Stale
                };
            }
            Err(err) => {
                warn!(kind = %self.kind, error = %err, "fetch failed");
                state.error = Some(Arc::new(err));
                state.status = if current {
                    QueryStatus::Error
                } else {
                    QueryStatus::Stale
                };
            }
        }
    }
}

/// Owns a cell's `Loading` state for one fetch. Dropped without a result
/// (the reading future was cancelled), it puts the cell back to `Stale`, or
/// `Unloaded` if nothing was ever fetched, so the next read starts over.
struct PendingFetch<'a, T: Clone> {
    cell: &'a QueryCell<T>,
    generation: u64,
    finished: bool,
}

impl<T: Clone> PendingFetch<'_, T> {
    fn finish(mut self, result: ServiceResult<Vec<T>>) {
        self.finished = true;
        self.cell.finish_fetch(self.generation, result);
    }
}

impl<T: Clone> Drop for PendingFetch<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.cell.lock();
        if state.status == QueryStatus::Loading {
            state.status = if state.settled {
                QueryStatus::Stale
            } else {
                QueryStatus::Unloaded
            };
            debug!(kind = %self.cell.kind, status = ?state.status, "fetch abandoned");
        }
    }
}
