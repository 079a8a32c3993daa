//! List view pipeline: fetch → index → assemble → filter.
//!
//! One `ListView` per screen. Each `refresh` is a fetch cycle with its own
//! generation number; the primary and every joined collection are fetched
//! concurrently and the indexes are all rebuilt before assembly. A cycle
//! only commits if no newer cycle has started since, so an overlapping
//! slow response can never overwrite a fresher one. `close` cancels
//! in-flight cycles and blocks new ones.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{join, join_all};
use serde_json::Value;
use tokio::sync::watch;

use crate::assemble::{assemble, ViewModelRow};
use crate::client::Transport;
use crate::descriptor::ViewDescriptor;
use crate::error::ClientError;
use crate::filter::{self, FilterCriteria};
use crate::index::LookupIndex;
use crate::pagination::PaginationState;
use crate::resource::{Requirement, ResourceFetcher, ServerPagination};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("Failed to load {resource}: {source}")]
    Fetch {
        resource: String,
        #[source]
        source: ClientError,
    },
    #[error("View closed")]
    Cancelled,
}

impl ViewError {
    fn fetch(resource: impl std::fmt::Display, source: ClientError) -> Self {
        Self::Fetch {
            resource: resource.to_string(),
            source,
        }
    }

    /// Message suitable for the view's error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch { resource, source } => {
                format!("Could not load {resource}: {}", source.user_message())
            }
            Self::Cancelled => self.to_string(),
        }
    }
}

/// What happened to a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Results replaced the displayed rows.
    Applied { rows: usize },
    /// A newer cycle started first; results were discarded.
    Superseded,
}

/// Result of one fetch cycle, before commit.
struct Cycle {
    rows: Vec<ViewModelRow>,
    pagination: Option<ServerPagination>,
}

#[derive(Default)]
struct ViewState {
    rows: Vec<ViewModelRow>,
    criteria: FilterCriteria,
    server_params: BTreeMap<String, String>,
    pagination: Option<PaginationState>,
    last_error: Option<String>,
    in_flight: u32,
    loaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Server-side paging inputs at one point in time.
struct Paging {
    pagination: Option<PaginationState>,
    server_params: BTreeMap<String, String>,
}

impl ViewState {
    fn paging(&self) -> Paging {
        Paging {
            pagination: self.pagination,
            server_params: self.server_params.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ListView
// ═══════════════════════════════════════════════════════════

pub struct ListView<T: Transport> {
    transport: Arc<T>,
    descriptor: ViewDescriptor,
    state: Mutex<ViewState>,
    generation: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> ListView<T> {
    pub fn new(transport: Arc<T>, descriptor: ViewDescriptor) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            transport,
            descriptor,
            state: Mutex::new(ViewState::default()),
            generation: AtomicU64::new(0),
            shutdown,
        }
    }

    /// Server-paginated view sending `page` and `limit` with the primary fetch.
    pub fn paginated(self, limit: u32) -> Self {
        self.lock().pagination = Some(PaginationState::new(limit));
        self
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ── Fetch cycle ─────────────────────────────────────────

    /// Run a full fetch cycle and commit it if it is still the newest.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ViewError> {
        if self.is_closed() {
            return Err(ViewError::Cancelled);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = {
            let mut state = self.lock();
            state.in_flight += 1;
            self.primary_query(&state)
        };
        tracing::debug!(view = %self.descriptor.name, generation, "Fetch cycle started");

        let mut closed = self.shutdown.subscribe();
        let outcome = tokio::select! {
            result = load_cycle(self.transport.as_ref(), &self.descriptor, &query) => result,
            _ = wait_closed(&mut closed) => Err(ViewError::Cancelled),
        };

        self.commit(generation, outcome)
    }

    fn primary_query(&self, state: &ViewState) -> Vec<(String, String)> {
        let mut query = self.descriptor.primary_query.clone();
        query.extend(state.server_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(pagination) = &state.pagination {
            query.extend(pagination.query());
        }
        query
    }

    fn commit(
        &self,
        generation: u64,
        outcome: Result<Cycle, ViewError>,
    ) -> Result<RefreshOutcome, ViewError> {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        if self.is_closed() {
            return Err(ViewError::Cancelled);
        }
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(
                view = %self.descriptor.name,
                generation,
                "Discarding superseded fetch cycle"
            );
            return Ok(RefreshOutcome::Superseded);
        }

        match outcome {
            Ok(cycle) => {
                let count = cycle.rows.len();
                state.rows = cycle.rows;
                state.last_error = None;
                state.loaded_at = Some(chrono::Utc::now());
                if let Some(pagination) = state.pagination.as_mut() {
                    match cycle.pagination {
                        Some(server) => pagination.apply_server(&server),
                        None => pagination.apply_unpaged(count),
                    }
                }
                tracing::info!(view = %self.descriptor.name, rows = count, "View refreshed");
                Ok(RefreshOutcome::Applied { rows: count })
            }
            Err(e) => {
                if e != ViewError::Cancelled {
                    tracing::error!(view = %self.descriptor.name, error = %e, "View refresh failed");
                    state.last_error = Some(e.user_message());
                }
                Err(e)
            }
        }
    }

    /// Cancel in-flight cycles and refuse new ones.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    // ── Read side ───────────────────────────────────────────

    /// Every assembled row from the last committed cycle.
    pub fn rows(&self) -> Vec<ViewModelRow> {
        self.lock().rows.clone()
    }

    /// Rows passing the current criteria, in order.
    pub fn visible(&self) -> Vec<ViewModelRow> {
        let state = self.lock();
        filter::apply(&state.rows, &state.criteria, &self.descriptor)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        let state = self.lock();
        filter::apply(&state.rows, &state.criteria, &self.descriptor).len()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn dismiss_error(&self) {
        self.lock().last_error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn loaded_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.lock().loaded_at
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // ── Client-side search (no refetch) ─────────────────────

    pub fn criteria(&self) -> FilterCriteria {
        self.lock().criteria.clone()
    }

    pub fn set_query(&self, query: &str) {
        self.lock().criteria.set_query(query);
    }

    pub fn set_constraint(&self, field: &str, value: &str) {
        self.lock().criteria.set(field, value);
    }

    pub fn set_criteria(&self, criteria: FilterCriteria) {
        self.lock().criteria = criteria;
    }

    pub fn clear_search(&self) {
        self.lock().criteria.clear();
    }

    // ── Server-side paging and filters (refetch) ────────────

    pub fn pagination(&self) -> Option<PaginationState> {
        self.lock().pagination
    }

    /// Jump to `page` (clamped). Fetches only when the page changed.
    ///
    /// A failed fetch puts the previous page back, so the same page can be
    /// requested again.
    pub async fn set_page(&self, page: u32) -> Result<Option<RefreshOutcome>, ViewError> {
        let (before, target) = {
            let mut state = self.lock();
            let before = state.paging();
            let target = state.pagination.as_mut().and_then(|p| p.set_page(page));
            (before, target)
        };
        match target {
            Some(_) => self.refetch_paging(before).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn next_page(&self) -> Result<Option<RefreshOutcome>, ViewError> {
        let current = self.pagination().map(|p| p.page).unwrap_or(1);
        self.set_page(current.saturating_add(1)).await
    }

    pub async fn prev_page(&self) -> Result<Option<RefreshOutcome>, ViewError> {
        let current = self.pagination().map(|p| p.page).unwrap_or(1);
        self.set_page(current.saturating_sub(1)).await
    }

    /// New page size: back to page 1 and refetch.
    pub async fn set_limit(&self, limit: u32) -> Result<RefreshOutcome, ViewError> {
        let before = {
            let mut state = self.lock();
            let before = state.paging();
            if let Some(p) = state.pagination.as_mut() {
                p.set_limit(limit);
            }
            before
        };
        self.refetch_paging(before).await
    }

    /// Set a server-side filter parameter (wildcard values remove it),
    /// reset to page 1 and refetch.
    pub async fn set_server_param(&self, key: &str, value: &str) -> Result<RefreshOutcome, ViewError> {
        let before = {
            let mut state = self.lock();
            let before = state.paging();
            let v = value.trim();
            if v.is_empty() || v.eq_ignore_ascii_case("ALL") {
                state.server_params.remove(key);
            } else {
                state.server_params.insert(key.to_string(), v.to_string());
            }
            if let Some(p) = state.pagination.as_mut() {
                p.reset();
            }
            before
        };
        self.refetch_paging(before).await
    }

    /// Refetch after a paging change. If the cycle fails, the paging inputs
    /// go back to `before` so they keep describing the displayed rows.
    async fn refetch_paging(&self, before: Paging) -> Result<RefreshOutcome, ViewError> {
        let result = self.refresh().await;
        if let Err(ViewError::Fetch { .. }) = &result {
            let mut state = self.lock();
            state.pagination = before.pagination;
            state.server_params = before.server_params;
        }
        result
    }

    /// Visible rows as a JSON array, for printing or handing to a renderer.
    pub fn visible_json(&self) -> Value {
        serde_json::to_value(self.visible()).unwrap_or(Value::Array(Vec::new()))
    }
}

impl<T: Transport> Drop for ListView<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolves once `close()` was called (or the sender is gone).
async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Fetch primary and joins concurrently, rebuild every index, assemble.
async fn load_cycle<T: Transport>(
    transport: &T,
    descriptor: &ViewDescriptor,
    query: &[(String, String)],
) -> Result<Cycle, ViewError> {
    let fetcher = ResourceFetcher::new(transport);
    let fetcher = &fetcher;

    let primary = fetcher.fetch(&descriptor.primary, query, Requirement::Required);
    let secondaries = join_all(descriptor.joins.iter().map(|secondary| async move {
        let result = fetcher.fetch(&secondary.resource, &[], secondary.requirement).await;
        (secondary, result)
    }));
    let (primary, secondaries) = join(primary, secondaries).await;

    let primary = primary.map_err(|e| ViewError::fetch(&descriptor.primary, e))?;

    let mut indexes = BTreeMap::new();
    for (secondary, result) in secondaries {
        let envelope = result.map_err(|e| ViewError::fetch(&secondary.resource, e))?;
        indexes.insert(
            secondary.name.clone(),
            LookupIndex::build(envelope.records, &secondary.foreign_key),
        );
    }

    Ok(Cycle {
        rows: assemble(primary.records, &indexes, descriptor),
        pagination: primary.pagination,
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
