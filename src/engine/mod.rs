pub mod aggregate;
pub mod availability;
mod error;
pub mod excluded;
pub mod geometry;
pub mod ranges;

pub use error::EngineError;
pub use geometry::{excluded_day_linestring, multi_linestring, weekday_linestring};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use crate::ledger::OrderLedger;
use crate::limits::MAX_FIELD_KEY_LEN;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::store::CacheStore;

pub type SharedFieldState = Arc<RwLock<FieldState>>;

/// In-memory availability state for one product field: the cached result of
/// the last recompute plus the configuration it was computed with. Entries
/// loaded from disk at startup have no configuration until the next
/// recompute registers one.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    pub cache: CacheEntry,
    pub config: Option<BookingConfig>,
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// The availability engine: computes and caches fully-booked dates per
/// product field, backed by an external order ledger and a persisted
/// snapshot store.
pub struct Engine {
    state: DashMap<(u64, String), SharedFieldState>,
    ledger: Arc<dyn OrderLedger>,
    store: CacheStore,
}

impl Engine {
    /// Open the snapshot store under `data_dir` and load every persisted
    /// entry so reads are warm immediately.
    pub fn new(ledger: Arc<dyn OrderLedger>, data_dir: &Path) -> std::io::Result<Self> {
        let store = CacheStore::open(data_dir)?;
        let engine = Self {
            state: DashMap::new(),
            ledger,
            store,
        };
        for (product_id, field_key, cache) in engine.store.load_all() {
            engine.state.insert(
                (product_id, field_key),
                Arc::new(RwLock::new(FieldState {
                    cache,
                    config: None,
                })),
            );
        }
        Ok(engine)
    }

    /// Recompute availability for one product field from current ledger
    /// state and swap both cached values in one logical write.
    ///
    /// All-or-nothing: a ledger or store failure leaves the previous entry
    /// untouched, in memory and on disk.
    pub async fn recompute(
        &self,
        product_id: u64,
        field_key: &str,
        config: &BookingConfig,
    ) -> Result<(), EngineError> {
        self.recompute_at(product_id, field_key, config, today()).await
    }

    /// `recompute` with an explicit `min_date` ("today") for deterministic
    /// callers.
    pub async fn recompute_at(
        &self,
        product_id: u64,
        field_key: &str,
        config: &BookingConfig,
        min_date: NaiveDate,
    ) -> Result<(), EngineError> {
        if field_key.len() > MAX_FIELD_KEY_LEN {
            return Err(EngineError::LimitExceeded("field key too long"));
        }
        let started = Instant::now();
        let mode = config.aggregate_mode();

        let rows = match self
            .ledger
            .aggregate(product_id, field_key, mode, min_date)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                metrics::counter!(observability::LEDGER_FAILURES_TOTAL).increment(1);
                metrics::counter!(observability::RECOMPUTES_TOTAL, "status" => "error").increment(1);
                tracing::error!(product_id, %field_key, "ledger aggregate failed: {e}");
                return Err(EngineError::Ledger(e.to_string()));
            }
        };

        let occupancy = aggregate::build_occupancy(mode, rows);
        let computed = availability::fully_booked(config, &occupancy, min_date);
        let entry = CacheEntry {
            fully_booked: ranges::format_ranges(&computed.ranges),
            slot_counts: computed.slot_counts,
        };

        // Persist first; only a durable snapshot may replace the in-memory
        // entry.
        self.store.persist(product_id, field_key, &entry)?;

        let slot = self
            .state
            .entry((product_id, field_key.to_string()))
            .or_default()
            .clone();
        {
            let mut guard = slot.write().await;
            *guard = FieldState {
                cache: entry.clone(),
                config: Some(config.clone()),
            };
        }

        metrics::histogram!(observability::RECOMPUTE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::RECOMPUTES_TOTAL, "status" => "ok").increment(1);
        tracing::info!(
            product_id,
            %field_key,
            ranges = entry.fully_booked.len(),
            slots = entry.slot_counts.len(),
            "availability recomputed"
        );
        Ok(())
    }

    /// Pure cache lookup — no computation, no ledger access.
    pub async fn read(&self, product_id: u64, field_key: &str) -> Option<CacheEntry> {
        metrics::counter!(observability::CACHE_READS_TOTAL).increment(1);
        let slot = self
            .state
            .get(&(product_id, field_key.to_string()))?
            .value()
            .clone();
        let guard = slot.read().await;
        Some(guard.cache.clone())
    }

    /// Cached fully-booked `"date"` / `"start..end"` strings for the
    /// calendar UI. Empty when nothing was computed yet.
    pub async fn get_fully_booked_dates(&self, product_id: u64, field_key: &str) -> Vec<String> {
        self.read(product_id, field_key)
            .await
            .map(|e| e.fully_booked)
            .unwrap_or_default()
    }

    /// Cached `"date slot-key"` → count map (timeslots mode only).
    pub async fn get_booked_slot_counts(
        &self,
        product_id: u64,
        field_key: &str,
    ) -> BTreeMap<String, u32> {
        self.read(product_id, field_key)
            .await
            .map(|e| e.slot_counts)
            .unwrap_or_default()
    }

    /// Flat sorted exclusion list for calendar rendering: cache-derived
    /// fully-booked dates unioned with the manually excluded days.
    pub async fn get_excluded_days(
        &self,
        product_id: u64,
        field_key: &str,
        config: &BookingConfig,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        let entry = self.read(product_id, field_key).await.unwrap_or_default();
        excluded::resolve(config, &entry)
    }

    /// Cached fully-booked ranges as a multi-line-string for spatial/filter
    /// indexing. `None` when nothing is booked out.
    pub async fn encode_excluded_day_ranges(
        &self,
        product_id: u64,
        field_key: &str,
    ) -> Option<String> {
        let entry = self.read(product_id, field_key).await?;
        geometry::excluded_day_linestring(&entry)
    }

    /// Recompute driven by a ledger mutation. Uses the configuration
    /// registered by the last explicit recompute; fields never recomputed in
    /// this process are skipped.
    pub async fn recompute_for_event(&self, event: &LedgerEvent) {
        let product_id = event.product_id();
        let field_key = event.field_key().to_string();
        let slot = match self.state.get(&(product_id, field_key.clone())) {
            Some(entry) => entry.value().clone(),
            None => {
                tracing::debug!(product_id, %field_key, "event for unregistered field, skipped");
                return;
            }
        };
        let config = slot.read().await.config.clone();
        let Some(config) = config else {
            tracing::debug!(product_id, %field_key, "no registered config, skipped");
            return;
        };
        if let Err(e) = self.recompute(product_id, &field_key, &config).await {
            tracing::error!(product_id, %field_key, "event-driven recompute failed: {e}");
        }
    }
}

/// Background task that consumes ledger events for one product and
/// recomputes the affected fields.
pub async fn run_recompute_listener(engine: Arc<Engine>, mut rx: broadcast::Receiver<LedgerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                metrics::counter!(observability::LISTENER_EVENTS_TOTAL).increment(1);
                engine.recompute_for_event(&event).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "recompute listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Subscribe to a product's ledger events and spawn the recompute listener.
pub fn spawn_recompute_listener(
    engine: Arc<Engine>,
    hub: &NotifyHub,
    product_id: u64,
) -> JoinHandle<()> {
    let rx = hub.subscribe(product_id);
    tokio::spawn(run_recompute_listener(engine, rx))
}
