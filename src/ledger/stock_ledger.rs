use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::catalog::{Product, StockKey, StockRequest};
use crate::metrics::Metrics;
use crate::store::{CatalogStore, DecrementOutcome};
use crate::utils::{retry_on_transient, RetryConfig};
use super::errors::{LedgerError, StockShortfall};
use super::lock_table::LockTable;

// ============================================================================
// Stock Ledger
// ============================================================================
//
// Reserve-or-fail over a batch of stock requests:
//
//   merge duplicates -> lock every key (sorted, bounded) -> check all
//   -> conditional decrement each -> roll back applied ones on any failure
//
// Every stock mutation in the engine goes through here, so the per-key
// locks serialize all writers of a counter within this process. The
// store's conditional decrement still guards against writers outside it.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub lock_timeout: Duration,
    /// Applied to each compensating increment
    pub retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            retry: RetryConfig::default(),
        }
    }
}

/// Stock taken by one successful `decrement_atomic`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    lines: Vec<StockRequest>,
}

impl Reservation {
    pub fn lines(&self) -> &[StockRequest] {
        &self.lines
    }

    pub fn units(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

pub struct StockLedger {
    catalog: Arc<dyn CatalogStore>,
    locks: LockTable<StockKey>,
    config: LedgerConfig,
    metrics: Arc<Metrics>,
}

/// Sum quantities per key; the map iterates in lock order.
fn merge(items: &[StockRequest]) -> BTreeMap<StockKey, u32> {
    let mut merged = BTreeMap::new();
    for item in items {
        let quantity = merged.entry(item.key.clone()).or_insert(0u32);
        *quantity = quantity.saturating_add(item.quantity);
    }
    merged
}

impl StockLedger {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: LedgerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            catalog,
            locks: LockTable::new(),
            config,
            metrics,
        }
    }

    /// Read-only availability check. Advisory: nothing is locked, so the
    /// answer may be stale by the time the caller acts on it.
    pub async fn check_availability(&self, items: &[StockRequest]) -> Result<Vec<StockShortfall>, LedgerError> {
        let merged = merge(items);
        self.shortfalls(&merged).await
    }

    async fn shortfalls(&self, merged: &BTreeMap<StockKey, u32>) -> Result<Vec<StockShortfall>, LedgerError> {
        let mut products: HashMap<Uuid, Product> = HashMap::new();
        let mut shortfalls = Vec::new();

        for (key, &requested) in merged {
            if !products.contains_key(&key.product_id) {
                let product = self
                    .catalog
                    .get_product(key.product_id)
                    .await?
                    .ok_or(LedgerError::ProductNotFound(key.product_id))?;
                products.insert(key.product_id, product);
            }

            let available = products
                .get(&key.product_id)
                .and_then(|p| p.available(key.size.as_ref()))
                .unwrap_or(0);

            if available < requested {
                shortfalls.push(StockShortfall {
                    key: key.clone(),
                    requested,
                    available,
                });
            }
        }

        Ok(shortfalls)
    }

    /// Decrement every requested counter, or none of them.
    pub async fn decrement_atomic(&self, items: &[StockRequest]) -> Result<Reservation, LedgerError> {
        let merged = merge(items);

        let _held = match self
            .locks
            .acquire_all(merged.keys().cloned(), self.config.lock_timeout)
            .await
        {
            Ok(held) => held,
            Err(timed_out) => {
                tracing::warn!(
                    keys = timed_out.total,
                    pending = timed_out.pending,
                    "Stock lock acquisition timed out"
                );
                self.metrics.record_reservation("lock_timeout");
                return Err(LedgerError::LockTimeout(timed_out.waited));
            }
        };

        // Check phase: nothing is mutated unless every key is covered.
        let shortfalls = match self.shortfalls(&merged).await {
            Ok(shortfalls) => shortfalls,
            Err(e) => {
                self.metrics.record_reservation("error");
                return Err(e);
            }
        };
        if !shortfalls.is_empty() {
            tracing::info!(shortfalls = shortfalls.len(), "Stock reservation rejected");
            self.metrics.record_reservation("insufficient");
            return Err(LedgerError::InsufficientStock(shortfalls));
        }

        // Commit phase
        let mut applied: Vec<StockRequest> = Vec::with_capacity(merged.len());
        for (key, &quantity) in &merged {
            let outcome = self
                .catalog
                .conditional_decrement(key.product_id, key.size.as_ref(), quantity)
                .await;

            let failure = match outcome {
                Ok(DecrementOutcome::Applied { remaining }) => {
                    tracing::debug!(key = %key, quantity = quantity, remaining = remaining, "Stock decremented");
                    applied.push(StockRequest {
                        key: key.clone(),
                        quantity,
                    });
                    continue;
                }
                Ok(DecrementOutcome::Insufficient { available }) => {
                    LedgerError::InsufficientStock(vec![StockShortfall {
                        key: key.clone(),
                        requested: quantity,
                        available,
                    }])
                }
                Ok(DecrementOutcome::Missing) => LedgerError::InsufficientStock(vec![StockShortfall {
                    key: key.clone(),
                    requested: quantity,
                    available: 0,
                }]),
                Err(e) => LedgerError::Store(e),
            };

            tracing::warn!(
                key = %key,
                error = %failure,
                applied = applied.len(),
                "Stock commit failed, rolling back applied decrements"
            );
            self.metrics.record_reservation("rolled_back");

            let remaining = self.restore_locked(&applied).await;
            self.metrics.record_compensation("rollback", remaining.is_empty());
            if !remaining.is_empty() {
                tracing::error!(
                    remaining = ?remaining,
                    "Rollback left stock decremented"
                );
            }
            return Err(failure);
        }

        self.metrics.record_reservation("reserved");
        Ok(Reservation { lines: applied })
    }

    /// Put stock back, under the same per-key locks as reservations.
    ///
    /// Unlike a reservation, a release never gives up on its locks: it
    /// waits out contention for as long as it takes. Only lines the store
    /// keeps refusing come back, as `ReleaseIncomplete`.
    pub async fn release(&self, items: &[StockRequest]) -> Result<(), LedgerError> {
        let merged: Vec<StockRequest> = merge(items)
            .into_iter()
            .map(|(key, quantity)| StockRequest { key, quantity })
            .collect();

        let mut rounds = 0u32;
        let _held = loop {
            match self
                .locks
                .acquire_all(merged.iter().map(|r| r.key.clone()), self.config.lock_timeout)
                .await
            {
                Ok(held) => break held,
                Err(timed_out) => {
                    rounds += 1;
                    tracing::warn!(
                        rounds = rounds,
                        pending = timed_out.pending,
                        keys = timed_out.total,
                        "Release still waiting for stock locks"
                    );
                    self.metrics.record_retry_attempt("release_locks", rounds);
                }
            }
        };

        let remaining = self.restore_locked(&merged).await;
        if remaining.is_empty() {
            tracing::debug!(lines = merged.len(), "Stock released");
            Ok(())
        } else {
            Err(LedgerError::ReleaseIncomplete { remaining })
        }
    }

    /// Increment each request, retrying transient failures. Returns what
    /// could not be restored. Caller must hold the keys' locks.
    async fn restore_locked(&self, requests: &[StockRequest]) -> Vec<StockRequest> {
        let mut remaining = Vec::new();

        for request in requests {
            let key = &request.key;
            let result = retry_on_transient(self.config.retry.clone(), |attempt| {
                if attempt > 1 {
                    self.metrics.record_retry_attempt("stock_increment", attempt);
                }
                self.catalog
                    .increment(key.product_id, key.size.as_ref(), request.quantity)
            })
            .await
            .into_result();
            self.metrics.record_retry_outcome("stock_increment", result.is_ok());

            if let Err(e) = result {
                tracing::error!(key = %key, quantity = request.quantity, error = %e, "Stock increment failed");
                remaining.push(request.clone());
            }
        }

        remaining
    }

    /// Forget lock entries for keys nobody is using.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}
