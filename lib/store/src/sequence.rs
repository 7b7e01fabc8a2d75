//! Year-scoped document number sequences.
//!
//! Each (prefix, year) pair owns a counter document. Allocation reads the
//! counter and compare-and-swaps it forward, so concurrent allocators never
//! hand out the same number. Numbers burned by a request that later fails
//! are not reused.

use crate::error::StoreError;
use async_trait::async_trait;
use procureflix_core::{DocumentNumber, NumberPrefix};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Storage for named counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Reads a counter; `None` if it was never written.
    async fn read(&self, scope: &str) -> Result<Option<u64>, StoreError>;

    /// Sets a counter to `next` if it still holds `expected`.
    async fn compare_and_swap(
        &self,
        scope: &str,
        expected: Option<u64>,
        next: u64,
    ) -> Result<bool, StoreError>;
}

/// Counters held in an in-process map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterStore {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryCounterStore {
    /// Creates an empty counter store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn read(&self, scope: &str) -> Result<Option<u64>, StoreError> {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        Ok(counters.get(scope).copied())
    }

    async fn compare_and_swap(
        &self,
        scope: &str,
        expected: Option<u64>,
        next: u64,
    ) -> Result<bool, StoreError> {
        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        if counters.get(scope).copied() != expected {
            return Ok(false);
        }
        counters.insert(scope.to_string(), next);
        Ok(true)
    }
}

/// Default number of compare-and-swap attempts per allocation.
pub const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 8;

/// Hands out document numbers from a [`CounterStore`].
#[derive(Clone)]
pub struct SequenceAllocator {
    counters: Arc<dyn CounterStore>,
    max_attempts: u32,
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SequenceAllocator {
    /// Creates an allocator over a counter store.
    #[must_use]
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self {
            counters,
            max_attempts: DEFAULT_ALLOCATION_ATTEMPTS,
        }
    }

    /// Sets how many times a contended counter is retried.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Allocates the next number for `prefix` in `year`.
    pub async fn next(&self, prefix: NumberPrefix, year: i32) -> Result<DocumentNumber, StoreError> {
        let scope = DocumentNumber::scope(prefix, year);
        for attempt in 1..=self.max_attempts {
            let current = self.counters.read(&scope).await?;
            let next = current.unwrap_or(0) + 1;
            if self
                .counters
                .compare_and_swap(&scope, current, next)
                .await?
            {
                let number = DocumentNumber::new(prefix, year, next);
                debug!(%number, attempt, "allocated document number");
                return Ok(number);
            }
            debug!(%scope, attempt, "counter moved, retrying");
        }
        warn!(%scope, attempts = self.max_attempts, "gave up allocating document number");
        Err(StoreError::CounterContention {
            scope,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn numbers_increase_per_scope() {
        let allocator = SequenceAllocator::new(Arc::new(InMemoryCounterStore::new()));

        let first = allocator
            .next(NumberPrefix::Contract, 2026)
            .await
            .expect("first");
        let second = allocator
            .next(NumberPrefix::Contract, 2026)
            .await
            .expect("second");
        let other_year = allocator
            .next(NumberPrefix::Contract, 2027)
            .await
            .expect("other year");
        let other_prefix = allocator
            .next(NumberPrefix::PaymentAuthorization, 2026)
            .await
            .expect("other prefix");

        assert_eq!(first.to_string(), "CTR-2026-0001");
        assert_eq!(second.to_string(), "CTR-2026-0002");
        assert_eq!(other_year.to_string(), "CTR-2027-0001");
        assert_eq!(other_prefix.to_string(), "PAF-2026-0001");
    }

    #[tokio::test]
    async fn concurrent_allocations_are_unique() {
        let allocator = SequenceAllocator::new(Arc::new(InMemoryCounterStore::new()))
            .with_max_attempts(64);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.next(NumberPrefix::Vendor, 2026).await
            }));
        }

        let mut sequences = Vec::new();
        for handle in handles {
            let number = handle.await.expect("join").expect("allocate");
            sequences.push(number.sequence);
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=16).collect::<Vec<u64>>());
    }

    /// A counter store whose swaps always lose.
    struct Contended {
        swaps: AtomicU32,
    }

    #[async_trait]
    impl CounterStore for Contended {
        async fn read(&self, _scope: &str) -> Result<Option<u64>, StoreError> {
            Ok(Some(41))
        }

        async fn compare_and_swap(
            &self,
            _scope: &str,
            _expected: Option<u64>,
            _next: u64,
        ) -> Result<bool, StoreError> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    #[tokio::test]
    async fn contention_is_bounded() {
        let store = Arc::new(Contended {
            swaps: AtomicU32::new(0),
        });
        let allocator = SequenceAllocator::new(store.clone()).with_max_attempts(3);

        let err = allocator
            .next(NumberPrefix::Contract, 2026)
            .await
            .expect_err("contended");
        assert_eq!(
            err,
            StoreError::CounterContention {
                scope: "CTR:2026".to_string(),
                attempts: 3
            }
        );
        assert_eq!(store.swaps.load(Ordering::SeqCst), 3);
    }
}
