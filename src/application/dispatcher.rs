//! Idempotent side-effect dispatcher with bounded retry.
//!
//! Every effect is tracked under its idempotency key. A key is executed at
//! most once successfully per process: redelivered work for a key that is
//! queued collapses onto the existing entry, and a delivered key is never run
//! again. Failed attempts are retried on independent tasks with exponential
//! backoff until `max_attempts`, after which the entry stays in the queue as
//! `failed` for an operator to inspect or re-arm.
//!
//! The queue lives in process memory. Running several instances, or
//! restarting, loses in-flight entries; persistent delivery needs an outbox
//! table in the storefront database.
//!
//! Delivered keys are remembered up to `delivered_capacity`, oldest evicted
//! first. Eviction only drops the in-process shortcut: post-payment effects
//! are dispatched by the one delivery that moves an order into `paid`, and
//! the order state machine never re-enters `paid`.
//!
//! Attempts run on spawned tasks. A caller that stops waiting, such as a
//! request cut off by its timeout, does not strand an entry mid-attempt.

use futures::future::join_all;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::dispatch::{
    IdempotencyKey, QueueStatus, QueuedSideEffect, RetryDecision, SideEffect,
};
use crate::domain::foundation::Timestamp;
use crate::ports::SideEffectExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Attempts before an entry is marked failed.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further one.
    pub base_delay: Duration,

    /// Delivered keys remembered before the oldest is forgotten.
    pub delivered_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            delivered_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Delivered,
    Retry(Duration),
    Exhausted,
    Missing,
}

/// Insertion-ordered key set that forgets its oldest key past `capacity`.
struct DeliveredKeys {
    capacity: usize,
    keys: HashSet<IdempotencyKey>,
    order: VecDeque<IdempotencyKey>,
}

impl DeliveredKeys {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            keys: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    fn contains(&self, key: &IdempotencyKey) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: IdempotencyKey) {
        if !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

struct Inner {
    executor: Arc<dyn SideEffectExecutor>,
    config: DispatcherConfig,

    // Lock order: queue, then delivered.
    queue: RwLock<HashMap<IdempotencyKey, QueuedSideEffect>>,
    delivered: RwLock<DeliveredKeys>,
}

/// Runs side effects exactly once per idempotency key.
///
/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    inner: Arc<Inner>,
}

impl SideEffectDispatcher {
    pub fn new(executor: Arc<dyn SideEffectExecutor>, config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                config,
                queue: RwLock::new(HashMap::new()),
                delivered: RwLock::new(DeliveredKeys::new(config.delivered_capacity)),
            }),
        }
    }

    /// Executes `effect` unless `key` is already known.
    ///
    /// Returns whether the effect has been delivered by the time this call
    /// returns. A failed first attempt returns `false` and schedules a retry.
    pub async fn dispatch(&self, effect: SideEffect, key: IdempotencyKey) -> bool {
        {
            let mut queue = self.inner.queue.write().await;
            if self.inner.delivered.read().await.contains(&key) {
                tracing::debug!(idempotency_key = %key, "Side effect already delivered, skipping");
                return true;
            }
            if let Some(existing) = queue.get(&key) {
                tracing::info!(
                    idempotency_key = %key,
                    state = ?existing.state,
                    attempts = existing.attempts,
                    "Side effect already queued, request collapsed"
                );
                return false;
            }

            let mut entry = QueuedSideEffect::new(effect, self.inner.config.max_attempts);
            entry.id = key.clone();
            queue.insert(key.clone(), entry);
        }

        self.spawn_delivery(key).await
    }

    /// Dispatches several effects concurrently under their own keys.
    ///
    /// One failing effect never holds back the others.
    pub async fn dispatch_all(&self, effects: Vec<SideEffect>) -> Vec<(IdempotencyKey, bool)> {
        join_all(effects.into_iter().map(|effect| async move {
            let key = effect.idempotency_key();
            let delivered = self.dispatch(effect, key.clone()).await;
            (key, delivered)
        }))
        .await
    }

    /// Snapshot of pending and failed entries.
    pub async fn queue_status(&self) -> QueueStatus {
        let queue = self.inner.queue.read().await;
        let delivered = self.inner.delivered.read().await.len();

        let mut entries: Vec<QueuedSideEffect> = queue.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let failed = entries.iter().filter(|e| e.is_failed()).count();

        QueueStatus {
            pending: entries.len() - failed,
            failed,
            delivered,
            entries,
        }
    }

    /// Re-arms a failed entry and runs it again.
    ///
    /// Returns `false` if the key is unknown or not in the failed state.
    pub async fn retry_failed(&self, key: &IdempotencyKey) -> bool {
        {
            let mut queue = self.inner.queue.write().await;
            let Some(entry) = queue.get_mut(key) else {
                return false;
            };
            if !entry.rearm() {
                return false;
            }
        }

        tracing::info!(idempotency_key = %key, "Failed side effect re-armed by operator");
        self.spawn_delivery(key.clone()).await;
        true
    }

    /// Runs the first attempt on its own task and waits for it.
    ///
    /// Dropping the returned future leaves the attempt, and any retries it
    /// schedules, running to completion.
    async fn spawn_delivery(&self, key: IdempotencyKey) -> bool {
        let dispatcher = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move { dispatcher.deliver(task_key).await });
        match handle.await {
            Ok(delivered) => delivered,
            Err(error) => {
                tracing::error!(
                    idempotency_key = %key,
                    error = %error,
                    "Side effect attempt task aborted"
                );
                false
            }
        }
    }

    async fn deliver(&self, key: IdempotencyKey) -> bool {
        match self.run_attempt(&key).await {
            AttemptOutcome::Delivered => true,
            AttemptOutcome::Retry(delay) => {
                self.schedule_retry(key, delay);
                false
            }
            AttemptOutcome::Exhausted | AttemptOutcome::Missing => false,
        }
    }

    async fn run_attempt(&self, key: &IdempotencyKey) -> AttemptOutcome {
        let (effect, attempt) = {
            let mut queue = self.inner.queue.write().await;
            let Some(entry) = queue.get_mut(key) else {
                return AttemptOutcome::Missing;
            };
            entry.begin_attempt(Timestamp::now());
            (entry.effect.clone(), entry.attempts + 1)
        };

        let result = self.inner.executor.execute(&effect).await;

        let mut queue = self.inner.queue.write().await;
        match result {
            Ok(()) => {
                queue.remove(key);
                self.inner.delivered.write().await.insert(key.clone());
                tracing::info!(
                    idempotency_key = %key,
                    order_id = %effect.order_id,
                    kind = %effect.kind,
                    attempt,
                    "Side effect delivered"
                );
                AttemptOutcome::Delivered
            }
            Err(error) => {
                let Some(entry) = queue.get_mut(key) else {
                    return AttemptOutcome::Missing;
                };
                let now = Timestamp::now();
                let decision = if error.is_retryable() {
                    entry.record_failure(error.to_string(), now, self.inner.config.base_delay)
                } else {
                    entry.record_permanent_failure(error.to_string(), now);
                    RetryDecision::Exhausted
                };
                match decision {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::warn!(
                            idempotency_key = %key,
                            order_id = %effect.order_id,
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %error,
                            "Side effect attempt failed, retry scheduled"
                        );
                        AttemptOutcome::Retry(delay)
                    }
                    RetryDecision::Exhausted => {
                        tracing::error!(
                            idempotency_key = %key,
                            order_id = %effect.order_id,
                            kind = %effect.kind,
                            attempts = entry.attempts,
                            error = %error,
                            "Side effect failed permanently, manual intervention required"
                        );
                        AttemptOutcome::Exhausted
                    }
                }
            }
        }
    }

    /// Retries on a detached task until delivered or exhausted.
    fn schedule_retry(&self, key: IdempotencyKey, delay: Duration) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::time::sleep(delay).await;
                match dispatcher.run_attempt(&key).await {
                    AttemptOutcome::Retry(next) => delay = next,
                    _ => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispatch::{EmailMessage, QueueEntryState, SideEffectKind};
    use crate::domain::foundation::OrderId;
    use crate::ports::{LedgerError, NotificationError, SideEffectError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Executor that fails a configurable number of times per kind.
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: AtomicU32,
        failures: Mutex<HashMap<SideEffectKind, u32>>,
        executed: Mutex<Vec<SideEffectKind>>,
    }

    impl ScriptedExecutor {
        fn failing(kind: SideEffectKind, times: u32) -> Self {
            let executor = Self::default();
            executor.failures.lock().unwrap().insert(kind, times);
            executor
        }

        fn set_failures(&self, kind: SideEffectKind, times: u32) {
            self.failures.lock().unwrap().insert(kind, times);
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn executed(&self) -> Vec<SideEffectKind> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SideEffectExecutor for ScriptedExecutor {
        async fn execute(&self, effect: &SideEffect) -> Result<(), SideEffectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&effect.kind) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(match effect.kind {
                        SideEffectKind::LedgerSync => LedgerError::Timeout.into(),
                        _ => NotificationError::Transport("smtp down".to_string()).into(),
                    });
                }
            }
            self.executed.lock().unwrap().push(effect.kind);
            Ok(())
        }
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn email_effect(order_id: OrderId) -> SideEffect {
        SideEffect::customer_confirmation(
            order_id,
            EmailMessage {
                to: "anna@example.ch".to_string(),
                subject: "Bestellbestätigung - ORD-1001".to_string(),
                html: "<p>Danke</p>".to_string(),
                text: None,
            },
        )
    }

    fn dispatcher(executor: &Arc<ScriptedExecutor>) -> SideEffectDispatcher {
        SideEffectDispatcher::new(executor.clone(), config())
    }

    #[tokio::test(start_paused = true)]
    async fn successful_effect_is_delivered_once() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(dispatcher.dispatch(effect.clone(), key.clone()).await);
        assert!(dispatcher.dispatch(effect, key).await);

        assert_eq!(executor.calls(), 1);
        let status = dispatcher.queue_status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_is_retried_with_backoff() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 1));
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(!dispatcher.dispatch(effect, key).await);

        let status = dispatcher.queue_status().await;
        assert_eq!(status.pending, 1);
        assert_eq!(status.entries[0].attempts, 1);
        assert_eq!(status.entries[0].state, QueueEntryState::Scheduled);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(executor.calls(), 2);
        let status = dispatcher.queue_status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn effect_failing_twice_is_delivered_on_third_attempt() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 2));
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(!dispatcher.dispatch(effect.clone(), key.clone()).await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(executor.calls(), 3);
        assert_eq!(executor.executed(), vec![SideEffectKind::LedgerSync]);
        let status = dispatcher.queue_status().await;
        assert!(status.entries.is_empty());
        assert_eq!(status.failed, 0);
        assert_eq!(status.delivered, 1);

        assert!(dispatcher.dispatch(effect, key).await);
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_entry_is_kept_as_failed() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 10));
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        dispatcher.dispatch(effect, key).await;
        // Retries after 100 ms and a further 200 ms.
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(executor.calls(), 3);
        let status = dispatcher.queue_status().await;
        assert_eq!(status.failed, 1);
        assert_eq!(status.pending, 0);

        let entry = &status.entries[0];
        assert!(entry.is_failed());
        assert_eq!(entry.attempts, config().max_attempts);
        assert_eq!(entry.history.len(), 3);
        assert_eq!(entry.last_error.as_deref(), Some("Ledger request timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn unretryable_failure_fails_immediately() {
        struct Unconfigured;

        #[async_trait]
        impl SideEffectExecutor for Unconfigured {
            async fn execute(&self, _effect: &SideEffect) -> Result<(), SideEffectError> {
                Err(LedgerError::NotConfigured("client_id".to_string()).into())
            }
        }

        let dispatcher = SideEffectDispatcher::new(Arc::new(Unconfigured), config());
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(!dispatcher.dispatch(effect, key).await);

        let status = dispatcher.queue_status().await;
        assert_eq!(status.failed, 1);
        assert_eq!(status.entries[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivery_collapses_onto_queued_entry() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 10));
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(!dispatcher.dispatch(effect.clone(), key.clone()).await);
        assert!(!dispatcher.dispatch(effect.clone(), key.clone()).await);
        assert!(!dispatcher.dispatch(effect, key).await);

        assert_eq!(executor.calls(), 1);
        assert_eq!(dispatcher.queue_status().await.entries.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_entry_can_be_rearmed() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 3));
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        dispatcher.dispatch(effect, key.clone()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(dispatcher.queue_status().await.failed, 1);

        assert!(dispatcher.retry_failed(&key).await);

        let status = dispatcher.queue_status().await;
        assert_eq!(status.failed, 0);
        assert_eq!(status.delivered, 1);
        assert_eq!(executor.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_failed_ignores_entries_that_have_not_failed() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher(&executor);
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        assert!(!dispatcher.retry_failed(&key).await);

        executor.set_failures(SideEffectKind::LedgerSync, 1);
        dispatcher.dispatch(effect, key.clone()).await;
        assert!(!dispatcher.retry_failed(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_effect_does_not_block_the_others() {
        let executor = Arc::new(ScriptedExecutor::failing(SideEffectKind::LedgerSync, 10));
        let dispatcher = dispatcher(&executor);
        let order_id = OrderId::new();

        let results = dispatcher
            .dispatch_all(vec![
                email_effect(order_id),
                SideEffect::ledger_sync(order_id),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1);
        assert!(!results[1].1);
        assert_eq!(executor.executed(), vec![SideEffectKind::CustomerConfirmation]);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_survives_caller_timing_out() {
        #[derive(Default)]
        struct SlowExecutor {
            calls: AtomicU32,
        }

        #[async_trait]
        impl SideEffectExecutor for SlowExecutor {
            async fn execute(&self, _effect: &SideEffect) -> Result<(), SideEffectError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let executor = Arc::new(SlowExecutor::default());
        let dispatcher = SideEffectDispatcher::new(executor.clone(), config());
        let effect = SideEffect::ledger_sync(OrderId::new());
        let key = effect.idempotency_key();

        let cut_off = tokio::time::timeout(
            Duration::from_secs(30),
            dispatcher.dispatch(effect.clone(), key.clone()),
        )
        .await;
        assert!(cut_off.is_err());

        tokio::time::sleep(Duration::from_secs(3600)).await;

        let status = dispatcher.queue_status().await;
        assert_eq!(status.pending, 0);
        assert_eq!(status.failed, 0);
        assert_eq!(status.delivered, 1);

        assert!(dispatcher.dispatch(effect, key).await);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delivered_keys_forget_the_oldest_past_capacity() {
        let keys: Vec<IdempotencyKey> = (0..3)
            .map(|_| SideEffect::ledger_sync(OrderId::new()).idempotency_key())
            .collect();
        let mut delivered = DeliveredKeys::new(2);

        for key in &keys {
            delivered.insert(key.clone());
        }
        delivered.insert(keys[2].clone());

        assert_eq!(delivered.len(), 2);
        assert!(!delivered.contains(&keys[0]));
        assert!(delivered.contains(&keys[1]));
        assert!(delivered.contains(&keys[2]));
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_count_is_bounded_by_capacity() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = SideEffectDispatcher::new(
            executor.clone(),
            DispatcherConfig {
                delivered_capacity: 2,
                ..config()
            },
        );

        for _ in 0..5 {
            let effect = SideEffect::ledger_sync(OrderId::new());
            let key = effect.idempotency_key();
            assert!(dispatcher.dispatch(effect, key).await);
        }

        assert_eq!(executor.calls(), 5);
        assert_eq!(dispatcher.queue_status().await.delivered, 2);
    }
}
