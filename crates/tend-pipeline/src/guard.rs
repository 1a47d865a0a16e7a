//! Concurrency guard: cooldown, result cache, circuit breaker.
//!
//! Sits between the watcher and the ingestion pipeline. Three independent
//! checks, applied in order:
//!
//! 1. **Cooldown** — a repeat trigger for the same note inside the cooldown
//!    window is coalesced into a no-op instead of starting a second job.
//! 2. **Result cache** — a trigger whose content fingerprint matches a
//!    recent successful enrichment is answered from cache without calling
//!    the external service.
//! 3. **Circuit breaker** — per-resource trigger-rate and error-rate
//!    tracking; an open breaker short-circuits triggers until a recovery
//!    timeout elapses, without consuming any external-call budget.
//!
//! Time is measured with `tokio::time::Instant` so tests can drive the
//! clock.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tend_config::GuardConfig;
use tend_core::{NoteId, ScoreOutcome};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

const RATE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Verdict on a new trigger for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed to processing.
    Admitted,
    /// A trigger for this note was accepted within the cooldown window;
    /// this one is coalesced into it.
    Coalesced,
}

/// Circuit breaker state for one external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls are blocked until the recovery timeout elapses.
    Open,
    /// Probing: a limited number of calls are let through to test recovery.
    HalfOpen,
}

/// Cached successful enrichment result, keyed by content fingerprint.
#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: ScoreOutcome,
    stored_at: Instant,
}

/// Per-resource breaker bookkeeping.
#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    /// Accepted trigger times inside the rate window.
    triggers: VecDeque<Instant>,
    calls: u32,
    failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            triggers: VecDeque::new(),
            calls: 0,
            failures: 0,
            half_open_successes: 0,
            opened_at: None,
        }
    }
}

/// Counters exposed for operator visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    pub admitted: u64,
    pub coalesced: u64,
    pub cache_hits: u64,
    pub short_circuited: u64,
}

/// Wraps externally-triggered processing with per-resource throttling.
pub struct ConcurrencyGuard {
    config: GuardConfig,
    cooldowns: Mutex<HashMap<NoteId, Instant>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    breakers: Mutex<HashMap<String, Breaker>>,
    stats: Mutex<GuardStats>,
}

impl ConcurrencyGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            cooldowns: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
            stats: Mutex::new(GuardStats::default()),
        }
    }

    pub fn stats(&self) -> GuardStats {
        *self.stats.lock()
    }

    /// Admit or coalesce a trigger for `id`. An admitted trigger starts a
    /// new cooldown window.
    pub fn admit(&self, id: &NoteId) -> Admission {
        let now = Instant::now();
        let mut cooldowns = self.cooldowns.lock();
        if let Some(last) = cooldowns.get(id) {
            if now.duration_since(*last) < self.config.cooldown() {
                self.stats.lock().coalesced += 1;
                debug!(id = %id, "trigger coalesced inside cooldown window");
                return Admission::Coalesced;
            }
        }
        cooldowns.insert(id.clone(), now);
        self.stats.lock().admitted += 1;
        Admission::Admitted
    }

    /// Look up a cached result for this content fingerprint. Entries older
    /// than the retention window are expired on access.
    pub fn cached(&self, fingerprint: &str) -> Option<ScoreOutcome> {
        let now = Instant::now();
        let mut cache = self.cache.lock();
        match cache.get(fingerprint) {
            Some(entry) if now.duration_since(entry.stored_at) < self.config.cache_retention() => {
                self.stats.lock().cache_hits += 1;
                debug!(fingerprint, "enrichment served from result cache");
                Some(entry.outcome.clone())
            }
            Some(_) => {
                cache.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Record a successful enrichment for future duplicate triggers.
    pub fn store_result(&self, fingerprint: &str, outcome: ScoreOutcome) {
        self.cache.lock().insert(
            fingerprint.to_string(),
            CacheEntry {
                outcome,
                stored_at: Instant::now(),
            },
        );
    }

    /// Whether a call to `resource` may proceed. Records the trigger against
    /// the resource's rate budget when it does.
    pub fn check_breaker(&self, resource: &str) -> CircuitState {
        let now = Instant::now();
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(resource.to_string())
            .or_insert_with(Breaker::new);

        if breaker.state == CircuitState::Open {
            let elapsed = breaker
                .opened_at
                .map(|at| now.duration_since(at))
                .unwrap_or_default();
            if elapsed >= self.config.recovery_timeout() {
                breaker.state = CircuitState::HalfOpen;
                breaker.half_open_successes = 0;
                info!(resource, "circuit breaker half-open; probing");
            } else {
                self.stats.lock().short_circuited += 1;
                return CircuitState::Open;
            }
        }

        // Trigger-rate tracking applies in closed and half-open states.
        while let Some(front) = breaker.triggers.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                breaker.triggers.pop_front();
            } else {
                break;
            }
        }
        if breaker.triggers.len() as u32 >= self.config.max_triggers_per_hour {
            self.open(breaker, now);
            warn!(resource, "trigger rate exceeded; circuit opened");
            self.stats.lock().short_circuited += 1;
            return CircuitState::Open;
        }
        breaker.triggers.push_back(now);
        breaker.state
    }

    /// Record the outcome of an external call for `resource`.
    pub fn record_outcome(&self, resource: &str, success: bool) {
        let now = Instant::now();
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(resource.to_string())
            .or_insert_with(Breaker::new);

        breaker.calls += 1;
        if !success {
            breaker.failures += 1;
        }

        match breaker.state {
            CircuitState::HalfOpen => {
                if success {
                    breaker.half_open_successes += 1;
                    if breaker.half_open_successes >= self.config.success_threshold {
                        breaker.state = CircuitState::Closed;
                        breaker.calls = 0;
                        breaker.failures = 0;
                        info!(resource, "circuit breaker closed after recovery");
                    }
                } else {
                    self.open(breaker, now);
                    warn!(resource, "probe failed; circuit reopened");
                }
            }
            CircuitState::Closed => {
                if breaker.calls >= self.config.min_calls_for_error_rate {
                    let rate = f64::from(breaker.failures) / f64::from(breaker.calls);
                    if rate > self.config.error_rate_threshold {
                        self.open(breaker, now);
                        warn!(resource, error_rate = rate, "error rate exceeded; circuit opened");
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, breaker: &mut Breaker, now: Instant) {
        breaker.state = CircuitState::Open;
        breaker.opened_at = Some(now);
        breaker.half_open_successes = 0;
        breaker.calls = 0;
        breaker.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(config: GuardConfig) -> ConcurrencyGuard {
        ConcurrencyGuard::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_triggers_inside_cooldown_are_coalesced() {
        let guard = guard(GuardConfig::default());
        let id = NoteId::from("n1");

        assert_eq!(guard.admit(&id), Admission::Admitted);
        for _ in 0..19 {
            assert_eq!(guard.admit(&id), Admission::Coalesced);
        }
        assert_eq!(guard.stats().admitted, 1);
        assert_eq!(guard.stats().coalesced, 19);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(guard.admit(&id), Admission::Admitted);
        assert_eq!(guard.stats().admitted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_is_per_note() {
        let guard = guard(GuardConfig::default());
        assert_eq!(guard.admit(&NoteId::from("a")), Admission::Admitted);
        assert_eq!(guard.admit(&NoteId::from("b")), Admission::Admitted);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_retention_window() {
        let guard = guard(GuardConfig::default());
        let outcome = ScoreOutcome {
            quality_score: 0.8,
            tags: vec!["x".into()],
        };

        guard.store_result("fp", outcome.clone());
        assert_eq!(guard.cached("fp"), Some(outcome));

        tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
        assert_eq!(guard.cached("fp"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn error_rate_opens_the_breaker() {
        let guard = guard(GuardConfig::default());

        for _ in 0..3 {
            assert_eq!(guard.check_breaker("svc"), CircuitState::Closed);
            guard.record_outcome("svc", true);
        }
        // 4 failures out of 7 calls crosses the 50% threshold once the
        // minimum call count is met.
        for _ in 0..4 {
            guard.check_breaker("svc");
            guard.record_outcome("svc", false);
        }

        assert_eq!(guard.check_breaker("svc"), CircuitState::Open);
        assert!(guard.stats().short_circuited >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_recovers_through_half_open() {
        let config = GuardConfig {
            min_calls_for_error_rate: 1,
            ..GuardConfig::default()
        };
        let guard = guard(config);

        guard.check_breaker("svc");
        guard.record_outcome("svc", false);
        assert_eq!(guard.check_breaker("svc"), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(guard.check_breaker("svc"), CircuitState::HalfOpen);
        guard.record_outcome("svc", true);
        assert_eq!(guard.check_breaker("svc"), CircuitState::HalfOpen);
        guard.record_outcome("svc", true);

        assert_eq!(guard.check_breaker("svc"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_rate_opens_the_breaker() {
        let config = GuardConfig {
            max_triggers_per_hour: 5,
            ..GuardConfig::default()
        };
        let guard = guard(config);

        for _ in 0..5 {
            assert_eq!(guard.check_breaker("svc"), CircuitState::Closed);
        }
        assert_eq!(guard.check_breaker("svc"), CircuitState::Open);
    }
}
