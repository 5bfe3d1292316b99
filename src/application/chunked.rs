//! Congestion-controlled delivery of a target amount in concurrent chunks.
//!
//! A handful of attempt chains send chunks in parallel. A chain keeps going
//! only while its chunks are fulfilled; any reject ends it. Overshooting the
//! target shrinks the shared chunk size, a liquidity-ceiling reject resizes it
//! to what the path reported, and a timer adds one new chain per interval.

use crate::application::payment_loop::PaymentLoop;
use crate::domain::packet::{AmountTooLarge, ErrorCode, PaymentResult, Reject};
use crate::domain::ports::ResolutionPolicy;
use crate::error::{LoopError, Result};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Tuning of the chunk scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    /// Applied on top of the ratio reported by a liquidity-ceiling reject.
    pub chunk_size_margin: Decimal,
    /// Chunk size multiplier when a chunk would overshoot the ceiling.
    pub end_game_factor: Decimal,
    /// Ceiling of the delivered total, relative to the target.
    pub overshoot_allowance: Decimal,
    pub initial_attempts: usize,
    /// Period of the additive increase: one new attempt chain per tick.
    pub additive_increase_interval: Duration,
    /// How far in the future each prepare expires.
    pub attempt_expiry: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size_margin: dec!(0.99),
            end_game_factor: dec!(0.75),
            overshoot_allowance: dec!(1.01),
            initial_attempts: 4,
            additive_increase_interval: Duration::from_millis(1000),
            attempt_expiry: Duration::from_millis(10_000),
        }
    }
}

/// Snapshot of a `chunked` call taken when the target was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub min_destination_amount: u64,
    pub amount_arrived: u64,
    pub fulfilled: u64,
    pub rejected: u64,
    /// Attempts whose round trip failed at the transport or codec level.
    pub failed: u64,
    pub chunk_size: Decimal,
    pub elapsed: Duration,
}

impl ChunkReport {
    /// Delivered destination units per second.
    pub fn throughput(&self) -> Decimal {
        let millis = Decimal::from(self.elapsed.as_millis().max(1) as u64);
        Decimal::from(self.amount_arrived) * dec!(1000) / millis
    }
}

struct ChunkState {
    chunk_size: Decimal,
    amount_arrived: u64,
    fulfilled: u64,
    rejected: u64,
    failed: u64,
    /// Taken exactly once, when the target is first exceeded.
    done: Option<oneshot::Sender<()>>,
}

impl ChunkState {
    fn completed(&self) -> bool {
        self.done.is_none()
    }

    fn set_chunk_size(&mut self, chunk_size: Decimal) {
        // Prepares carry whole units.
        self.chunk_size = chunk_size.max(Decimal::ONE);
    }
}

/// State shared by all attempt chains of one `chunked` call.
struct ChunkShared {
    config: ChunkConfig,
    min_destination_amount: u64,
    max_destination_amount: Decimal,
    min_exchange_rate: Decimal,
    expiry: TimeDelta,
    state: Mutex<ChunkState>,
}

impl ChunkShared {
    fn new(
        config: ChunkConfig,
        min_destination_amount: u64,
        min_exchange_rate: Decimal,
        done: oneshot::Sender<()>,
    ) -> Result<Self> {
        if min_destination_amount == 0 {
            return Err(LoopError::Validation(
                "minimum destination amount must be positive".to_string(),
            ));
        }
        if min_exchange_rate <= Decimal::ZERO {
            return Err(LoopError::Validation(
                "minimum exchange rate must be positive".to_string(),
            ));
        }
        if config.additive_increase_interval.is_zero() {
            return Err(LoopError::Validation(
                "additive increase interval must be positive".to_string(),
            ));
        }

        let target = Decimal::from(min_destination_amount);
        let chunk_size = target.checked_div(min_exchange_rate).ok_or_else(|| {
            LoopError::Validation("initial chunk size out of range".to_string())
        })?;
        let max_destination_amount = target
            .checked_mul(config.overshoot_allowance)
            .ok_or_else(|| LoopError::Validation("overshoot ceiling out of range".to_string()))?;
        // Completion needs at least `min + 1` whole units within the ceiling.
        if max_destination_amount.floor() <= target {
            return Err(LoopError::Validation(format!(
                "overshoot ceiling {} leaves no room above the target {}",
                max_destination_amount, min_destination_amount
            )));
        }
        let expiry = TimeDelta::from_std(config.attempt_expiry)
            .map_err(|e| LoopError::Validation(format!("attempt expiry: {}", e)))?;

        let mut state = ChunkState {
            chunk_size: Decimal::ONE,
            amount_arrived: 0,
            fulfilled: 0,
            rejected: 0,
            failed: 0,
            done: Some(done),
        };
        state.set_chunk_size(chunk_size);

        Ok(Self {
            config,
            min_destination_amount,
            max_destination_amount,
            min_exchange_rate,
            expiry,
            state: Mutex::new(state),
        })
    }

    /// Source amount of the next chunk: the current chunk size in whole units.
    fn next_source_amount(&self) -> u64 {
        let chunk_size = self.state.lock().chunk_size;
        chunk_size.floor().to_u64().unwrap_or(u64::MAX).max(1)
    }

    /// Decides whether a chunk sent with `source_amount` that arrived as
    /// `amount` is accepted, updating the delivered total when it is.
    fn evaluate(&self, source_amount: u64, amount: u64) -> bool {
        let required = Decimal::from(source_amount).checked_mul(self.min_exchange_rate);
        let arrived = Decimal::from(amount);
        if required.is_none_or(|required| arrived < required) {
            debug!(source_amount, amount, "Chunk arrived below the minimum rate");
            return false;
        }

        let mut state = self.state.lock();
        if Decimal::from(state.amount_arrived) + arrived > self.max_destination_amount {
            let shrunk = state.chunk_size * self.config.end_game_factor;
            state.set_chunk_size(shrunk);
            debug!(
                amount,
                amount_arrived = state.amount_arrived,
                chunk_size = %state.chunk_size,
                "Chunk would overshoot, shrinking"
            );
            return false;
        }

        state.amount_arrived = state.amount_arrived.saturating_add(amount);
        if state.amount_arrived > self.min_destination_amount
            && let Some(done) = state.done.take()
        {
            info!(amount_arrived = state.amount_arrived, "Target amount reached");
            let _ = done.send(());
        }
        true
    }

    /// Records a fulfilled chunk. Returns whether its chain should continue.
    fn record_fulfilled(&self) -> bool {
        let mut state = self.state.lock();
        state.fulfilled += 1;
        !state.completed()
    }

    fn record_rejected(&self, source_amount: u64, reject: &Reject) {
        let mut state = self.state.lock();
        state.rejected += 1;
        if reject.code != ErrorCode::AmountTooLarge {
            return;
        }
        let Some(AmountTooLarge {
            received_amount,
            maximum_amount,
        }) = reject.amount_too_large_details()
        else {
            warn!(triggered_by = %reject.triggered_by, "Amount too large reject without figures");
            return;
        };
        if received_amount == 0 {
            return;
        }

        let ratio = Decimal::from(maximum_amount) / Decimal::from(received_amount);
        if let Some(resized) = Decimal::from(source_amount)
            .checked_mul(ratio)
            .and_then(|size| size.checked_mul(self.config.chunk_size_margin))
        {
            state.set_chunk_size(resized);
            debug!(
                triggered_by = %reject.triggered_by,
                received_amount,
                maximum_amount,
                chunk_size = %state.chunk_size,
                "Liquidity ceiling hit, resizing chunks"
            );
        }
    }

    fn record_failed(&self) {
        self.state.lock().failed += 1;
    }

    fn report(&self, elapsed: Duration) -> ChunkReport {
        let state = self.state.lock();
        ChunkReport {
            min_destination_amount: self.min_destination_amount,
            amount_arrived: state.amount_arrived,
            fulfilled: state.fulfilled,
            rejected: state.rejected,
            failed: state.failed,
            chunk_size: state.chunk_size,
            elapsed,
        }
    }
}

/// Resolution policy of one chunk.
struct ChunkPolicy {
    shared: Arc<ChunkShared>,
    source_amount: u64,
}

#[async_trait]
impl ResolutionPolicy for ChunkPolicy {
    async fn authorize(&self, amount: u64) -> bool {
        self.shared.evaluate(self.source_amount, amount)
    }
}

/// Sends chunks one after another until one is not fulfilled or the target is reached.
async fn run_attempts(payment_loop: PaymentLoop, shared: Arc<ChunkShared>) {
    loop {
        let source_amount = shared.next_source_amount();
        let expires_at = Utc::now() + shared.expiry;
        let policy = ChunkPolicy {
            shared: shared.clone(),
            source_amount,
        };

        match payment_loop.pay(source_amount, expires_at, policy).await {
            Ok(PaymentResult::Fulfilled(_)) => {
                if !shared.record_fulfilled() {
                    return;
                }
            }
            Ok(PaymentResult::Rejected(reject)) => {
                debug!(source_amount, code = %reject.code, "Chunk rejected, ending attempt chain");
                shared.record_rejected(source_amount, &reject);
                return;
            }
            Err(e) => {
                warn!(source_amount, error = %e, "Chunk failed, ending attempt chain");
                shared.record_failed();
                return;
            }
        }
        tokio::task::yield_now().await;
    }
}

fn spawn_attempts(payment_loop: &PaymentLoop, shared: &Arc<ChunkShared>) {
    tokio::spawn(run_attempts(payment_loop.clone(), shared.clone()));
}

impl PaymentLoop {
    /// Delivers more than `min_destination_amount` to this loop's own address,
    /// never accepting a chunk below `min_exchange_rate`.
    ///
    /// Resolves once the target is exceeded. Attempts still in flight at that
    /// point are not cancelled. If the target is unreachable the future never
    /// resolves, so callers wanting a bound should wrap it in a timeout.
    ///
    /// With the default 1% overshoot allowance the target must be at least 100:
    /// below that no whole amount fits between the target and the ceiling.
    pub async fn chunked(
        &self,
        min_destination_amount: u64,
        min_exchange_rate: Decimal,
    ) -> Result<ChunkReport> {
        self.chunked_with_config(min_destination_amount, min_exchange_rate, ChunkConfig::default())
            .await
    }

    /// Same as [`PaymentLoop::chunked`] with explicit scheduler tuning.
    ///
    /// # Arguments
    ///
    /// * `min_destination_amount` - Amount that must be exceeded at the destination.
    /// * `min_exchange_rate` - Lowest arrived/sent ratio a chunk may have.
    /// * `config` - Chunk sizing factors, parallelism and timing.
    ///
    /// # Errors
    ///
    /// `LoopError::Validation` when the parameters cannot lead to completion:
    /// a zero target, a non-positive rate, a zero interval, or an overshoot
    /// ceiling that leaves no whole unit above the target.
    pub async fn chunked_with_config(
        &self,
        min_destination_amount: u64,
        min_exchange_rate: Decimal,
        config: ChunkConfig,
    ) -> Result<ChunkReport> {
        let (done_tx, mut done_rx) = oneshot::channel();
        let initial_attempts = config.initial_attempts;
        let interval = config.additive_increase_interval;
        let shared = Arc::new(ChunkShared::new(
            config,
            min_destination_amount,
            min_exchange_rate,
            done_tx,
        )?);

        let started = Instant::now();
        info!(
            min_destination_amount,
            %min_exchange_rate,
            chunk_size = %shared.state.lock().chunk_size,
            "Starting chunked payment"
        );
        for _ in 0..initial_attempts {
            spawn_attempts(self, &shared);
        }

        let mut additive_increase = tokio::time::interval_at(started + interval, interval);
        additive_increase.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut done_rx => break,
                _ = additive_increase.tick() => {
                    debug!("Additive increase, starting another attempt chain");
                    spawn_attempts(self, &shared);
                }
            }
        }

        let report = shared.report(started.elapsed());
        info!(
            amount_arrived = report.amount_arrived,
            fulfilled = report.fulfilled,
            rejected = report.rejected,
            failed = report.failed,
            "Chunked payment complete"
        );
        Ok(report)
    }
}
