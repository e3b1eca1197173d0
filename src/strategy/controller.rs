//! Strategy controller - the polling loop that drives the velocity breakout strategy
//!
//! One cycle = analyze -> (execute) -> record. Cycles are started by a fixed
//! interval timer or by a manual refresh; both go through the same in-flight
//! guard, so a trigger that arrives while a cycle is running is dropped.
//! Failures are logged to the commentary feed and end the cycle; only
//! [`StrategyController::disable`] stops the loop.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{SameSidePolicy, StrategyConfig, StrategyConfigUpdate};
use crate::analysis::MarketAnalyzer;
use crate::commentary::{CommentaryKind, CommentaryLog, CommentaryMessage};
use crate::error::{AnalysisError, ControlError, ExecutionError};
use crate::execution::{
    ClosedPosition, ExitReason, PerformanceAggregator, PerformanceMetrics, Position, PositionLedger,
    TradeExecutor,
};
use crate::types::{AnalysisResult, Side};

/// Timing parameters for the loop
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub poll_interval: Duration,
    pub analysis_timeout: Duration,
    pub execution_timeout: Duration,
    /// Account currency per point per lot, used for P&L marks
    pub point_value: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            analysis_timeout: Duration::from_secs(20),
            execution_timeout: Duration::from_secs(20),
            point_value: 1.0,
        }
    }
}

/// Where the current cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle = 0,
    Analyzing = 1,
    Executing = 2,
}

impl CyclePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Analyzing,
            2 => Self::Executing,
            _ => Self::Idle,
        }
    }
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing ran
    Skipped,
    AnalysisFailed(AnalysisError),
    NoSignal,
    /// A signal was seen but not acted on
    SignalIgnored { signal: Side, reason: String },
    Executed { position_id: Uuid },
    ExecutionFailed(ExecutionError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub enabled: bool,
    pub phase: CyclePhase,
    pub poll_interval_secs: f64,
    pub open_positions: usize,
    pub commentary_entries: usize,
    pub config: StrategyConfig,
}

/// Clears the in-flight flag when the cycle ends, however it ends
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    phase: &'a AtomicU8,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, phase: &'a AtomicU8) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, phase })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(CyclePhase::Idle as u8, Ordering::Release);
        self.flag.store(false, Ordering::Release);
    }
}

struct Inner {
    analyzer: Arc<dyn MarketAnalyzer>,
    executor: Arc<dyn TradeExecutor>,
    settings: ControllerSettings,
    config: RwLock<StrategyConfig>,
    ledger: Mutex<PositionLedger>,
    commentary: Mutex<CommentaryLog>,
    performance: Mutex<PerformanceAggregator>,
    in_flight: AtomicBool,
    phase: AtomicU8,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Cheap, cloneable handle to the strategy loop
#[derive(Clone)]
pub struct StrategyController {
    inner: Arc<Inner>,
}

impl StrategyController {
    pub fn new(
        analyzer: Arc<dyn MarketAnalyzer>,
        executor: Arc<dyn TradeExecutor>,
        mut config: StrategyConfig,
        settings: ControllerSettings,
    ) -> Self {
        // The loop only starts through enable()
        config.enabled = false;
        let ledger = PositionLedger::new(settings.point_value);

        Self {
            inner: Arc::new(Inner {
                analyzer,
                executor,
                settings,
                config: RwLock::new(config),
                ledger: Mutex::new(ledger),
                commentary: Mutex::new(CommentaryLog::new()),
                performance: Mutex::new(PerformanceAggregator::new()),
                in_flight: AtomicBool::new(false),
                phase: AtomicU8::new(CyclePhase::Idle as u8),
                timer: Mutex::new(None),
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn set_enabled(&self, enabled: bool) -> bool {
        if enabled {
            self.enable().await
        } else {
            self.disable().await
        }
    }

    /// Start the loop. The timer's first tick fires immediately, so one
    /// cycle runs right away. Returns false if it was already running.
    pub async fn enable(&self) -> bool {
        let mut timer = self.inner.timer.lock().await;
        if timer.is_some() {
            debug!("Strategy already enabled");
            return false;
        }

        self.inner.config.write().await.enabled = true;

        let period = self.inner.settings.poll_interval;
        info!("Strategy enabled, polling every {:?}", period);
        self.comment(
            CommentaryKind::Analysis,
            format!("Velocity breakout strategy activated, analyzing every {}s", period.as_secs_f64()),
        )
        .await;

        let weak = Arc::downgrade(&self.inner);
        *timer = Some(tokio::spawn(run_timer(weak, period)));
        true
    }

    /// Stop scheduling new cycles. A cycle already running completes and its
    /// results are kept. Open positions are left alone.
    pub async fn disable(&self) -> bool {
        let Some(handle) = self.inner.timer.lock().await.take() else {
            debug!("Strategy already disabled");
            return false;
        };
        handle.abort();

        self.inner.config.write().await.enabled = false;

        let open = self.inner.ledger.lock().await.open_positions().len();
        info!("Strategy disabled ({} open positions kept)", open);
        info!("{}", self.inner.performance.lock().await.summary());
        self.comment(
            CommentaryKind::Analysis,
            format!("Velocity breakout strategy deactivated, {} open position(s) left running", open),
        )
        .await;
        true
    }

    /// Run a cycle now, sharing the timer's in-flight guard. While disabled
    /// the cycle analyzes, narrates and marks positions but never trades.
    pub async fn refresh_now(&self) -> CycleOutcome {
        debug!("Manual refresh requested");
        self.run_cycle().await
    }

    /// Merge a partial config. Takes effect from the next cycle.
    pub async fn update_config(&self, update: StrategyConfigUpdate) -> Result<StrategyConfig, ControlError> {
        let mut config = self.inner.config.write().await;
        let next = config.merged(&update)?;
        *config = next.clone();
        info!(
            "Config updated: equity {:.2}, velocity x{:.2}, volume x{:.2}, RSI {:.0}/{:.0}",
            next.account_equity,
            next.velocity_multiplier,
            next.volume_multiplier,
            next.rsi_lower_threshold,
            next.rsi_upper_threshold
        );
        Ok(next)
    }

    /// Close an open position at its last mark
    pub async fn close_position(&self, id: Uuid) -> Result<ClosedPosition, ControlError> {
        let closed = self
            .inner
            .ledger
            .lock()
            .await
            .close(&id, ExitReason::Manual)
            .ok_or(ControlError::PositionNotFound(id))?;
        self.record_close(&closed).await;
        Ok(closed)
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.inner.in_flight, &self.inner.phase) else {
            debug!("Cycle skipped: previous cycle still in flight");
            return CycleOutcome::Skipped;
        };

        self.set_phase(CyclePhase::Analyzing);
        let config = self.inner.config.read().await.clone();

        let analysis = match timeout(self.inner.settings.analysis_timeout, self.inner.analyzer.analyze(&config)).await {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => return self.analysis_failed(e).await,
            Err(_) => {
                let e = AnalysisError::Unavailable(format!(
                    "timed out after {}s",
                    self.inner.settings.analysis_timeout.as_secs_f64()
                ));
                return self.analysis_failed(e).await;
            }
        };

        self.record_analysis(&config, &analysis).await;

        let Some(signal) = analysis.signal else {
            return CycleOutcome::NoSignal;
        };

        if !config.enabled {
            return self
                .ignore_signal(signal, CommentaryKind::Analysis, "strategy is disabled")
                .await;
        }

        if config.account_equity <= 0.0 {
            return self
                .ignore_signal(signal, CommentaryKind::Risk, "account equity is not set")
                .await;
        }

        let same_side_open = self.inner.ledger.lock().await.has_open_side(signal);
        if same_side_open {
            match config.same_side_policy {
                SameSidePolicy::Pyramid => {}
                SameSidePolicy::Ignore => {
                    return self
                        .ignore_signal(signal, CommentaryKind::Analysis, "a position on that side is already open")
                        .await;
                }
                SameSidePolicy::Reject => {
                    return self
                        .ignore_signal(signal, CommentaryKind::Risk, "pyramiding is disabled")
                        .await;
                }
            }
        }

        self.set_phase(CyclePhase::Executing);
        self.execute_signal(signal, &analysis, config.account_equity).await
    }

    async fn analysis_failed(&self, error: AnalysisError) -> CycleOutcome {
        warn!("Analysis cycle failed: {}", error);
        self.comment(CommentaryKind::Risk, format!("Analysis failed: {}", error)).await;
        CycleOutcome::AnalysisFailed(error)
    }

    async fn ignore_signal(&self, signal: Side, kind: CommentaryKind, reason: &str) -> CycleOutcome {
        info!("{} signal not acted on: {}", signal, reason);
        self.comment(kind, format!("{} signal not executed: {}", signal.to_string().to_uppercase(), reason))
            .await;
        CycleOutcome::SignalIgnored {
            signal,
            reason: reason.to_string(),
        }
    }

    /// Narrate the snapshot, mark open positions and take level exits
    async fn record_analysis(&self, config: &StrategyConfig, analysis: &AnalysisResult) {
        debug!(
            "Analysis: price {:.2} | RSI {:.1} | velocity {:.2}x | volume {:.2}x | signal {:?}",
            analysis.current_price,
            analysis.rsi,
            analysis.velocity.velocity_ratio,
            analysis.velocity.volume_ratio,
            analysis.signal
        );

        {
            let mut log = self.inner.commentary.lock().await;
            for line in &analysis.narration {
                log.append(line.kind, line.message.clone());
            }
        }

        if analysis.current_price <= 0.0 {
            return;
        }

        let exits = {
            let mut ledger = self.inner.ledger.lock().await;
            ledger.mark_all(analysis.current_price);
            if !config.close_on_levels {
                return;
            }

            let mut closed = Vec::new();
            for (id, level, reason) in ledger.level_exits(analysis.current_price) {
                ledger.update_marks(&id, level);
                if let Some(record) = ledger.close(&id, reason) {
                    closed.push(record);
                }
            }
            closed
        };

        for closed in &exits {
            self.record_close(closed).await;
        }
    }

    async fn execute_signal(&self, signal: Side, analysis: &AnalysisResult, equity: f64) -> CycleOutcome {
        info!("Executing {} signal @ {:.2}", signal, analysis.current_price);

        let result = match timeout(
            self.inner.settings.execution_timeout,
            self.inner.executor.execute(signal, analysis, equity),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Connectivity(format!(
                "timed out after {}s",
                self.inner.settings.execution_timeout.as_secs_f64()
            ))),
        };

        let execution = match result {
            Ok(execution) => execution,
            Err(e) => {
                warn!("Execution failed: {}", e);
                self.comment(CommentaryKind::Risk, format!("Trade execution failed: {}", e)).await;
                return CycleOutcome::ExecutionFailed(e);
            }
        };

        let position = execution.position;
        let position_id = position.id;
        let entry = format!(
            "Opened {} {:.2} lots @ {:.2} | SL {:.2} | TP {:.2} (order {})",
            position.side.to_string().to_uppercase(),
            position.lot_size,
            position.entry_price,
            position.stop_loss,
            position.take_profit,
            position.order_id
        );

        self.inner.ledger.lock().await.open(position);
        {
            let mut log = self.inner.commentary.lock().await;
            log.append(CommentaryKind::Entry, entry);
            for line in execution.narration {
                // One entry line per fill
                let kind = match line.kind {
                    CommentaryKind::Entry => CommentaryKind::Analysis,
                    other => other,
                };
                log.append(kind, line.message);
            }
        }
        self.inner.performance.lock().await.record_opened();

        CycleOutcome::Executed { position_id }
    }

    async fn record_close(&self, closed: &ClosedPosition) {
        let position = &closed.position;
        info!(
            "Closed {} {} ({}) @ {:.2}: {:.1} pts ({:.2})",
            position.side, position.id, closed.reason, closed.exit_price, position.pnl_points, position.pnl_amount
        );

        {
            let mut performance = self.inner.performance.lock().await;
            performance.record(closed);
            performance.record_signal_outcome(position.side, closed.realized_direction());
        }

        self.comment(
            CommentaryKind::Exit,
            format!(
                "Closed {} @ {:.2} ({}): {:+.1} pts / {:+.2}",
                position.side.to_string().to_uppercase(),
                closed.exit_price,
                closed.reason,
                position.pnl_points,
                position.pnl_amount
            ),
        )
        .await;
    }

    async fn comment(&self, kind: CommentaryKind, message: impl Into<String>) {
        self.inner.commentary.lock().await.append(kind, message);
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.inner.phase.store(phase as u8, Ordering::Release);
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    pub async fn is_enabled(&self) -> bool {
        self.inner.config.read().await.enabled
    }

    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    pub async fn config(&self) -> StrategyConfig {
        self.inner.config.read().await.clone()
    }

    /// Full feed, or the most recent `limit` entries
    pub async fn commentary(&self, limit: Option<usize>) -> Vec<CommentaryMessage> {
        let log = self.inner.commentary.lock().await;
        match limit {
            Some(n) => log.recent(n).to_vec(),
            None => log.entries().to_vec(),
        }
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        self.inner.ledger.lock().await.open_positions().to_vec()
    }

    pub async fn position(&self, id: Uuid) -> Result<Position, ControlError> {
        self.inner
            .ledger
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(ControlError::PositionNotFound(id))
    }

    pub async fn closed_positions(&self) -> Vec<ClosedPosition> {
        self.inner.ledger.lock().await.closed_positions().iter().cloned().collect()
    }

    /// Percent of account equity at risk to stop across open positions
    pub async fn total_risk_used(&self) -> f64 {
        let equity = self.inner.config.read().await.account_equity;
        self.inner.ledger.lock().await.total_risk_used(equity)
    }

    pub async fn unrealized_pnl(&self) -> f64 {
        self.inner.ledger.lock().await.unrealized_pnl()
    }

    pub async fn metrics(&self) -> PerformanceMetrics {
        self.inner.performance.lock().await.metrics().clone()
    }

    pub async fn status(&self) -> ControllerStatus {
        let config = self.config().await;
        ControllerStatus {
            enabled: config.enabled,
            phase: self.phase(),
            poll_interval_secs: self.inner.settings.poll_interval.as_secs_f64(),
            open_positions: self.inner.ledger.lock().await.open_positions().len(),
            commentary_entries: self.inner.commentary.lock().await.len(),
            config,
        }
    }
}

/// Timer task. Holds only a weak reference so dropping every controller
/// handle ends it. Each tick spawns its own cycle; a busy cycle turns the
/// tick into a no-op instead of delaying the timer.
async fn run_timer(inner: Weak<Inner>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let controller = StrategyController { inner };
        tokio::spawn(async move {
            let outcome = controller.run_cycle().await;
            debug!("Cycle finished: {:?}", outcome);
        });
    }
}
