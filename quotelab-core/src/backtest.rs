//! The step-driven session loop.
//!
//! Each step, in fixed order:
//! 1. advance the simulator by one quantum (exhausted data finishes the session)
//! 2. read the top of book and check the clock never went backwards
//! 3. SignalEngine → OrderPlanner → OrderLifecycleManager
//! 4. record the simulator snapshot in the StatsAccumulator

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{DesiredOrder, OrderTag};
use crate::lifecycle::{LifecycleError, OrderLifecycleManager, ReconcileReport, Rejection};
use crate::params::{GuardParams, LifecycleParams, LoopParams, StrategyParams};
use crate::planner::OrderPlanner;
use crate::signal::{SignalEngine, SignalKind};
use crate::simulator::MarketSimulator;
use crate::stats::{StatsAccumulator, StatsSummary};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("clock went backwards: {current_ns} ns after {previous_ns} ns")]
    NonMonotonicClock { previous_ns: i64, current_ns: i64 },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Running,
    Finished,
}

/// Journal line for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp_ns: i64,
    /// `None` for ticks without a usable book.
    pub mid: Option<f64>,
    pub average: Option<f64>,
    pub signal: SignalKind,
    pub submitted: Vec<DesiredOrder>,
    pub cancelled: Vec<OrderTag>,
    pub rejections: Vec<Rejection>,
    pub pnl: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub ticks: u64,
    pub submitted: u64,
    pub cancelled: u64,
    pub noop_cancels: u64,
    pub rejected: u64,
    pub ack_timeouts: u64,
}

impl SessionCounters {
    fn absorb(&mut self, report: &ReconcileReport) {
        self.ticks += 1;
        self.submitted += report.submitted.len() as u64;
        self.cancelled += report.cancelled.len() as u64;
        self.noop_cancels += report.noop_cancels.len() as u64;
        self.rejected += report.rejections.len() as u64;
        if report.timed_out() {
            self.ack_timeouts += 1;
        }
    }
}

/// One point of the PnL curve with its running drawdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    pub timestamp_ns: i64,
    pub pnl: f64,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub summary: StatsSummary,
    pub counters: SessionCounters,
    pub pnl_curve: Vec<PnlPoint>,
    pub journal: Vec<TickRecord>,
}

pub struct BacktestLoop {
    signal: SignalEngine,
    planner: OrderPlanner,
    lifecycle: OrderLifecycleManager,
    stats: StatsAccumulator,
    params: LoopParams,
    state: LoopState,
    last_timestamp: Option<i64>,
    counters: SessionCounters,
    journal: Vec<TickRecord>,
}

impl BacktestLoop {
    pub fn new(
        strategy: &StrategyParams,
        lifecycle: &LifecycleParams,
        guards: &GuardParams,
        params: &LoopParams,
    ) -> Self {
        Self {
            signal: SignalEngine::new(strategy),
            planner: OrderPlanner::new(strategy),
            lifecycle: OrderLifecycleManager::new(lifecycle, guards),
            stats: StatsAccumulator::new(params.periods_per_year()),
            params: params.clone(),
            state: LoopState::Running,
            last_timestamp: None,
            counters: SessionCounters::default(),
            journal: Vec::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn journal(&self) -> &[TickRecord] {
        &self.journal
    }

    /// Run one tick. Once `Finished`, further calls are no-ops.
    pub fn step<S>(&mut self, sim: &mut S) -> Result<LoopState, BacktestError>
    where
        S: MarketSimulator + ?Sized,
    {
        if self.state == LoopState::Finished {
            return Ok(LoopState::Finished);
        }
        if !sim.advance(self.params.quantum_ns) {
            self.state = LoopState::Finished;
            return Ok(LoopState::Finished);
        }

        let tick = sim.current_tick();
        if let Some(previous_ns) = self.last_timestamp {
            if tick.timestamp_ns < previous_ns {
                return Err(BacktestError::NonMonotonicClock {
                    previous_ns,
                    current_ns: tick.timestamp_ns,
                });
            }
        }
        self.last_timestamp = Some(tick.timestamp_ns);

        let signal = self.signal.observe_tick(&tick);
        let desired = self.planner.plan(&signal, signal.mid_price);
        let report = self.lifecycle.reconcile(&desired, sim)?;
        let snapshot = sim.snapshot();
        self.stats.record(&snapshot);
        self.counters.absorb(&report);

        debug!(
            tick = self.counters.ticks,
            mid = signal.mid_price,
            signal = ?signal.kind,
            submitted = report.submitted.len(),
            pnl = snapshot.pnl,
            "step"
        );

        if self.params.record_journal {
            self.journal.push(TickRecord {
                timestamp_ns: tick.timestamp_ns,
                mid: signal.mid_price.is_finite().then_some(signal.mid_price),
                average: signal.average.is_finite().then_some(signal.average),
                signal: signal.kind,
                submitted: report.submitted,
                cancelled: report.cancelled,
                rejections: report.rejections,
                pnl: snapshot.pnl,
            });
        }
        Ok(LoopState::Running)
    }

    /// Step until the simulator runs out of data.
    pub fn run<S>(&mut self, sim: &mut S) -> Result<SessionResult, BacktestError>
    where
        S: MarketSimulator + ?Sized,
    {
        info!(quantum_ns = self.params.quantum_ns, "session started");
        while self.step(sim)? == LoopState::Running {}
        let result = self.result();
        info!(
            ticks = result.counters.ticks,
            total_pnl = result.summary.total_pnl,
            sharpe = result.summary.sharpe,
            max_drawdown = result.summary.max_drawdown,
            "session finished"
        );
        Ok(result)
    }

    /// Snapshot of the session so far.
    pub fn result(&self) -> SessionResult {
        let drawdowns = self.stats.drawdown_series();
        let pnl_curve = self
            .stats
            .timestamps()
            .iter()
            .zip(self.stats.pnl_series())
            .zip(drawdowns)
            .map(|((&timestamp_ns, &pnl), drawdown)| PnlPoint {
                timestamp_ns,
                pnl,
                drawdown,
            })
            .collect();
        SessionResult {
            summary: self.stats.summary(),
            counters: self.counters,
            pnl_curve,
            journal: self.journal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LiveOrders, SimSnapshot, Tick, TimeInForce};
    use crate::params::SimParams;
    use crate::simulator::{CancelOutcome, OrderAck, ReplaySimulator, SimError};

    const Q: i64 = 100_000_000;

    fn default_loop() -> BacktestLoop {
        BacktestLoop::new(
            &StrategyParams::default(),
            &LifecycleParams::default(),
            &GuardParams::default(),
            &LoopParams::default(),
        )
    }

    fn flat_ticks(n: usize, mid: f64) -> Vec<Tick> {
        (0..n)
            .map(|i| Tick::new(i as i64 * Q, mid - 0.25, mid + 0.25, 10.0))
            .collect()
    }

    /// Venue whose clock jumps backwards on the third step.
    struct RewindingVenue {
        steps: usize,
    }

    impl MarketSimulator for RewindingVenue {
        fn advance(&mut self, _quantum_ns: i64) -> bool {
            self.steps += 1;
            true
        }
        fn now(&self) -> i64 {
            if self.steps >= 3 {
                0
            } else {
                self.steps as i64 * Q
            }
        }
        fn best_bid(&self) -> f64 {
            99.75
        }
        fn best_ask(&self) -> f64 {
            100.25
        }
        fn traded_volume(&self) -> f64 {
            0.0
        }
        fn live_orders(&self) -> LiveOrders {
            LiveOrders::default()
        }
        fn cancel(&mut self, _tag: OrderTag) -> Result<CancelOutcome, SimError> {
            Ok(CancelOutcome::NotFound)
        }
        fn submit(&mut self, _order: &DesiredOrder, _tif: TimeInForce) -> Result<(), SimError> {
            Ok(())
        }
        fn await_ack(&mut self, _tag: OrderTag, _timeout_ns: i64) -> Result<OrderAck, SimError> {
            Ok(OrderAck::Accepted)
        }
        fn snapshot(&self) -> SimSnapshot {
            SimSnapshot::default()
        }
    }

    #[test]
    fn runs_until_data_is_exhausted() {
        let mut sim = ReplaySimulator::new(flat_ticks(5, 100.0), &SimParams::default());
        let mut bt = default_loop();
        let result = bt.run(&mut sim).unwrap();
        assert_eq!(bt.state(), LoopState::Finished);
        assert_eq!(result.counters.ticks, 5);
        assert_eq!(result.journal.len(), 5);
        assert_eq!(result.pnl_curve.len(), 5);
        assert_eq!(bt.step(&mut sim).unwrap(), LoopState::Finished);
    }

    #[test]
    fn empty_data_finishes_on_first_step() {
        let mut sim = ReplaySimulator::new(Vec::new(), &SimParams::default());
        let mut bt = default_loop();
        assert_eq!(bt.step(&mut sim).unwrap(), LoopState::Finished);
        assert_eq!(bt.stats().len(), 0);
    }

    #[test]
    fn journal_can_be_disabled() {
        let mut sim = ReplaySimulator::new(flat_ticks(3, 100.0), &SimParams::default());
        let mut bt = BacktestLoop::new(
            &StrategyParams::default(),
            &LifecycleParams::default(),
            &GuardParams::default(),
            &LoopParams {
                record_journal: false,
                ..LoopParams::default()
            },
        );
        let result = bt.run(&mut sim).unwrap();
        assert!(result.journal.is_empty());
        assert_eq!(result.counters.ticks, 3);
    }

    #[test]
    fn backwards_clock_is_fatal() {
        let mut bt = default_loop();
        let mut venue = RewindingVenue { steps: 0 };
        let err = bt.run(&mut venue).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::NonMonotonicClock {
                previous_ns,
                current_ns: 0
            } if previous_ns == 2 * Q
        ));
    }

    #[test]
    fn spike_produces_one_sell_and_journal_entry() {
        let mut ticks = flat_ticks(20, 100.0);
        ticks.push(Tick::new(20 * Q, 109.75, 110.25, 10.0));
        let mut sim = ReplaySimulator::new(ticks, &SimParams::default());
        let mut bt = default_loop();
        let result = bt.run(&mut sim).unwrap();
        assert_eq!(result.counters.submitted, 1);
        let last = result.journal.last().unwrap();
        assert_eq!(last.signal, SignalKind::Sell);
        assert!((last.submitted[0].limit_price - 110.0 * 0.999).abs() < 1e-9);
    }
}
