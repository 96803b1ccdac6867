//! End-to-end sessions through the replay simulator.

use quotelab_core::backtest::BacktestError;
use quotelab_core::domain::{Side, Tick};
use quotelab_core::lifecycle::LifecycleError;
use quotelab_core::params::ReconcilePolicy;
use quotelab_core::signal::SignalKind;
use quotelab_core::simulator::ReplaySimulator;
use quotelab_core::{
    BacktestLoop, GuardParams, LifecycleParams, LoopParams, SessionResult, SimParams,
    StrategyParams,
};

const Q: i64 = 100_000_000;

fn tick_at(i: usize, mid: f64, volume: f64) -> Tick {
    Tick::new(i as i64 * Q, mid - 0.25, mid + 0.25, volume)
}

fn session(ticks: Vec<Tick>, sim: SimParams, lifecycle: LifecycleParams) -> Result<SessionResult, BacktestError> {
    let mut sim = ReplaySimulator::new(ticks, &sim);
    let mut bt = BacktestLoop::new(
        &StrategyParams::default(),
        &lifecycle,
        &GuardParams::default(),
        &LoopParams::default(),
    );
    bt.run(&mut sim)
}

/// 20 ticks at 100.0, then a linear ramp 100.0 → 110.0 over 25 ticks.
fn warmup_then_ramp(volume: f64) -> Vec<Tick> {
    let mut ticks: Vec<Tick> = (0..20).map(|i| tick_at(i, 100.0, volume)).collect();
    for k in 0..25 {
        let mid = 100.0 + 10.0 * k as f64 / 24.0;
        ticks.push(tick_at(20 + k, mid, volume));
    }
    ticks
}

#[test]
fn constant_mid_never_trades() {
    let ticks = (0..25).map(|i| tick_at(i, 100.0, 5.0)).collect();
    let result = session(ticks, SimParams::default(), LifecycleParams::default()).unwrap();

    assert_eq!(result.counters.ticks, 25);
    assert!(result.journal.iter().all(|r| r.signal == SignalKind::Hold));
    assert_eq!(result.counters.submitted, 0);
    assert_eq!(result.counters.cancelled, 0);
    assert!(result.pnl_curve.iter().all(|p| p.pnl == 0.0));
    assert_eq!(result.summary.total_pnl, 0.0);
    assert_eq!(result.summary.max_drawdown, 0.0);
    assert_eq!(result.summary.sharpe, 0.0);
}

#[test]
fn ramp_submits_one_sell_per_sell_tick() {
    let result = session(warmup_then_ramp(0.0), SimParams::default(), LifecycleParams::default())
        .unwrap();

    let sell_ticks = result
        .journal
        .iter()
        .filter(|r| r.signal == SignalKind::Sell)
        .count();
    assert!(sell_ticks > 0);
    assert_eq!(result.counters.submitted, sell_ticks as u64);

    for record in &result.journal {
        match record.signal {
            SignalKind::Sell => {
                assert_eq!(record.submitted.len(), 1);
                let order = record.submitted[0];
                assert_eq!(order.side, Side::Sell);
                assert_eq!(order.quantity, 100.0);
                let (mid, average) = (record.mid.unwrap(), record.average.unwrap());
                assert!((order.limit_price - mid * 0.999).abs() < 1e-9);
                assert!(mid > average * 1.01);
            }
            SignalKind::Hold => assert!(record.submitted.is_empty()),
            SignalKind::Buy => panic!("ramp must not produce a buy"),
        }
    }

    // once the signal turns Sell it stays Sell for the rest of the ramp
    let first_sell = result
        .journal
        .iter()
        .position(|r| r.signal == SignalKind::Sell)
        .unwrap();
    assert!(result.journal[first_sell..]
        .iter()
        .all(|r| r.signal == SignalKind::Sell));
    // every resubmission after the first replaced the previous quote
    assert_eq!(result.counters.cancelled, sell_ticks as u64 - 1);
    assert!(result.journal.iter().all(|r| r.rejections.is_empty()));
}

#[test]
fn diff_policy_reprices_on_the_ramp() {
    let lifecycle = LifecycleParams {
        policy: ReconcilePolicy::Diff,
        ..LifecycleParams::default()
    };
    let result = session(warmup_then_ramp(0.0), SimParams::default(), lifecycle).unwrap();
    let sell_ticks = result
        .journal
        .iter()
        .filter(|r| r.signal == SignalKind::Sell)
        .count() as u64;
    // the mid moves every tick, so every Sell tick is a new price
    assert_eq!(result.counters.submitted, sell_ticks);
    assert_eq!(result.counters.cancelled, sell_ticks - 1);
}

#[test]
fn rising_market_fills_resting_sells() {
    let result = session(warmup_then_ramp(1_000.0), SimParams::default(), LifecycleParams::default())
        .unwrap();
    assert!(result.summary.fills > 0);
    assert!(result.summary.final_position < 0.0);
    assert!(result.summary.fees_paid > 0.0);
    assert!(result.summary.max_drawdown >= 0.0);
}

#[test]
fn slow_acknowledgements_are_not_fatal_below_the_threshold() {
    let sim = SimParams {
        order_latency_ns: 15 * Q,
        ..SimParams::default()
    };
    let mut ticks = warmup_then_ramp(0.0);
    for k in 0..40 {
        ticks.push(tick_at(45 + k, 110.0, 0.0));
    }
    // each submission times out once and is acknowledged on the following tick
    let result = session(ticks, sim, LifecycleParams::default()).unwrap();
    assert!(result.counters.ack_timeouts >= 2);
}

#[test]
fn stalled_acknowledgements_abort_the_session() {
    let sim = SimParams {
        order_latency_ns: 60 * Q,
        ..SimParams::default()
    };
    let mut ticks: Vec<Tick> = (0..20).map(|i| tick_at(i, 100.0, 0.0)).collect();
    for k in 0..40 {
        ticks.push(tick_at(20 + k, 110.0, 0.0));
    }
    let err = session(ticks, sim, LifecycleParams::default()).unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Lifecycle(LifecycleError::AckStalled { ticks: 3, .. })
    ));
}
