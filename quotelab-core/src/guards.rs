//! Pre-submit guards.
//!
//! Checks every desired order before it reaches the simulator:
//! - FatFingerGuard: reject limit prices too far beyond the touch
//! - RateLimiter: sliding request windows on the simulated clock
//!
//! A guard rejection is not an error. The lifecycle manager reports it and the
//! order is retried on the next tick if it is still desired.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::domain::{DesiredOrder, Side, Tick};
use crate::params::{GuardParams, RateLimitWindow};

/// Why a guard refused an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GuardRejection {
    /// Limit price beyond the allowed distance from the reference price.
    FatFinger { price: f64, limit: f64 },
    /// No valid book to measure the price against.
    NoReferencePrice,
    /// A rate-limit window is full.
    RateLimited { max_requests: usize, window_ns: i64 },
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardRejection::FatFinger { price, limit } => {
                write!(f, "FatFinger(price={price:.4}, limit={limit:.4})")
            }
            GuardRejection::NoReferencePrice => write!(f, "NoReferencePrice"),
            GuardRejection::RateLimited {
                max_requests,
                window_ns,
            } => write!(f, "RateLimited({max_requests} per {window_ns} ns)"),
        }
    }
}

/// Reject orders priced more than `pct` beyond the touch.
///
/// Buys are measured against `max(best_ask, mid)`, sells against `min(best_bid, mid)`.
#[derive(Debug, Clone)]
pub struct FatFingerGuard {
    pub pct: f64,
}

impl FatFingerGuard {
    pub fn new(pct: f64) -> Self {
        Self { pct }
    }

    pub fn check(&self, order: &DesiredOrder, book: &Tick) -> Result<(), GuardRejection> {
        let valid = |p: f64| p.is_finite() && p > 0.0;
        let mid = book.mid();
        match order.side {
            Side::Buy => {
                let reference = [Some(book.best_ask), mid]
                    .into_iter()
                    .flatten()
                    .filter(|&p| valid(p))
                    .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
                    .ok_or(GuardRejection::NoReferencePrice)?;
                let limit = reference * (1.0 + self.pct);
                if order.limit_price > limit {
                    return Err(GuardRejection::FatFinger {
                        price: order.limit_price,
                        limit,
                    });
                }
            }
            Side::Sell => {
                let reference = [Some(book.best_bid), mid]
                    .into_iter()
                    .flatten()
                    .filter(|&p| valid(p))
                    .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))))
                    .ok_or(GuardRejection::NoReferencePrice)?;
                let limit = reference * (1.0 - self.pct);
                if order.limit_price < limit {
                    return Err(GuardRejection::FatFinger {
                        price: order.limit_price,
                        limit,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct WindowState {
    limit: RateLimitWindow,
    stamps: VecDeque<i64>,
}

/// Sliding-window request limiter.
///
/// A request is admitted only when every window has room; an admitted request
/// is recorded in all of them.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Vec<WindowState>,
}

impl RateLimiter {
    pub fn new(limits: &[RateLimitWindow]) -> Self {
        Self {
            windows: limits
                .iter()
                .map(|&limit| WindowState {
                    limit,
                    stamps: VecDeque::with_capacity(limit.max_requests),
                })
                .collect(),
        }
    }

    /// Admit and record a request at `now_ns`, or report the first full window.
    pub fn try_acquire(&mut self, now_ns: i64) -> Result<(), GuardRejection> {
        for w in &mut self.windows {
            let horizon = now_ns.saturating_sub(w.limit.window_ns);
            while w.stamps.front().is_some_and(|&t| t <= horizon) {
                w.stamps.pop_front();
            }
        }
        if let Some(full) = self
            .windows
            .iter()
            .find(|w| w.stamps.len() >= w.limit.max_requests)
        {
            return Err(GuardRejection::RateLimited {
                max_requests: full.limit.max_requests,
                window_ns: full.limit.window_ns,
            });
        }
        for w in &mut self.windows {
            w.stamps.push_back(now_ns);
        }
        Ok(())
    }

    /// Requests currently counted against each window, in configuration order.
    pub fn in_flight(&self) -> Vec<usize> {
        self.windows.iter().map(|w| w.stamps.len()).collect()
    }
}

/// The guard chain applied before each submission.
#[derive(Debug, Clone, Default)]
pub struct OrderGuards {
    fat_finger: Option<FatFingerGuard>,
    rate_limiter: Option<RateLimiter>,
}

impl OrderGuards {
    pub fn new(params: &GuardParams) -> Self {
        Self {
            fat_finger: params.fat_finger_pct.map(FatFingerGuard::new),
            rate_limiter: params.rate_limit.as_deref().map(RateLimiter::new),
        }
    }

    /// No checks at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Run every guard. Rate-limit capacity is consumed only by admitted orders.
    pub fn admit(
        &mut self,
        order: &DesiredOrder,
        book: &Tick,
        now_ns: i64,
    ) -> Result<(), GuardRejection> {
        if let Some(guard) = &self.fat_finger {
            guard.check(order, book)?;
        }
        if let Some(limiter) = &mut self.rate_limiter {
            limiter.try_acquire(now_ns)?;
        }
        Ok(())
    }
}
