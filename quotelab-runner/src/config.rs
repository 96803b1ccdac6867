//! TOML session configuration.
//!
//! Every section and field is optional; omitted values take the reference defaults.
//!
//! ```toml
//! [session]
//! name = "sma-quote"
//! quantum_ns = 100000000
//!
//! [strategy]
//! window = 20
//!
//! [lifecycle]
//! policy = "cancel_all"
//!
//! [guards]
//! rate_limit = true
//!
//! [simulator]
//! order_latency_ns = 20000000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quotelab_core::params::{
    GuardParams, LifecycleParams, LoopParams, RateLimitWindow, SimParams, StrategyParams,
    DEFAULT_QUANTUM_NS,
};

/// Unique identifier for a session configuration (content hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub name: String,
    pub quantum_ns: i64,
    pub record_journal: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "sma-quote".to_string(),
            quantum_ns: DEFAULT_QUANTUM_NS,
            record_journal: true,
        }
    }
}

/// Guard switches as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardsConfig {
    pub fat_finger: bool,
    pub fat_finger_pct: f64,
    pub rate_limit: bool,
    /// Windows used when `rate_limit` is on.
    pub rate_limits: Vec<RateLimitWindow>,
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            fat_finger: true,
            fat_finger_pct: 0.05,
            rate_limit: false,
            rate_limits: GuardParams::reference_rate_limit(),
        }
    }
}

impl GuardsConfig {
    pub fn to_params(&self) -> GuardParams {
        GuardParams {
            fat_finger_pct: self.fat_finger.then_some(self.fat_finger_pct),
            rate_limit: self.rate_limit.then(|| self.rate_limits.clone()),
        }
    }
}

/// Complete configuration for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub session: SessionConfig,
    pub strategy: StrategyParams,
    pub lifecycle: LifecycleParams,
    pub guards: GuardsConfig,
    pub simulator: SimParams,
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn loop_params(&self) -> LoopParams {
        LoopParams {
            quantum_ns: self.session.quantum_ns,
            record_journal: self.session.record_journal,
        }
    }

    pub fn guard_params(&self) -> GuardParams {
        self.guards.to_params()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if s.window == 0 {
            return Err(invalid("strategy.window", "must be at least 1"));
        }
        for (field, value) in [
            ("strategy.sell_band", s.sell_band),
            ("strategy.buy_band", s.buy_band),
            ("strategy.sell_offset", s.sell_offset),
            ("strategy.buy_offset", s.buy_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("{value} is not a non-negative number")));
            }
        }
        if !(s.lot.is_finite() && s.lot > 0.0) {
            return Err(invalid("strategy.lot", format!("{} must be positive", s.lot)));
        }

        if self.session.quantum_ns <= 0 {
            return Err(invalid("session.quantum_ns", "must be positive"));
        }
        if self.lifecycle.ack_timeout_ns <= 0 {
            return Err(invalid("lifecycle.ack_timeout_ns", "must be positive"));
        }

        let sim = &self.simulator;
        if !(sim.tick_size.is_finite() && sim.tick_size > 0.0) {
            return Err(invalid("simulator.tick_size", "must be positive"));
        }
        if !(sim.lot_size.is_finite() && sim.lot_size > 0.0) {
            return Err(invalid("simulator.lot_size", "must be positive"));
        }
        if !(sim.maker_fee.is_finite() && sim.maker_fee >= 0.0) {
            return Err(invalid("simulator.maker_fee", "must be non-negative"));
        }
        if !(sim.taker_fee.is_finite() && sim.taker_fee >= 0.0) {
            return Err(invalid("simulator.taker_fee", "must be non-negative"));
        }
        if sim.order_latency_ns < 0 {
            return Err(invalid("simulator.order_latency_ns", "must be non-negative"));
        }

        let g = &self.guards;
        if g.fat_finger && !(g.fat_finger_pct.is_finite() && g.fat_finger_pct > 0.0) {
            return Err(invalid("guards.fat_finger_pct", "must be positive"));
        }
        if g.rate_limit {
            if g.rate_limits.is_empty() {
                return Err(invalid("guards.rate_limits", "no windows configured"));
            }
            if g
                .rate_limits
                .iter()
                .any(|w| w.max_requests == 0 || w.window_ns <= 0)
            {
                return Err(invalid(
                    "guards.rate_limits",
                    "windows need max_requests >= 1 and window_ns > 0",
                ));
            }
        }
        Ok(())
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two sessions with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        // Plain structs with string keys: serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotelab_core::params::ReconcilePolicy;

    #[test]
    fn empty_document_is_the_reference_config() {
        let config = BacktestConfig::from_toml("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.strategy.window, 20);
        assert_eq!(config.loop_params().quantum_ns, 100_000_000);
        assert_eq!(config.guard_params().fat_finger_pct, Some(0.05));
        assert_eq!(config.guard_params().rate_limit, None);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
            [strategy]
            window = 50

            [lifecycle]
            policy = "diff"
            time_in_force = "gtc"

            [guards]
            fat_finger = false
            rate_limit = true
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy.window, 50);
        assert_eq!(config.strategy.lot, 100.0);
        assert_eq!(config.lifecycle.policy, ReconcilePolicy::Diff);
        let guards = config.guard_params();
        assert_eq!(guards.fat_finger_pct, None);
        assert_eq!(guards.rate_limit.map(|w| w.len()), Some(2));
    }

    #[test]
    fn custom_rate_limit_windows() {
        let config = BacktestConfig::from_toml(
            r#"
            [guards]
            rate_limit = true

            [[guards.rate_limits]]
            max_requests = 5
            window_ns = 1000000000
            "#,
        )
        .unwrap();
        assert_eq!(
            config.guard_params().rate_limit,
            Some(vec![RateLimitWindow {
                max_requests: 5,
                window_ns: 1_000_000_000
            }])
        );
    }

    #[test]
    fn rejects_zero_window() {
        let err = BacktestConfig::from_toml("[strategy]\nwindow = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "strategy.window", .. }));
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            ("[strategy]\nlot = 0.0\n", "strategy.lot"),
            ("[strategy]\nsell_band = -0.01\n", "strategy.sell_band"),
            ("[session]\nquantum_ns = 0\n", "session.quantum_ns"),
            ("[simulator]\ntick_size = 0.0\n", "simulator.tick_size"),
            ("[simulator]\nmaker_fee = -0.1\n", "simulator.maker_fee"),
            ("[lifecycle]\nack_timeout_ns = 0\n", "lifecycle.ack_timeout_ns"),
            ("[guards]\nfat_finger_pct = 0.0\n", "guards.fat_finger_pct"),
        ];
        for (doc, expected) in cases {
            match BacktestConfig::from_toml(doc) {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{doc}"),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BacktestConfig::from_toml("[strategy\nwindow = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = BacktestConfig::default();
        let mut b = BacktestConfig::default();
        assert_eq!(a.run_id(), b.run_id());
        assert_eq!(a.run_id().len(), 64);
        b.strategy.sell_band = 0.02;
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = BacktestConfig::default();
        config.session.name = "probe".into();
        config.simulator.order_latency_ns = 5_000_000;
        let text = config.to_toml().unwrap();
        assert_eq!(BacktestConfig::from_toml(&text).unwrap(), config);
    }
}
