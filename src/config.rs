//! # config: environment-driven configuration
//!
//! Every knob is a named numeric/boolean option with a default; `.env` is
//! loaded by `main` before [`Config::from_env`] runs.  A value that is set
//! but does not parse fails startup with the variable name in the error.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::engine::session::SessionWindow;
use crate::models::{Direction, Horizon, StopParams};

// ─── Strategy Mode ────────────────────────────────────────────────────────────

/// Which strategy variant the actor drives.  Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMode {
    /// Prediction-driven signals on the live tick stream.
    Live,
    /// Scripted test trade with offline simulation, for UI development.
    Test,
}

impl StrategyMode {
    pub fn instance_name(self) -> &'static str {
        match self {
            StrategyMode::Live => "IPC",
            StrategyMode::Test => "TestStrategy",
        }
    }
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyMode::Live => write!(f, "live"),
            StrategyMode::Test => write!(f, "test"),
        }
    }
}

// ─── Strategy Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// `|predicted - prediction|` must be strictly greater than this.
    pub delta_threshold:       f64,
    pub stops:                 StopParams,
    pub max_position_duration: chrono::Duration,
    /// `None` = session filter disabled.
    pub session:               Option<SessionWindow>,
    /// Only predictions for this horizon may open a position.
    pub trigger_horizon:       Horizon,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            delta_threshold: 500.0,
            stops: StopParams {
                initial_stop_loss_points:   2000.0,
                trailing_activation_offset: 1000.0,
                trailing_stop_distance:     900.0,
            },
            max_position_duration: chrono::Duration::hours(2),
            session: Some(SessionWindow::new_york_morning()),
            trigger_horizon: Horizon::TwoHours,
        }
    }
}

// ─── Simulation Config (test mode) ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfflineWindow {
    /// Delay after OPEN before going dark.
    pub start_delay: Duration,
    pub duration:    Duration,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub entry_delay:    Duration,
    /// Also the position time limit.
    pub exit_delay:     Duration,
    pub direction:      Direction,
    pub stops:          StopParams,
    pub simulate_price: bool,
    pub price_interval: Duration,
    /// `None` = offline simulation disabled.
    pub offline:        Option<OfflineWindow>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            entry_delay:    Duration::from_secs(5),
            exit_delay:     Duration::from_secs(60),
            direction:      Direction::Long,
            stops:          StrategyConfig::default().stops,
            simulate_price: true,
            price_interval: Duration::from_secs(2),
            offline: Some(OfflineWindow {
                start_delay: Duration::from_secs(10),
                duration:    Duration::from_secs(10),
            }),
        }
    }
}

// ─── Prediction Poller ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub url:      String,
    pub interval: Duration,
    pub token:    String,
    pub model:    String,
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:        SocketAddr,
    pub mode:             StrategyMode,
    pub strategy:         StrategyConfig,
    pub simulation:       SimulationConfig,
    pub heartbeat_period: Duration,
    /// Per-observer channel capacity; beyond it messages are dropped.
    pub observer_buffer:  usize,
    /// `None` = no upstream prediction API configured.
    pub poller:           Option<PollerConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mode = match env_or("STRATEGY_MODE", "live").to_lowercase().as_str() {
            "live" => StrategyMode::Live,
            "test" => StrategyMode::Test,
            other  => bail!("Unknown STRATEGY_MODE: '{other}'. Use 'live' or 'test'"),
        };

        let stops = StopParams {
            initial_stop_loss_points:   env_parse("IPC_INITIAL_STOP_LOSS_POINTS", 2000.0)?,
            trailing_activation_offset: env_parse("IPC_TRAILING_ACTIVATION_OFFSET", 1000.0)?,
            trailing_stop_distance:     env_parse("IPC_TRAILING_STOP_DISTANCE", 900.0)?,
        };

        let max_hours: f64 = env_parse("IPC_MAX_POSITION_HOURS", 2.0)?;
        if !(max_hours > 0.0) {
            bail!("IPC_MAX_POSITION_HOURS must be positive, got {max_hours}");
        }

        let session = if env_bool("IPC_SESSION_FILTER", true)? {
            let tz_name = env_or("IPC_SESSION_TZ", "America/New_York");
            let tz = chrono_tz::Tz::from_str(&tz_name)
                .map_err(|e| anyhow::anyhow!("IPC_SESSION_TZ '{tz_name}': {e}"))?;
            let start_hour = env_parse("IPC_SESSION_START_HOUR", 8u32)?;
            let end_hour   = env_parse("IPC_SESSION_END_HOUR", 11u32)?;
            if start_hour >= end_hour || end_hour > 24 {
                bail!("Session window {start_hour}..{end_hour} is empty or out of range");
            }
            Some(SessionWindow::new(tz, start_hour, end_hour))
        } else {
            None
        };

        let trigger_hours: u32 = env_parse("IPC_TRIGGER_HORIZON_HOURS", 2)?;
        let trigger_horizon = Horizon::from_hours(trigger_hours)
            .with_context(|| format!("IPC_TRIGGER_HORIZON_HOURS must be 1, 2 or 4, got {trigger_hours}"))?;

        let strategy = StrategyConfig {
            delta_threshold: env_parse("IPC_DELTA", 500.0)?,
            stops,
            max_position_duration: chrono::Duration::milliseconds((max_hours * 3_600_000.0) as i64),
            session,
            trigger_horizon,
        };

        let direction = match env_or("TEST_DIRECTION", "LONG").to_uppercase().as_str() {
            "LONG"  => Direction::Long,
            "SHORT" => Direction::Short,
            other   => bail!("Unknown TEST_DIRECTION: '{other}'. Use 'LONG' or 'SHORT'"),
        };

        let price_interval: f64 = env_parse("TEST_PRICE_INTERVAL_SECS", 2.0)?;
        if !(price_interval > 0.0) {
            bail!("TEST_PRICE_INTERVAL_SECS must be positive, got {price_interval}");
        }

        let offline = if env_bool("TEST_SIMULATE_OFFLINE", true)? {
            Some(OfflineWindow {
                start_delay: Duration::from_secs_f64(env_parse::<f64>("TEST_OFFLINE_START_SECS", 10.0)?.max(0.0)),
                duration:    Duration::from_secs_f64(env_parse::<f64>("TEST_OFFLINE_DURATION_SECS", 10.0)?.max(0.0)),
            })
        } else {
            None
        };

        let simulation = SimulationConfig {
            entry_delay: Duration::from_secs(env_parse("TEST_ENTRY_DELAY_SECS", 5)?),
            exit_delay:  Duration::from_secs(env_parse("TEST_EXIT_DELAY_SECS", 60)?),
            direction,
            stops,
            simulate_price: env_bool("TEST_SIMULATE_PRICE", true)?,
            price_interval: Duration::from_secs_f64(price_interval),
            offline,
        };

        let poller = match std::env::var("PREDICTION_API_URL") {
            Ok(url) if !url.trim().is_empty() => Some(PollerConfig {
                url,
                interval: Duration::from_secs(env_parse("PREDICTION_POLL_SECS", 30)?),
                token:    env_or("PREDICTION_TOKEN", "BTC"),
                model:    env_or("PREDICTION_MODEL", "v2"),
            }),
            _ => None,
        };

        let bind_addr: SocketAddr = env_or("BIND_ADDR", "0.0.0.0:8765")
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let heartbeat_secs: u64 = env_parse("HEARTBEAT_SECS", 5)?;
        if heartbeat_secs == 0 {
            bail!("HEARTBEAT_SECS must be at least 1");
        }

        Ok(Self {
            bind_addr,
            mode,
            strategy,
            simulation,
            heartbeat_period: Duration::from_secs(heartbeat_secs),
            observer_buffer:  env_parse("OBSERVER_BUFFER", 64usize)?.max(1),
            poller,
        })
    }
}

// ─── Env Helpers ──────────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}='{raw}' is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on"  => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{key}='{raw}' is not a boolean"),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_defaults() {
        let cfg = StrategyConfig::default();
        assert_eq!(cfg.delta_threshold, 500.0);
        assert_eq!(cfg.stops.trailing_stop_distance, 900.0);
        assert_eq!(cfg.max_position_duration, chrono::Duration::hours(2));
        assert_eq!(cfg.trigger_horizon, Horizon::TwoHours);
        assert!(cfg.session.is_some());
    }

    #[test]
    fn test_env_parse_reports_key() {
        std::env::set_var("IPC_TEST_ONLY_BAD_NUMBER", "abc");
        let err = env_parse::<f64>("IPC_TEST_ONLY_BAD_NUMBER", 1.0).unwrap_err();
        assert!(err.to_string().contains("IPC_TEST_ONLY_BAD_NUMBER"));
        std::env::remove_var("IPC_TEST_ONLY_BAD_NUMBER");
    }

    #[test]
    fn test_env_bool_variants() {
        std::env::set_var("IPC_TEST_ONLY_FLAG", "off");
        assert!(!env_bool("IPC_TEST_ONLY_FLAG", true).unwrap());
        std::env::set_var("IPC_TEST_ONLY_FLAG", "maybe");
        assert!(env_bool("IPC_TEST_ONLY_FLAG", true).is_err());
        std::env::remove_var("IPC_TEST_ONLY_FLAG");
        assert!(env_bool("IPC_TEST_ONLY_FLAG", true).unwrap());
    }
}
