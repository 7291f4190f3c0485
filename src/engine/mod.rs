pub mod actor;
pub mod manager;
pub mod sequencer;
pub mod session;
pub mod signal;
pub mod simulated;
pub mod strategy;

use crate::config::{Config, StrategyMode};
use simulated::SimulatedStrategy;
use strategy::{LiveStrategy, Strategy};

/// Pick the strategy variant for `config.mode`.
pub fn build_strategy(config: &Config) -> Box<dyn Strategy> {
    let name = config.mode.instance_name();
    match config.mode {
        StrategyMode::Live => Box::new(LiveStrategy::new(name, &config.strategy)),
        StrategyMode::Test => Box::new(SimulatedStrategy::new(name, &config.simulation)),
    }
}
