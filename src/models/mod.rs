//! Domain models shared across the engine, the feeds and the routes.

pub mod position;
pub mod prediction;
pub mod state;
pub mod tick;

pub use position::{Direction, Position, StopParams};
pub use prediction::{Horizon, Prediction};
pub use state::StrategyState;
pub use tick::Tick;
