//! CBC Casper Simulator
//!
//! Drives a committee of validators slot by slot: hash-seeded proposer
//! election, message authoring, checkpoint rotation, broadcast and delivery.

pub mod config;
pub mod runner;

pub use config::SimulatorConfig;
pub use runner::{RoundSnapshot, Rotation, SimulationError, Simulator};
