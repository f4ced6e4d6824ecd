//! Simulator Configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Initial committee size
    pub validator_count: usize,
    /// Last slot to simulate (inclusive)
    pub max_slot: u64,
    /// Block heights divisible by this trigger a validator rotation
    pub checkpoint_interval: u64,
    /// Seed for the initial weight draw
    pub seed: u64,
    /// Upper bound for initial weights (drawn from `1..=max_initial_weight`)
    pub max_initial_weight: u64,
    /// Weight given to validators admitted at a checkpoint
    pub rotation_weight: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            validator_count: 4,
            max_slot: 10,
            checkpoint_interval: 5,
            seed: 0,
            max_initial_weight: 100,
            rotation_weight: 100,
        }
    }
}

impl SimulatorConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject configurations the driver cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.validator_count == 0 {
            anyhow::bail!("validator_count must be at least 1");
        }
        if self.max_initial_weight == 0 {
            anyhow::bail!("max_initial_weight must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulatorConfig = serde_json::from_str(r#"{"max_slot": 42}"#).unwrap();
        assert_eq!(config.max_slot, 42);
        assert_eq!(config.validator_count, 4);
        assert_eq!(config.checkpoint_interval, 5);
    }

    #[test]
    fn test_validate() {
        assert!(SimulatorConfig::default().validate().is_ok());
        let empty = SimulatorConfig {
            validator_count: 0,
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{"validator_count": 7, "seed": 9}"#).unwrap();

        let config = SimulatorConfig::from_file(&path).unwrap();
        assert_eq!(config.validator_count, 7);
        assert_eq!(config.seed, 9);
        assert_eq!(config.rotation_weight, 100);
    }
}
