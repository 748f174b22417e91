//! Training run configuration: defaults, JSON file, validation.

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::agent::AgentParams;
use crate::error::{PprlError, Result};
use crate::select::{DEFAULT_PLACES, MAX_PLACES};

/// Which [`CryptoEngine`](crate::engine::CryptoEngine) backs the table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Multi-key CKKS.
    #[default]
    Ckks,
    /// No encryption; non-private baseline.
    Plain,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub agents: usize,
    /// Episodes of agent 0 per trial.
    pub episodes: usize,
    pub trials: usize,
    pub epsilon: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub initial_value: f64,
    pub max_steps_per_episode: Option<usize>,
    pub seed: u64,
    pub truncate_places: u32,
    /// Record the wall time of every secure update.
    pub measure: bool,
    pub engine: EngineKind,
    /// Ring degree exponent of the CKKS parameters (4 slots at 3).
    pub log_n: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let agent = AgentParams::default();
        Self {
            agents: 1,
            episodes: 200,
            trials: 1,
            epsilon: agent.epsilon,
            alpha: agent.alpha,
            gamma: agent.gamma,
            initial_value: agent.initial_value,
            max_steps_per_episode: agent.max_steps_per_episode,
            seed: 0,
            truncate_places: DEFAULT_PLACES,
            measure: false,
            engine: EngineKind::Ckks,
            log_n: 3,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.agents == 0 {
            return Err(PprlError::Config("at least one agent is required".into()));
        }
        if self.episodes == 0 {
            return Err(PprlError::Config("episode budget must be positive".into()));
        }
        if self.trials == 0 {
            return Err(PprlError::Config("at least one trial is required".into()));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(PprlError::Config(format!("epsilon {} is not in [0, 1]", self.epsilon)));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(PprlError::Config(format!("alpha {} is not in (0, 1]", self.alpha)));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PprlError::Config(format!("gamma {} is not in [0, 1]", self.gamma)));
        }
        if self.max_steps_per_episode == Some(0) {
            return Err(PprlError::Config("step cap must be positive".into()));
        }
        if self.log_n == 0 {
            return Err(PprlError::Config("log_n must be positive".into()));
        }
        if self.truncate_places > MAX_PLACES {
            return Err(PprlError::Config(format!(
                "truncate_places {} exceeds {MAX_PLACES}",
                self.truncate_places
            )));
        }
        Ok(())
    }

    pub fn agent_params(&self) -> AgentParams {
        AgentParams {
            epsilon: self.epsilon,
            alpha: self.alpha,
            gamma: self.gamma,
            initial_value: self.initial_value,
            max_steps_per_episode: self.max_steps_per_episode,
            truncate_places: self.truncate_places,
        }
    }

    /// Seed of agent `index`'s RNG.
    pub fn agent_seed(&self, trial: usize, index: usize) -> u64 {
        self.seed
            .wrapping_add((trial as u64).wrapping_mul(1_000_003))
            .wrapping_add(index as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent_params(), AgentParams::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            TrainingConfig { agents: 0, ..TrainingConfig::default() },
            TrainingConfig { episodes: 0, ..TrainingConfig::default() },
            TrainingConfig { trials: 0, ..TrainingConfig::default() },
            TrainingConfig { epsilon: 1.5, ..TrainingConfig::default() },
            TrainingConfig { alpha: 0.0, ..TrainingConfig::default() },
            TrainingConfig { gamma: -0.1, ..TrainingConfig::default() },
            TrainingConfig { epsilon: f64::NAN, ..TrainingConfig::default() },
            TrainingConfig { max_steps_per_episode: Some(0), ..TrainingConfig::default() },
            TrainingConfig { truncate_places: 16, ..TrainingConfig::default() },
            TrainingConfig { truncate_places: 400, ..TrainingConfig::default() },
        ];
        assert!(TrainingConfig { truncate_places: MAX_PLACES, ..TrainingConfig::default() }.validate().is_ok());
        for config in bad {
            assert!(matches!(config.validate(), Err(PprlError::Config(_))), "{config:?}");
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{ "agents": 3, "engine": "plain", "max_steps_per_episode": null }"#).unwrap();
        assert_eq!(config.agents, 3);
        assert_eq!(config.engine, EngineKind::Plain);
        assert_eq!(config.max_steps_per_episode, None);
        assert_eq!(config.gamma, 0.9);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("pprl-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "episodes": 10, "epsilon": 2.0 }"#).unwrap();
        let result = TrainingConfig::from_json_file(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(PprlError::Config(_))));
    }

    #[test]
    fn test_agent_seeds_differ() {
        let config = TrainingConfig::default();
        assert_ne!(config.agent_seed(0, 0), config.agent_seed(0, 1));
        assert_ne!(config.agent_seed(0, 0), config.agent_seed(1, 0));
    }
}
