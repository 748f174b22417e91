//! Q-learning agent driven by the secure ε-greedy policy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::CryptoEngine;
use crate::environment::{Action, Environment, FrozenLake};
use crate::error::{PprlError, Result};
use crate::indicator::Indicator;
use crate::keys::Identity;
use crate::select::SecureSelectProtocol;
use crate::table::TableSnapshot;
use crate::update::UpdateTuple;
use crate::value_table::ValueTable;

/// Learning hyper-parameters shared by every agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentParams {
    pub epsilon: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub initial_value: f64,
    /// Episode ends as a failure after this many steps (`None`: unbounded).
    pub max_steps_per_episode: Option<usize>,
    pub truncate_places: u32,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            alpha: 0.1,
            gamma: 0.9,
            initial_value: 0.0,
            max_steps_per_episode: Some(100),
            truncate_places: crate::select::DEFAULT_PLACES,
        }
    }
}

/// How an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeEnd {
    Goal,
    Hole,
    StepLimit,
}

/// Output of one agent step.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub tuple: UpdateTuple,
    pub episode_end: Option<EpisodeEnd>,
    pub explored: bool,
}

#[derive(Clone, Debug)]
pub struct Agent {
    index: usize,
    identity: Identity,
    env: Environment,
    table: ValueTable,
    params: AgentParams,
    rng: StdRng,
    steps_in_episode: usize,
    episodes: usize,
    successes: usize,
}

impl Agent {
    pub fn new(index: usize, lake: FrozenLake, params: AgentParams, seed: u64) -> Self {
        let env = Environment::new(lake);
        let table = ValueTable::new(env.num_states(), Action::COUNT, params.initial_value);
        Self {
            index,
            identity: Identity::agent(index),
            env,
            table,
            params,
            rng: StdRng::seed_from_u64(seed),
            steps_in_episode: 0,
            episodes: 0,
            successes: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Secure ε-greedy: a uniform action with probability ε, otherwise the
    /// truncated argmax of the obliviously selected row.
    fn choose_action<E: CryptoEngine>(
        &mut self,
        engine: &E,
        snapshot: &TableSnapshot<E::Ciphertext>,
        state: usize,
    ) -> Result<(Action, bool)> {
        let explore = self.rng.gen::<f64>() < self.params.epsilon;
        let index = if explore {
            self.rng.gen_range(0..Action::COUNT)
        } else {
            let indicator = Indicator::one_hot(self.env.num_states(), state)?;
            SecureSelectProtocol::new(engine, self.params.truncate_places).greedy_action(
                snapshot.rows(),
                &indicator,
                Action::COUNT,
                &self.identity,
                &mut self.rng,
            )?
        };
        let action = Action::from_index(index)
            .ok_or_else(|| PprlError::MalformedIndicator(format!("action index {index}")))?;
        Ok((action, explore))
    }

    /// Sync from the snapshot, act, learn, and emit the update tuple.
    pub fn step<E: CryptoEngine>(
        &mut self,
        engine: &E,
        snapshot: &TableSnapshot<E::Ciphertext>,
    ) -> Result<StepReport> {
        self.table = snapshot.decrypt_raw(engine)?;

        let position = self.env.position();
        let state = self.env.state_index(position);
        let (action, explored) = self.choose_action(engine, snapshot, state)?;
        let outcome = self.env.step(action);
        let next_state = self.env.state_index(outcome.next);
        let q_new = self.table.bellman_update(
            state,
            action.index(),
            outcome.reward,
            next_state,
            self.params.alpha,
            self.params.gamma,
        );

        let tuple = UpdateTuple {
            agent: self.index,
            owner: self.identity.clone(),
            state: Indicator::one_hot(self.env.num_states(), state)?,
            action: Indicator::one_hot(Action::COUNT, action.index())?,
            q_new,
        };

        self.steps_in_episode += 1;
        let episode_end = if outcome.done {
            Some(if self.env.is_goal(outcome.next) {
                EpisodeEnd::Goal
            } else {
                EpisodeEnd::Hole
            })
        } else if self
            .params
            .max_steps_per_episode
            .is_some_and(|cap| self.steps_in_episode >= cap)
        {
            Some(EpisodeEnd::StepLimit)
        } else {
            None
        };
        if let Some(end) = episode_end {
            self.episodes += 1;
            if end == EpisodeEnd::Goal {
                self.successes += 1;
            }
            self.steps_in_episode = 0;
            self.env.reset();
        }

        Ok(StepReport {
            tuple,
            episode_end,
            explored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaintextEngine;
    use crate::environment::GridSize;
    use crate::table::EncryptedTable;

    fn engine() -> PlaintextEngine {
        PlaintextEngine::new(4, &[Identity::aggregator(), Identity::agent(0)])
    }

    #[test]
    fn test_greedy_step_emits_tuple() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(0);
        let mut plain = ValueTable::new(9, 4, 0.0);
        plain.set(0, 1, 2.0); // prefer ↓ at the start
        let table = EncryptedTable::encrypt(&engine, &plain, &Identity::aggregator(), &mut rng).unwrap();

        let params = AgentParams { epsilon: 0.0, ..AgentParams::default() };
        let mut agent = Agent::new(0, GridSize::Three.lake(), params, 7);
        let report = agent.step(&engine, &table.snapshot()).unwrap();

        assert!(!report.explored);
        assert_eq!(report.tuple.state.active(), Some(0));
        assert_eq!(report.tuple.action.active(), Some(Action::Down.index()));
        // 0.9 · 2 + 0.1 · (0 + 0.9 · 0)
        assert!((report.tuple.q_new - 1.8).abs() < 1e-12);
        assert_eq!(report.tuple.owner, Identity::agent(0));
        assert_eq!(report.episode_end, None);
        assert_eq!(agent.environment().position(), crate::environment::Position::new(0, 1));
    }

    #[test]
    fn test_learns_from_untruncated_values() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(0);
        let mut plain = ValueTable::new(9, 4, 0.0);
        plain.set(0, 1, 2.0000049);
        let table = EncryptedTable::encrypt(&engine, &plain, &Identity::aggregator(), &mut rng).unwrap();

        let params = AgentParams { epsilon: 0.0, ..AgentParams::default() };
        let mut agent = Agent::new(0, GridSize::Three.lake(), params, 7);
        let report = agent.step(&engine, &table.snapshot()).unwrap();

        assert_eq!(report.tuple.action.active(), Some(Action::Down.index()));
        // the digit below the fifth place survives into the update
        assert!((report.tuple.q_new - 0.9 * 2.0000049).abs() < 1e-12);
        assert!((report.tuple.q_new - 1.8).abs() > 1e-7);
    }

    #[test]
    fn test_hole_ends_episode() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(0);
        let mut plain = ValueTable::new(9, 4, 0.0);
        plain.set(0, 3, 1.0); // → walks into the hole at (1, 0)
        let table = EncryptedTable::encrypt(&engine, &plain, &Identity::aggregator(), &mut rng).unwrap();
        let params = AgentParams { epsilon: 0.0, ..AgentParams::default() };
        let mut agent = Agent::new(0, GridSize::Three.lake(), params, 7);
        let report = agent.step(&engine, &table.snapshot()).unwrap();
        assert_eq!(report.episode_end, Some(EpisodeEnd::Hole));
        assert_eq!((agent.episodes(), agent.successes()), (1, 0));
        assert_eq!(agent.environment().position(), agent.environment().lake().start());
    }

    #[test]
    fn test_step_limit() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(0);
        // all zeros: greedy ↑ bumps into the wall forever
        let table = EncryptedTable::filled(&engine, 9, 4, 0.0, &Identity::aggregator(), &mut rng).unwrap();
        let params = AgentParams {
            epsilon: 0.0,
            max_steps_per_episode: Some(3),
            ..AgentParams::default()
        };
        let mut agent = Agent::new(0, GridSize::Three.lake(), params, 7);
        let ends: Vec<_> = (0..3)
            .map(|_| agent.step(&engine, &table.snapshot()).unwrap().episode_end)
            .collect();
        assert_eq!(ends, vec![None, None, Some(EpisodeEnd::StepLimit)]);
        assert_eq!(agent.episodes(), 1);
    }

    #[test]
    fn test_exploration_rate() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(0);
        let table = EncryptedTable::filled(&engine, 9, 4, 0.0, &Identity::aggregator(), &mut rng).unwrap();
        let params = AgentParams { epsilon: 1.0, ..AgentParams::default() };
        let mut agent = Agent::new(0, GridSize::Three.lake(), params, 3);
        let snap = table.snapshot();
        assert!((0..20).all(|_| agent.step(&engine, &snap).unwrap().explored));
    }
}
