//! Round-synchronized training: agents step in parallel against a frozen
//! snapshot, then their updates are applied one by one in agent order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::agent::{Agent, EpisodeEnd, StepReport};
use crate::config::TrainingConfig;
use crate::engine::CryptoEngine;
use crate::environment::{Action, Environment, FrozenLake, Position};
use crate::error::{PprlError, Result};
use crate::indicator::Indicator;
use crate::keys::Identity;
use crate::select::SecureSelectProtocol;
use crate::table::EncryptedTable;
use crate::update::{SecureUpdateProtocol, UpdateTuple};
use crate::value_table::ValueTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    Dispatch,
    AwaitActions,
    SerializeUpdates,
    Advance,
}

/// Agent 0's success rate after its `episode`-th episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeRecord {
    pub episode: usize,
    pub success_rate: f64,
}

/// Success rate pooled over all agents after a round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundRecord {
    pub round: usize,
    pub success_rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoundOutcome {
    pub round: usize,
    /// Agent indices in the order their updates hit the table.
    pub applied: Vec<usize>,
    /// Agents whose episode ended this round.
    pub finished: Vec<(usize, EpisodeEnd)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingSummary {
    pub count: usize,
    pub mean: Duration,
}

impl TimingSummary {
    pub fn of(times: &[Duration]) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        let total: Duration = times.iter().sum();
        Some(Self {
            count: times.len(),
            mean: total / times.len() as u32,
        })
    }
}

/// The aggregator: sole owner of the encrypted table.
pub struct Orchestrator<E: CryptoEngine> {
    engine: Arc<E>,
    table: EncryptedTable<E::Ciphertext>,
    agents: Vec<Agent>,
    rng: StdRng,
    phase: RoundPhase,
    round: usize,
    measure: bool,
    update_times: Vec<Duration>,
}

/// The aggregator identity followed by one identity per agent.
pub fn identities(agents: usize) -> Vec<Identity> {
    std::iter::once(Identity::aggregator())
        .chain((0..agents).map(Identity::agent))
        .collect()
}

impl<E: CryptoEngine> Orchestrator<E> {
    /// Fresh agents and a table filled with the initial value under the
    /// aggregator's key.
    pub fn new(engine: Arc<E>, lake: &FrozenLake, config: &TrainingConfig, trial: usize) -> Result<Self> {
        config.validate()?;
        let params = config.agent_params();
        let agents: Vec<Agent> = (0..config.agents)
            .map(|i| Agent::new(i, lake.clone(), params, config.agent_seed(trial, i)))
            .collect();
        let mut rng = StdRng::seed_from_u64(config.seed ^ 0x5eed_0000 ^ trial as u64);
        let table = EncryptedTable::filled(
            &*engine,
            lake.width() * lake.height(),
            Action::COUNT,
            config.initial_value,
            &Identity::aggregator(),
            &mut rng,
        )?;
        Ok(Self {
            engine,
            table,
            agents,
            rng,
            phase: RoundPhase::Advance,
            round: 0,
            measure: config.measure,
            update_times: Vec::new(),
        })
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn table(&self) -> &EncryptedTable<E::Ciphertext> {
        &self.table
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn update_times(&self) -> &[Duration] {
        &self.update_times
    }

    /// Successes over episodes, summed across agents.
    pub fn pooled_success_rate(&self) -> f64 {
        let (wins, total) = self
            .agents
            .iter()
            .fold((0, 0), |(w, t), a| (w + a.successes(), t + a.episodes()));
        if total == 0 {
            0.0
        } else {
            wins as f64 / total as f64
        }
    }

    fn enter(&mut self, phase: RoundPhase) {
        debug!(round = self.round, ?phase, "round phase");
        self.phase = phase;
    }

    /// One full round: every agent steps once, then all updates are applied.
    pub fn run_round(&mut self) -> Result<RoundOutcome> {
        self.enter(RoundPhase::Dispatch);
        let snapshot = self.table.snapshot();
        let engine = &*self.engine;
        // collect returns only once every agent has reported
        let reports = self
            .agents
            .par_iter_mut()
            .map(|agent| agent.step(engine, &snapshot))
            .collect::<Result<Vec<StepReport>>>();

        self.enter(RoundPhase::AwaitActions);
        let reports = reports?;

        self.enter(RoundPhase::SerializeUpdates);
        let tuples: Vec<UpdateTuple> = reports.iter().map(|r| r.tuple.clone()).collect();
        let applied = self.serialize_updates(&tuples)?;

        self.enter(RoundPhase::Advance);
        let finished = reports
            .iter()
            .filter_map(|r| r.episode_end.map(|end| (r.tuple.agent, end)))
            .collect();
        let outcome = RoundOutcome {
            round: self.round,
            applied,
            finished,
        };
        self.round += 1;
        Ok(outcome)
    }

    /// Apply `tuples` to the table one at a time in agent-index order.
    ///
    /// Each update sees the table as left by the previous one, so the
    /// higher agent index wins when two agents write the same cell.
    pub fn serialize_updates(&mut self, tuples: &[UpdateTuple]) -> Result<Vec<usize>> {
        let mut ordered: Vec<&UpdateTuple> = tuples.iter().collect();
        ordered.sort_by_key(|t| t.agent);

        let protocol = SecureUpdateProtocol::new(&*self.engine);
        let mut applied = Vec::with_capacity(ordered.len());
        for tuple in ordered {
            let start = Instant::now();
            protocol.apply(&mut self.table, tuple, &mut self.rng)?;
            if self.measure {
                self.update_times.push(start.elapsed());
            }
            applied.push(tuple.agent);
        }
        Ok(applied)
    }

    pub fn decrypt_table(&self, places: u32) -> Result<ValueTable> {
        self.table.decrypt(&*self.engine, places)
    }
}

/// Greedy walk from the start using the secure select protocol.
///
/// Returns the visited positions, start included.
pub fn greedy_rollout<E, R>(
    engine: &E,
    table: &EncryptedTable<E::Ciphertext>,
    lake: &FrozenLake,
    owner: &Identity,
    places: u32,
    max_steps: usize,
    rng: &mut R,
) -> Result<Vec<Position>>
where
    E: CryptoEngine,
    R: Rng,
{
    let mut env = Environment::new(lake.clone());
    let select = SecureSelectProtocol::new(engine, places);
    let mut path = vec![env.position()];
    for _ in 0..max_steps {
        let state = Indicator::one_hot(env.num_states(), env.state_index(env.position()))?;
        let index = select.greedy_action(table.rows(), &state, table.num_actions(), owner, rng)?;
        let action = Action::from_index(index)
            .ok_or_else(|| PprlError::MalformedIndicator(format!("action index {index}")))?;
        let outcome = env.step(action);
        path.push(outcome.next);
        if outcome.done {
            break;
        }
    }
    Ok(path)
}

/// Everything one training run produced.
#[derive(Clone, Debug)]
pub struct TrialResult {
    pub trial: usize,
    pub episodes: Vec<EpisodeRecord>,
    pub rounds: Vec<RoundRecord>,
    pub update_times: Vec<Duration>,
    pub table: ValueTable,
    pub path: Vec<Position>,
}

#[derive(Clone, Debug)]
pub struct TrainingSummary {
    pub trials: Vec<TrialResult>,
    /// Per-episode success rate averaged over trials.
    pub average: Vec<EpisodeRecord>,
    pub timing: Option<TimingSummary>,
}

/// Train until agent 0 has finished `config.episodes` episodes.
pub fn train_trial<E: CryptoEngine>(
    engine: Arc<E>,
    lake: &FrozenLake,
    config: &TrainingConfig,
    trial: usize,
) -> Result<TrialResult> {
    let mut orchestrator = Orchestrator::new(engine, lake, config, trial)?;
    let report_every = (config.episodes / 20).max(1);
    let started = Instant::now();
    let mut episodes = Vec::with_capacity(config.episodes);
    let mut rounds = Vec::new();

    while orchestrator.agents()[0].episodes() < config.episodes {
        let outcome = orchestrator.run_round()?;
        rounds.push(RoundRecord {
            round: outcome.round,
            success_rate: orchestrator.pooled_success_rate(),
        });
        if !outcome.finished.iter().any(|&(agent, _)| agent == 0) {
            continue;
        }

        let lead = &orchestrator.agents()[0];
        let record = EpisodeRecord {
            episode: lead.episodes(),
            success_rate: lead.successes() as f64 / lead.episodes() as f64,
        };
        episodes.push(record);
        if record.episode % report_every == 0 || record.episode == config.episodes {
            let per_episode = started.elapsed().as_secs_f64() / record.episode as f64;
            let eta = per_episode * (config.episodes - record.episode) as f64;
            info!(
                trial,
                episode = record.episode,
                budget = config.episodes,
                success_rate = record.success_rate,
                rounds = orchestrator.round(),
                eta_secs = eta,
                "training progress"
            );
        }
    }

    let table = orchestrator.decrypt_table(config.truncate_places)?;
    let mut rng = StdRng::seed_from_u64(config.seed ^ trial as u64);
    let path = greedy_rollout(
        &**orchestrator.engine(),
        orchestrator.table(),
        lake,
        &Identity::agent(0),
        config.truncate_places,
        lake.width() * lake.height(),
        &mut rng,
    )?;

    Ok(TrialResult {
        trial,
        episodes,
        rounds,
        update_times: orchestrator.update_times().to_vec(),
        table,
        path,
    })
}

/// Mean success rate per episode across trials.
pub fn average_success(trials: &[TrialResult]) -> Vec<EpisodeRecord> {
    let len = trials.iter().map(|t| t.episodes.len()).min().unwrap_or(0);
    (0..len)
        .map(|e| EpisodeRecord {
            episode: e + 1,
            success_rate: trials.iter().map(|t| t.episodes[e].success_rate).sum::<f64>() / trials.len() as f64,
        })
        .collect()
}

/// Run `config.trials` independent trials over one shared engine.
pub fn run_training<E: CryptoEngine>(
    engine: Arc<E>,
    lake: &FrozenLake,
    config: &TrainingConfig,
) -> Result<TrainingSummary> {
    config.validate()?;
    info!(
        agents = config.agents,
        episodes = config.episodes,
        trials = config.trials,
        width = lake.width(),
        height = lake.height(),
        "training started"
    );
    let trials = (0..config.trials)
        .into_par_iter()
        .map(|trial| train_trial(Arc::clone(&engine), lake, config, trial))
        .collect::<Result<Vec<_>>>()?;

    let all_times: Vec<Duration> = trials.iter().flat_map(|t| t.update_times.iter().copied()).collect();
    let timing = TimingSummary::of(&all_times);
    if let Some(t) = timing {
        info!(updates = t.count, mean_ms = t.mean.as_secs_f64() * 1000.0, "secure update timing");
    }
    let average = average_success(&trials);
    Ok(TrainingSummary { trials, average, timing })
}
