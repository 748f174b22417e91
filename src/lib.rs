//! PPRL ― privacy-preserving multi-agent Q-learning over a multi-key CKKS
//! value table (research prototype)

#![forbid(unsafe_code)]

pub mod modular;
pub mod error;
pub mod params;
pub mod polynomial;
pub mod sampling;
pub mod encoding;
pub mod keys;
pub mod ciphertext;
pub mod scheme;
pub mod algebra;
pub mod refresher;
pub mod engine;
pub mod context;

pub mod environment;
pub mod value_table;
pub mod indicator;
pub mod agent;

pub mod table;
pub mod mask;
pub mod select;
pub mod update;

pub mod config;
pub mod orchestrator;
pub mod report;

pub use agent::{Agent, AgentParams};
pub use algebra::CkksAlgebra;
pub use ciphertext::Ciphertext;
pub use config::{EngineKind, TrainingConfig};
pub use context::CryptoContext;
pub use engine::{CryptoEngine, PlaintextEngine};
pub use environment::{Action, Environment, FrozenLake, GridSize};
pub use error::{CryptoError, PprlError};
pub use keys::Identity;
pub use orchestrator::{Orchestrator, RoundPhase};
pub use params::CkksParameters;
pub use polynomial::RnsPoly;
pub use refresher::Refresher;
pub use scheme::Ckks;
pub use select::SecureSelectProtocol;
pub use table::EncryptedTable;
pub use update::SecureUpdateProtocol;
pub use value_table::ValueTable;
