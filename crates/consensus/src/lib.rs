//! CBC Consensus - message DAG, fork choice and proposer election
//!
//! Architecture:
//! - Every validator keeps its own append-only message store
//! - Fork choice (LMD-GHOST) picks a head from the local store
//! - Proposers are elected from a hash-seeded draw over the head's committee
//! - A simulated network broadcasts messages and replays history to new members

pub mod broadcast;
pub mod error;
pub mod hash;
pub mod leader;
pub mod store;
pub mod ticker;
pub mod types;
pub mod validator;

pub use broadcast::{Network, NetworkStats, Packet};
pub use error::{StoreError, ValidatorError};
pub use hash::{BlockHash, Digest, MessageHash};
pub use leader::{elect_proposer, nominal_proposer, slot_seed};
pub use store::{BlockRecord, MessageRecord, MessageStore};
pub use ticker::Ticker;
pub use types::*;
pub use validator::{Validator, ValidatorBuilder};
