//! Round driver - one proposal, broadcast and delivery per slot
//!
//! Each call to [`Simulator::step`] runs a full slot:
//! 1. elect the proposer from every validator's local view
//! 2. the proposer authors a message on its head
//! 3. at checkpoints the earliest-joined member is swapped for a new one
//! 4. the block is stamped with the network's committee
//! 5. the proposer stores its own message and broadcasts it
//! 6. every member drains its packets into its store
//! 7. the clock advances

use crate::config::SimulatorConfig;
use cbc_consensus::{
    elect_proposer, Block, BlockHash, Member, Message, MessageHash, Network, Slot, StoreError,
    Ticker, Validator, ValidatorBuilder, ValidatorError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::iter::FusedIterator;
use thiserror::Error;

/// Fatal simulation errors. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("no block proposer for slot {slot}")]
    NoProposerFound { slot: Slot },

    #[error("{validator} rejected a message at slot {slot}: {source}")]
    MessageRejected {
        validator: String,
        slot: Slot,
        #[source]
        source: ValidatorError,
    },

    #[error("fork choice failed at slot {slot}: {source}")]
    Estimate {
        slot: Slot,
        #[source]
        source: StoreError,
    },

    #[error("validator {0} is not part of the simulation")]
    UnknownValidator(String),

    #[error("failed to seed validator: {0}")]
    Setup(#[from] StoreError),
}

/// Membership change performed at a checkpoint
#[derive(Debug, Clone, Serialize)]
pub struct Rotation {
    pub evicted: Member,
    pub admitted: Member,
}

/// What happened during one slot
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub slot: Slot,
    pub proposer: Member,
    pub message: MessageHash,
    pub block: BlockHash,
    pub height: u64,
    pub rotation: Option<Rotation>,
    /// Committee after the slot, earliest joined first
    pub committee: Vec<Member>,
    /// Packets delivered to validators this slot
    pub delivered: usize,
}

/// Broadcast-and-receive simulation over a rotating committee
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    ticker: Ticker,
    network: Network,
    /// Handed to validators admitted mid-run
    genesis: Message,
    halted: bool,
}

impl Simulator {
    /// Build the initial committee with seeded random weights and a shared genesis
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulationError> {
        let ticker = Ticker::new();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let max_weight = config.max_initial_weight.max(1);

        let builders: Vec<ValidatorBuilder> = (0..config.validator_count)
            .map(|i| {
                ValidatorBuilder::new(format!("v{}", i))
                    .weight(rng.gen_range(1..=max_weight))
                    .ticker(ticker.clone())
            })
            .collect();
        let members: Vec<Member> = builders.iter().map(ValidatorBuilder::member).collect();

        let author = members
            .first()
            .cloned()
            .ok_or_else(|| SimulationError::UnknownValidator("v0".to_string()))?;
        let genesis = Message::new(author.clone(), Block::genesis(author.id, members.clone()), vec![]);

        let validators = builders
            .into_iter()
            .map(|b| b.build(genesis.clone()))
            .collect::<Result<Vec<Validator>, StoreError>>()?;

        tracing::info!(
            "Simulation initialized: {} validators, max slot {}, checkpoint every {} blocks",
            validators.len(),
            config.max_slot,
            config.checkpoint_interval
        );
        for m in &members {
            tracing::debug!("  {} weight {} id {}", m.name, m.weight, m.id.short());
        }

        Ok(Self {
            network: Network::new(validators, ticker.clone()),
            config,
            ticker,
            genesis,
            halted: false,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn current_slot(&self) -> Slot {
        self.ticker.current()
    }

    /// The genesis message every validator started from
    pub fn genesis(&self) -> &Message {
        &self.genesis
    }

    /// Run one slot. `Ok(None)` once the last slot has been simulated.
    pub fn step(&mut self) -> Result<Option<RoundSnapshot>, SimulationError> {
        let slot = self.ticker.current();
        if slot > self.config.max_slot {
            return Ok(None);
        }

        let proposer = elect_proposer(slot, self.network.validators())
            .map_err(|source| SimulationError::Estimate { slot, source })?
            .ok_or(SimulationError::NoProposerFound { slot })?;
        let sender = proposer.member().clone();
        let draft = proposer
            .create_message()
            .map_err(|source| SimulationError::Estimate { slot, source })?;

        // Rotation happens after authoring and before the committee is stamped.
        let mut retired = None;
        let mut rotation = None;
        if draft.estimate.is_checkpoint(self.config.checkpoint_interval) {
            let (evicted, admitted) = self.rotate(slot)?;
            rotation = Some(Rotation {
                evicted: evicted.member().clone(),
                admitted,
            });
            retired = Some(evicted);
        }

        let message = draft.with_active_validators(self.network.all());

        // An evicted proposer still records its own message before it is dropped.
        let own = match self.network.validator_mut(&sender.id) {
            Some(validator) => validator,
            None => retired
                .as_mut()
                .filter(|v| v.id() == sender.id)
                .ok_or_else(|| SimulationError::UnknownValidator(sender.name.clone()))?,
        };
        own.add_message(message.clone())
            .map_err(|source| SimulationError::MessageRejected {
                validator: sender.name.clone(),
                slot,
                source,
            })?;

        self.network.broadcast(&message, &sender);
        let delivered = self.deliver_all(slot)?;

        tracing::info!(
            "Slot {}: {} proposed height {} ({}), {} packets delivered",
            slot,
            sender.name,
            message.estimate.height,
            message.estimate.hash.digest().short(),
            delivered
        );

        self.ticker.tick();

        Ok(Some(RoundSnapshot {
            slot,
            proposer: sender,
            message: message.hash,
            block: message.estimate.hash,
            height: message.estimate.height,
            rotation,
            committee: self.network.all(),
            delivered,
        }))
    }

    /// Drive the simulation to the end, stopping at the first error
    pub fn run(&mut self) -> Result<Vec<RoundSnapshot>, SimulationError> {
        self.by_ref().collect()
    }

    /// Evict the earliest-joined member and admit `nv<slot>`
    fn rotate(&mut self, slot: Slot) -> Result<(Validator, Member), SimulationError> {
        let oldest = self
            .network
            .oldest()
            .map(|v| v.member().clone())
            .ok_or_else(|| SimulationError::UnknownValidator("<empty committee>".to_string()))?;
        let evicted = self
            .network
            .exit(&oldest)
            .ok_or_else(|| SimulationError::UnknownValidator(oldest.name.clone()))?;

        let newcomer = ValidatorBuilder::new(format!("nv{}", slot))
            .weight(self.config.rotation_weight)
            .ticker(self.ticker.clone())
            .build(self.genesis.clone())?;
        let admitted = newcomer.member().clone();
        self.network.join(newcomer);

        tracing::info!(
            "Checkpoint at slot {}: {} replaced by {}",
            slot,
            oldest.name,
            admitted.name
        );
        Ok((evicted, admitted))
    }

    /// Every member stores every packet ready for it
    fn deliver_all(&mut self, slot: Slot) -> Result<usize, SimulationError> {
        let mut delivered = 0;
        for member in self.network.all() {
            let packets = self.network.receive(&member);
            let receiver = self
                .network
                .validator_mut(&member.id)
                .ok_or_else(|| SimulationError::UnknownValidator(member.name.clone()))?;

            for packet in packets {
                receiver
                    .add_message(packet.message)
                    .map_err(|source| SimulationError::MessageRejected {
                        validator: member.name.clone(),
                        slot,
                        source,
                    })?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

impl Iterator for Simulator {
    type Item = Result<RoundSnapshot, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        match self.step() {
            Ok(Some(snapshot)) => Some(Ok(snapshot)),
            Ok(None) => {
                self.halted = true;
                None
            }
            Err(e) => {
                tracing::error!("Simulation aborted: {}", e);
                self.halted = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Simulator {}
