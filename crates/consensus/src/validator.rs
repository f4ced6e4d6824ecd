//! Validator node - keeps a local message store, picks a head, authors messages

use crate::error::{StoreError, ValidatorError};
use crate::hash::{BlockHash, Digest};
use crate::store::MessageStore;
use crate::ticker::Ticker;
use crate::types::{Block, Member, Message, Weight};
use std::collections::HashMap;

/// A simulated validator with its own view of the message DAG
#[derive(Debug, Clone)]
pub struct Validator {
    /// Identity and weight
    member: Member,
    /// Local view; never shared with other validators
    store: MessageStore,
    /// Clock used to stamp authored blocks
    ticker: Ticker,
}

impl Validator {
    /// Create a validator whose store holds only `genesis`
    pub fn new(member: Member, genesis: Message, ticker: Ticker) -> Result<Self, StoreError> {
        let mut store = MessageStore::new();
        store.add(genesis)?;
        Ok(Self {
            member,
            store,
            ticker,
        })
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn name(&self) -> &str {
        &self.member.name
    }

    pub fn id(&self) -> Digest {
        self.member.id
    }

    pub fn weight(&self) -> Weight {
        self.member.weight
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Local fork-choice head (LMD-GHOST)
    ///
    /// Starting at genesis, descend into the child whose subtree carries the
    /// most latest-message weight. Ties go to the smaller block hash.
    pub fn create_estimate(&self) -> Result<&Block, StoreError> {
        let scores = self.subtree_scores();
        let score = |block: &Block| scores.get(&block.hash).copied().unwrap_or(0);

        let mut head = self.store.genesis_block()?;
        loop {
            let best = self.store.children_blocks(head).into_iter().max_by(|a, b| {
                score(*a)
                    .cmp(&score(*b))
                    .then_with(|| b.hash.cmp(&a.hash))
            });
            match best {
                Some(child) => head = child,
                None => return Ok(head),
            }
        }
    }

    /// Author a message on top of the local head, citing the latest known messages
    pub fn create_message(&self) -> Result<Message, StoreError> {
        let head = self.create_estimate()?;
        let block = head.child(self.ticker.current(), self.member.id);
        let justification = self.store.latest_message_hashes().into_values().collect();

        tracing::debug!(
            "{} authored block {} at height {} on {}",
            self.member.name,
            block.hash.digest().short(),
            block.height,
            head.hash.digest().short()
        );

        Ok(Message::new(self.member.clone(), block, justification))
    }

    /// Validate and store an incoming message
    pub fn add_message(&mut self, message: Message) -> Result<(), ValidatorError> {
        if let Some(missing) = message
            .justification
            .iter()
            .find(|h| !self.store.justified(**h))
        {
            return Err(ValidatorError::MissingJustification {
                message: message.hash,
                missing: *missing,
            });
        }

        let hash = message.hash;
        self.store.add(message)?;
        tracing::trace!("{} stored message {}", self.member.name, hash.digest().short());
        Ok(())
    }

    /// Latest-message weight accumulated on every block and its ancestors
    fn subtree_scores(&self) -> HashMap<BlockHash, Weight> {
        let mut scores = HashMap::new();
        for (sender, message) in self.store.latest_messages() {
            let mut cursor = Some(&message.estimate);
            while let Some(block) = cursor {
                *scores.entry(block.hash).or_insert(0) += sender.weight;
                cursor = self.store.parent_block(block);
            }
        }
        scores
    }
}

/// Builder for Validator
pub struct ValidatorBuilder {
    name: String,
    weight: Weight,
    ticker: Ticker,
}

impl ValidatorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 1,
            ticker: Ticker::new(),
        }
    }

    pub fn weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    pub fn ticker(mut self, ticker: Ticker) -> Self {
        self.ticker = ticker;
        self
    }

    /// Identity the built validator will carry
    pub fn member(&self) -> Member {
        Member::new(self.name.clone(), self.weight)
    }

    pub fn build(self, genesis: Message) -> Result<Validator, StoreError> {
        let member = self.member();
        Validator::new(member, genesis, self.ticker)
    }
}
