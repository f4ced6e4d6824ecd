//! Core value types: validator identities, blocks and messages

use crate::hash::{content_hash, BlockHash, Digest, MessageHash};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Validator weight
pub type Weight = u64;

/// Slot number (one round of the simulation)
pub type Slot = u64;

/// Validator identity as recorded in committee snapshots
///
/// Equality, hashing and ordering go through `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Human readable name (`v0`, `nv4`, ...)
    pub name: String,
    /// Identity hash, derived from the name
    pub id: Digest,
    /// Fork-choice weight
    pub weight: Weight,
}

impl Member {
    pub fn new(name: impl Into<String>, weight: Weight) -> Self {
        let name = name.into();
        let id = content_hash([b"validator".as_slice(), name.as_bytes()]);
        Self { name, id, weight }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A proposed unit of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Content address over every other field
    pub hash: BlockHash,
    /// Predecessor, `None` only for genesis
    pub parent_hash: Option<BlockHash>,
    /// Distance from genesis
    pub height: u64,
    /// Slot the block was authored in
    pub slot: Slot,
    /// Identity of the authoring validator
    pub proposer: Digest,
    /// Committee snapshot recorded at authoring time
    pub active_validators: Vec<Member>,
}

impl Block {
    /// Build a block and compute its hash
    pub fn new(
        parent_hash: Option<BlockHash>,
        height: u64,
        slot: Slot,
        proposer: Digest,
        active_validators: Vec<Member>,
    ) -> Self {
        let hash = Self::compute_hash(parent_hash, height, slot, &proposer, &active_validators);
        Self {
            hash,
            parent_hash,
            height,
            slot,
            proposer,
            active_validators,
        }
    }

    /// The root block of a simulation
    pub fn genesis(proposer: Digest, active_validators: Vec<Member>) -> Self {
        Self::new(None, 0, 0, proposer, active_validators)
    }

    /// Child block citing `self` as parent
    pub fn child(&self, slot: Slot, proposer: Digest) -> Self {
        Self::new(
            Some(self.hash),
            self.height + 1,
            slot,
            proposer,
            self.active_validators.clone(),
        )
    }

    /// Same block with a replaced committee snapshot (and therefore a new hash)
    pub fn with_active_validators(self, active_validators: Vec<Member>) -> Self {
        Self::new(
            self.parent_hash,
            self.height,
            self.slot,
            self.proposer,
            active_validators,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// Every `interval`-th height is a checkpoint; genesis never is
    pub fn is_checkpoint(&self, interval: u64) -> bool {
        interval > 0 && self.height > 0 && self.height % interval == 0
    }

    fn compute_hash(
        parent_hash: Option<BlockHash>,
        height: u64,
        slot: Slot,
        proposer: &Digest,
        active_validators: &[Member],
    ) -> BlockHash {
        let parent = parent_hash.map(|h| *h.digest().as_bytes()).unwrap_or([0u8; 32]);
        let height = height.to_le_bytes();
        let slot = slot.to_le_bytes();
        let committee: Vec<u8> = active_validators
            .iter()
            .flat_map(|m| {
                m.id.as_bytes()
                    .iter()
                    .copied()
                    .chain(m.weight.to_le_bytes())
            })
            .collect();

        let has_parent = [parent_hash.is_some() as u8];
        BlockHash(content_hash([
            b"block".as_slice(),
            has_parent.as_slice(),
            parent.as_slice(),
            height.as_slice(),
            slot.as_slice(),
            proposer.as_bytes().as_slice(),
            committee.as_slice(),
        ]))
    }
}

/// A consensus vote/proposal envelope carrying exactly one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub hash: MessageHash,
    pub sender: Member,
    /// The block this message endorses
    pub estimate: Block,
    /// Latest message per validator known to the sender when authoring
    pub justification: Vec<MessageHash>,
}

impl Message {
    pub fn new(sender: Member, estimate: Block, justification: Vec<MessageHash>) -> Self {
        let justified: Vec<u8> = justification
            .iter()
            .flat_map(|h| h.digest().as_bytes().iter().copied())
            .collect();
        let hash = MessageHash(content_hash([
            b"message".as_slice(),
            sender.id.as_bytes().as_slice(),
            estimate.hash.digest().as_bytes().as_slice(),
            justified.as_slice(),
        ]));
        Self {
            hash,
            sender,
            estimate,
            justification,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.estimate.is_genesis()
    }

    /// Re-stamp the carried block's committee, rehashing block and message
    pub fn with_active_validators(self, active_validators: Vec<Member>) -> Self {
        let estimate = self.estimate.with_active_validators(active_validators);
        Self::new(self.sender, estimate, self.justification)
    }
}

impl From<&Message> for MessageHash {
    fn from(message: &Message) -> Self {
        message.hash
    }
}

impl From<&Block> for BlockHash {
    fn from(block: &Block) -> Self {
        block.hash
    }
}
