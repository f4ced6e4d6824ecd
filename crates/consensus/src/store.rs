//! Per-validator message store
//!
//! Append-only DAG of messages and the blocks they carry. Parent/child links
//! are indexed by message hash; block-level queries translate through
//! `block_to_message`.

use crate::error::StoreError;
use crate::hash::{BlockHash, MessageHash};
use crate::types::{Block, Member, Message, Slot};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One serialized message, as produced by [`MessageStore::dump`]
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub hash: MessageHash,
    pub sender: String,
    pub estimate: BlockRecord,
    /// Message carrying the parent block, `None` for genesis
    pub parent: Option<MessageHash>,
    pub justification: Vec<MessageHash>,
    /// Slot at which the dump was taken
    pub observed_at: Slot,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockRecord {
    pub hash: BlockHash,
    pub parent_hash: Option<BlockHash>,
    pub height: u64,
    pub slot: Slot,
    pub active_validators: Vec<String>,
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        Self {
            hash: block.hash,
            parent_hash: block.parent_hash,
            height: block.height,
            slot: block.slot,
            active_validators: block.active_validators.iter().map(|m| m.name.clone()).collect(),
        }
    }
}

/// Content-addressed message DAG owned by a single validator
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    /// Every known message
    messages: HashMap<MessageHash, Message>,
    /// Arrival order, for dumps
    arrival: Vec<MessageHash>,
    /// Block hash -> hash of the message carrying it
    block_to_message: HashMap<BlockHash, MessageHash>,
    /// Message -> message carrying its parent block
    parent: HashMap<MessageHash, MessageHash>,
    /// Message -> messages whose block builds on its block, in arrival order
    children: HashMap<MessageHash, Vec<MessageHash>>,
    /// Sender -> authored messages, in arrival order
    history: BTreeMap<Member, Vec<MessageHash>>,
    genesis: Option<MessageHash>,
    /// Most recently inserted block. Not a finality proof.
    last_finalized: Option<BlockHash>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, updating every index or none of them
    pub fn add(&mut self, message: Message) -> Result<(), StoreError> {
        let hash = message.hash;

        if self.messages.contains_key(&hash) {
            return Err(StoreError::DuplicateInsert(hash));
        }
        if let Some(existing) = self.block_to_message.get(&message.estimate.hash) {
            return Err(StoreError::DuplicateBlock {
                block: message.estimate.hash,
                existing: *existing,
            });
        }

        let parent = match message.estimate.parent_hash {
            None => {
                if let Some(existing) = self.genesis {
                    return Err(StoreError::ConflictingGenesis {
                        existing,
                        offered: hash,
                    });
                }
                None
            }
            Some(parent_block) => match self.block_to_message.get(&parent_block) {
                Some(parent_message) => Some(*parent_message),
                None => {
                    return Err(StoreError::MissingParent {
                        message: hash,
                        parent: parent_block,
                    })
                }
            },
        };

        // All checks passed; from here on nothing can fail.
        self.block_to_message.insert(message.estimate.hash, hash);
        self.history
            .entry(message.sender.clone())
            .or_default()
            .push(hash);
        match parent {
            Some(parent) => {
                self.parent.insert(hash, parent);
                self.children.entry(parent).or_default().push(hash);
            }
            None => self.genesis = Some(hash),
        }
        self.last_finalized = Some(message.estimate.hash);
        self.arrival.push(hash);
        self.messages.insert(hash, message);

        Ok(())
    }

    pub fn message(&self, hash: impl Into<MessageHash>) -> Option<&Message> {
        self.messages.get(&hash.into())
    }

    /// Most recent message hash per sender
    pub fn latest_message_hashes(&self) -> BTreeMap<Member, MessageHash> {
        self.history
            .iter()
            .filter_map(|(sender, hashes)| hashes.last().map(|h| (sender.clone(), *h)))
            .collect()
    }

    /// Most recent message per sender
    pub fn latest_messages(&self) -> BTreeMap<Member, &Message> {
        self.history
            .iter()
            .filter_map(|(sender, hashes)| {
                let latest = hashes.last()?;
                self.messages.get(latest).map(|m| (sender.clone(), m))
            })
            .collect()
    }

    /// Messages authored by `sender`, in arrival order
    pub fn history(&self, sender: &Member) -> &[MessageHash] {
        self.history.get(sender).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_message(&self, hash: impl Into<MessageHash>) -> Option<&Message> {
        let parent = self.parent.get(&hash.into())?;
        self.messages.get(parent)
    }

    pub fn children_messages(&self, hash: impl Into<MessageHash>) -> Vec<&Message> {
        self.children
            .get(&hash.into())
            .map(|children| children.iter().filter_map(|c| self.messages.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn parent_block(&self, hash: impl Into<BlockHash>) -> Option<&Block> {
        let message = self.block_to_message.get(&hash.into())?;
        self.parent_message(*message).map(|m| &m.estimate)
    }

    pub fn children_blocks(&self, hash: impl Into<BlockHash>) -> Vec<&Block> {
        match self.block_to_message.get(&hash.into()) {
            Some(message) => self
                .children_messages(*message)
                .into_iter()
                .map(|m| &m.estimate)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_children_blocks(&self, hash: impl Into<BlockHash>) -> bool {
        self.block_to_message
            .get(&hash.into())
            .and_then(|message| self.children.get(message))
            .is_some_and(|children| !children.is_empty())
    }

    /// Message carrying the given block
    pub fn to_message(&self, hash: impl Into<BlockHash>) -> Option<&Message> {
        let message = self.block_to_message.get(&hash.into())?;
        self.messages.get(message)
    }

    /// Block carried by the given message; `Some` for every stored message
    pub fn to_block(&self, hash: impl Into<MessageHash>) -> Option<&Block> {
        self.message(hash).map(|m| &m.estimate)
    }

    /// Whether the message is known to this store
    pub fn justified(&self, hash: impl Into<MessageHash>) -> bool {
        self.messages.contains_key(&hash.into())
    }

    pub fn genesis_block(&self) -> Result<&Block, StoreError> {
        self.genesis
            .and_then(|g| self.messages.get(&g))
            .map(|m| &m.estimate)
            .ok_or(StoreError::UninitializedGenesis)
    }

    /// Most recently inserted block
    pub fn last_finalized_block(&self) -> Option<&Block> {
        self.to_message(self.last_finalized?).map(|m| &m.estimate)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// One record per stored message, in arrival order
    pub fn dump(&self, observed_at: Slot) -> Vec<MessageRecord> {
        self.arrival
            .iter()
            .filter_map(|hash| self.messages.get(hash))
            .map(|m| MessageRecord {
                hash: m.hash,
                sender: m.sender.name.clone(),
                estimate: BlockRecord::from(&m.estimate),
                parent: self.parent_message(m.hash).map(|p| p.hash),
                justification: m.justification.clone(),
                observed_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        v0: Member,
        v1: Member,
        genesis: Message,
    }

    fn fixture() -> Fixture {
        let v0 = Member::new("v0", 10);
        let v1 = Member::new("v1", 20);
        let block = Block::genesis(v0.id, vec![v0.clone(), v1.clone()]);
        let genesis = Message::new(v0.clone(), block, vec![]);
        Fixture { v0, v1, genesis }
    }

    fn child_of(parent: &Message, sender: &Member, slot: Slot) -> Message {
        Message::new(
            sender.clone(),
            parent.estimate.child(slot, sender.id),
            vec![parent.hash],
        )
    }

    #[test]
    fn test_genesis_uninitialized_then_stable() {
        let f = fixture();
        let mut store = MessageStore::new();
        assert_eq!(store.genesis_block(), Err(StoreError::UninitializedGenesis));

        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v1, 0);
        store.add(a.clone()).unwrap();
        store.add(child_of(&a, &f.v0, 1)).unwrap();

        assert_eq!(store.genesis_block().unwrap(), &f.genesis.estimate);
    }

    #[test]
    fn test_dag_integrity() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();

        // fork: two children of genesis, one grandchild
        let a = child_of(&f.genesis, &f.v0, 0);
        let b = child_of(&f.genesis, &f.v1, 0);
        let c = child_of(&a, &f.v1, 1);
        for m in [&a, &b, &c] {
            store.add(m.clone()).unwrap();
        }

        for m in [&a, &b, &c] {
            let parent = store.parent_message(m).unwrap();
            assert_eq!(Some(parent.estimate.hash), m.estimate.parent_hash);
            assert!(store.children_messages(parent).iter().any(|child| child.hash == m.hash));
        }

        let children: Vec<_> = store.children_messages(&f.genesis).iter().map(|m| m.hash).collect();
        assert_eq!(children, vec![a.hash, b.hash]);

        assert_eq!(store.parent_block(&c.estimate), Some(&a.estimate));
        assert_eq!(store.children_blocks(&a.estimate), vec![&c.estimate]);
        assert!(store.has_children_blocks(&a.estimate));
        assert!(!store.has_children_blocks(&b.estimate));
        assert!(store.parent_message(&f.genesis).is_none());
        assert!(store.parent_block(&f.genesis.estimate).is_none());
    }

    #[test]
    fn test_block_message_translation() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v0, 0);
        store.add(a.clone()).unwrap();

        assert_eq!(store.to_message(&a.estimate).map(|m| m.hash), Some(a.hash));
        assert_eq!(store.to_block(&a), Some(&a.estimate));
        assert!(store.justified(&a));
        assert!(store.justified(a.hash));

        let unknown = child_of(&a, &f.v1, 1);
        assert!(!store.justified(&unknown));
        assert!(store.to_message(&unknown.estimate).is_none());
        assert!(store.to_block(&unknown).is_none());
    }

    #[test]
    fn test_latest_messages_follow_history() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();

        let a = child_of(&f.genesis, &f.v1, 0);
        let b = child_of(&a, &f.v1, 1);
        let c = child_of(&b, &f.v0, 2);
        store.add(a.clone()).unwrap();
        store.add(b.clone()).unwrap();
        store.add(c.clone()).unwrap();

        assert_eq!(store.history(&f.v1), &[a.hash, b.hash]);
        assert_eq!(store.history(&f.v0), &[f.genesis.hash, c.hash]);

        let latest = store.latest_message_hashes();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&f.v1], b.hash);
        assert_eq!(latest[&f.v0], c.hash);
        assert_eq!(store.latest_messages()[&f.v0].hash, c.hash);
    }

    #[test]
    fn test_missing_parent_rolls_back() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();

        let detached_parent = child_of(&f.genesis, &f.v0, 0);
        let orphan = child_of(&detached_parent, &f.v1, 1);

        let err = store.add(orphan.clone()).unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingParent {
                message: orphan.hash,
                parent: detached_parent.estimate.hash,
            }
        );

        assert_eq!(store.len(), 1);
        assert!(!store.justified(&orphan));
        assert!(store.to_message(&orphan.estimate).is_none());
        assert!(store.history(&f.v1).is_empty());
        assert!(store.children_messages(&f.genesis).is_empty());
        assert_eq!(store.last_finalized_block(), Some(&f.genesis.estimate));
        assert_eq!(store.dump(0).len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v0, 0);
        store.add(a.clone()).unwrap();

        assert_eq!(store.add(a.clone()), Err(StoreError::DuplicateInsert(a.hash)));
        assert_eq!(store.history(&f.v0).len(), 2);
        assert_eq!(store.children_messages(&f.genesis).len(), 1);
    }

    #[test]
    fn test_block_carried_once() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v0, 0);
        store.add(a.clone()).unwrap();

        // same block, different justification -> different message
        let rewrap = Message::new(f.v0.clone(), a.estimate.clone(), vec![]);
        assert_ne!(rewrap.hash, a.hash);
        assert!(matches!(
            store.add(rewrap),
            Err(StoreError::DuplicateBlock { existing, .. }) if existing == a.hash
        ));
    }

    #[test]
    fn test_second_genesis_is_rejected() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();

        let other = Message::new(
            f.v1.clone(),
            Block::genesis(f.v1.id, vec![f.v1.clone()]),
            vec![],
        );
        assert!(matches!(
            store.add(other),
            Err(StoreError::ConflictingGenesis { .. })
        ));
        assert_eq!(store.genesis_block().unwrap(), &f.genesis.estimate);
    }

    #[test]
    fn test_last_finalized_tracks_latest_insert() {
        let f = fixture();
        let mut store = MessageStore::new();
        assert!(store.last_finalized_block().is_none());

        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v0, 0);
        let b = child_of(&f.genesis, &f.v1, 0);
        store.add(a.clone()).unwrap();
        store.add(b.clone()).unwrap();

        // a sibling insert moves the pointer even though it is not a descendant
        assert_eq!(store.last_finalized_block(), Some(&b.estimate));
    }

    #[test]
    fn test_dump_links_parents() {
        let f = fixture();
        let mut store = MessageStore::new();
        store.add(f.genesis.clone()).unwrap();
        let a = child_of(&f.genesis, &f.v1, 0);
        store.add(a.clone()).unwrap();

        let records = store.dump(7);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash, f.genesis.hash);
        assert_eq!(records[0].parent, None);
        assert_eq!(records[1].parent, Some(f.genesis.hash));
        assert_eq!(records[1].sender, "v1");
        assert_eq!(records[1].estimate.height, 1);
        assert_eq!(records[1].observed_at, 7);

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(json[1]["parent"], serde_json::json!(f.genesis.hash.to_string()));
    }
}
