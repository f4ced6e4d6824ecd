//! Simulated broadcast network
//!
//! Holds the committee in join order and one FIFO packet queue per member.
//! Delivery has zero latency: a packet sent in a slot is ready in that slot.

use crate::hash::Digest;
use crate::ticker::Ticker;
use crate::types::{Member, Message, Slot};
use crate::validator::Validator;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// A message in flight to one recipient
#[derive(Debug, Clone)]
pub struct Packet {
    pub message: Message,
    /// Identity of the broadcasting validator
    pub sender: Digest,
    pub sent_at: Slot,
}

/// Counters for the whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub messages_broadcast: u64,
    pub packets_delivered: u64,
    pub joins: u64,
    pub exits: u64,
}

/// Committee plus delivery queues
#[derive(Debug)]
pub struct Network {
    /// Members, earliest joined first
    validators: Vec<Validator>,
    /// Pending packets per member
    queues: HashMap<Digest, VecDeque<Packet>>,
    /// Every broadcast so far, replayed to late joiners
    backlog: Vec<Packet>,
    ticker: Ticker,
    stats: NetworkStats,
}

impl Network {
    pub fn new(validators: Vec<Validator>, ticker: Ticker) -> Self {
        let queues = validators
            .iter()
            .map(|v| (v.id(), VecDeque::new()))
            .collect();
        Self {
            validators,
            queues,
            backlog: Vec::new(),
            ticker,
            stats: NetworkStats::default(),
        }
    }

    /// Queue `message` for every member except the sender
    pub fn broadcast(&mut self, message: &Message, sender: &Member) {
        let packet = Packet {
            message: message.clone(),
            sender: sender.id,
            sent_at: self.ticker.current(),
        };

        let mut recipients = 0;
        for validator in &self.validators {
            if validator.id() == sender.id {
                continue;
            }
            if let Some(queue) = self.queues.get_mut(&validator.id()) {
                queue.push_back(packet.clone());
                recipients += 1;
            }
        }

        self.backlog.push(packet);
        self.stats.messages_broadcast += 1;
        tracing::debug!(
            "{} broadcast {} to {} validators",
            sender.name,
            message.hash.digest().short(),
            recipients
        );
    }

    /// Drain every packet ready for `validator` at the current slot
    pub fn receive(&mut self, validator: &Member) -> Vec<Packet> {
        let now = self.ticker.current();
        let Some(queue) = self.queues.get_mut(&validator.id) else {
            return Vec::new();
        };

        let mut ready = Vec::new();
        while queue.front().is_some_and(|p| p.sent_at <= now) {
            if let Some(packet) = queue.pop_front() {
                ready.push(packet);
            }
        }
        self.stats.packets_delivered += ready.len() as u64;
        ready
    }

    /// Admit a validator; it is sent the full broadcast backlog
    pub fn join(&mut self, validator: Validator) {
        let now = self.ticker.current();
        let queue: VecDeque<Packet> = self
            .backlog
            .iter()
            .map(|p| Packet {
                sent_at: now,
                ..p.clone()
            })
            .collect();

        tracing::info!(
            "{} joined at slot {} with {} backlog packets",
            validator.name(),
            now,
            queue.len()
        );

        self.queues.insert(validator.id(), queue);
        self.validators.push(validator);
        self.stats.joins += 1;
    }

    /// Remove a validator, dropping its undelivered packets
    pub fn exit(&mut self, validator: &Member) -> Option<Validator> {
        let index = self.validators.iter().position(|v| v.id() == validator.id)?;
        let removed = self.validators.remove(index);
        self.queues.remove(&validator.id);
        self.stats.exits += 1;

        tracing::info!("{} exited at slot {}", validator.name, self.ticker.current());
        Some(removed)
    }

    /// Committee identities in join order
    pub fn all(&self) -> Vec<Member> {
        self.validators.iter().map(|v| v.member().clone()).collect()
    }

    /// Earliest joined member
    pub fn oldest(&self) -> Option<&Validator> {
        self.validators.first()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn validator(&self, id: &Digest) -> Option<&Validator> {
        self.validators.iter().find(|v| v.id() == *id)
    }

    pub fn validator_mut(&mut self, id: &Digest) -> Option<&mut Validator> {
        self.validators.iter_mut().find(|v| v.id() == *id)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}
