//! Consensus errors

use crate::hash::{BlockHash, MessageHash};
use thiserror::Error;

/// Message store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("message {message} cites parent block {parent} with no carrying message")]
    MissingParent {
        message: MessageHash,
        parent: BlockHash,
    },

    #[error("message {0} is already stored")]
    DuplicateInsert(MessageHash),

    #[error("block {block} is already carried by message {existing}")]
    DuplicateBlock {
        block: BlockHash,
        existing: MessageHash,
    },

    #[error("genesis already set to {existing}, refusing {offered}")]
    ConflictingGenesis {
        existing: MessageHash,
        offered: MessageHash,
    },

    #[error("genesis has not been added")]
    UninitializedGenesis,
}

/// Validity failures reported by a validator's `add_message`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("message {message} is justified by unknown message {missing}")]
    MissingJustification {
        message: MessageHash,
        missing: MessageHash,
    },
}
