//! # Instruction Ledger
//!
//! The ordered instructions of one block together with a consumption bitmap
//! of equal length. A ledger is owned by exactly one validation pass; bits
//! only ever go from unconsumed to consumed.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use shield_core::{CoreError, Instruction};

use crate::error::{MatchError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionLedger {
    instructions: Vec<Instruction>,
    consumed: BitVec,
}

impl InstructionLedger {
    /// Fresh ledger with nothing consumed
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let consumed = bitvec![0; instructions.len()];
        Self {
            instructions,
            consumed,
        }
    }

    /// Parse the `[metaType, shardID, status, content]` wire form
    pub fn from_string_slices<S: AsRef<str>>(rows: &[Vec<S>]) -> std::result::Result<Self, CoreError> {
        let instructions = rows
            .iter()
            .map(|row| Instruction::from_string_slice(row.as_slice()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(instructions))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Out-of-range indices count as consumed
    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.get(index).map_or(true, |bit| *bit)
    }

    /// Record a consumption. Fails if the index is already consumed.
    pub fn mark_consumed(&mut self, index: usize) -> Result<()> {
        let len = self.len();
        let mut bit = self
            .consumed
            .get_mut(index)
            .ok_or(MatchError::IndexOutOfRange { index, len })?;
        if *bit {
            return Err(MatchError::InstructionAlreadyConsumed(index));
        }
        *bit = true;
        Ok(())
    }

    /// Unconsumed entries in ledger order
    pub fn unconsumed(&self) -> impl Iterator<Item = (usize, &Instruction)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .filter(move |(i, _)| !self.consumed[*i])
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.count_ones()
    }

    pub fn consumed_indices(&self) -> Vec<usize> {
        self.consumed.iter_ones().collect()
    }

    pub fn report(&self) -> ConsumptionReport {
        ConsumptionReport {
            total: self.len(),
            consumed: self.consumed_indices(),
        }
    }
}

/// Outcome of a successful validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionReport {
    /// Instructions in the block
    pub total: usize,
    /// Consumed indices, ascending
    pub consumed: Vec<usize>,
}
