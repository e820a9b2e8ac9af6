//! Block-level validation of response transactions
//!
//! A candidate block is validated against a fresh ledger built from its
//! instructions. Response transactions are matched in block order; the first
//! failure rejects the whole block and the ledger is dropped with it.

use shield_core::Instruction;
use tracing::{info, info_span, warn, Span};

use crate::engine::MatchConsumeEngine;
use crate::error::{BlockError, MatchError};
use crate::family::ResponseKind;
use crate::ledger::{ConsumptionReport, InstructionLedger};
use crate::mint::{MintDescriptorValidator, MintTransaction, ResponseClaim};

pub struct BlockValidator<V> {
    engine: MatchConsumeEngine,
    validator: V,
    span: Span,
}

impl<V: MintDescriptorValidator> BlockValidator<V> {
    pub fn new(validator: V) -> Self {
        Self {
            engine: MatchConsumeEngine::new(),
            validator,
            span: info_span!("block_validator"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.engine = MatchConsumeEngine::new().with_span(span.clone());
        self.span = span;
        self
    }

    /// Match every response transaction of a block against its instructions
    pub fn validate_block<T: MintTransaction>(
        &self,
        instructions: Vec<Instruction>,
        transactions: &[T],
    ) -> Result<ConsumptionReport, BlockError> {
        let _guard = self.span.enter();
        let mut ledger = InstructionLedger::new(instructions);

        for (position, tx) in transactions.iter().enumerate() {
            if !tx.meta_type().is_response() {
                continue;
            }
            self.validate_response(tx, &mut ledger).map_err(|source| {
                warn!(position, error = %source, "Block rejected");
                BlockError { position, source }
            })?;
        }

        let report = ledger.report();
        info!(
            instructions = report.total,
            consumed = report.consumed.len(),
            "Block responses validated"
        );
        Ok(report)
    }

    fn validate_response<T: MintTransaction>(&self, tx: &T, ledger: &mut InstructionLedger) -> Result<usize, MatchError> {
        let meta = tx.meta_type();
        if tx.has_inputs() && !meta.info().has_input {
            return Err(MatchError::UnexpectedInputs(meta.as_u16()));
        }
        let kind = ResponseKind::from_response_meta(meta)
            .ok_or_else(|| MatchError::NotAMint(format!("kind {meta} has no response family")))?;
        let claim = ResponseClaim::from_transaction(tx)?;
        self.engine.match_and_consume(&claim, ledger, kind, &self.validator)
    }
}
