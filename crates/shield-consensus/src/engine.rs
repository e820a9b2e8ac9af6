//! # Match-and-Consume Engine
//!
//! Finds the instruction a response transaction answers and consumes it.
//!
//! One pass over the ledger in index order. An entry is skipped when it is
//! consumed, outside the response's family, undecodable, or disagrees with
//! the claim on request id, shard, uniqueness token or minted value. The
//! lowest index that survives every check is consumed.
//!
//! An undecodable entry is not an error on its own: unrelated kinds share the
//! ledger. It becomes one when it was the only in-family candidate.

use shield_core::{CoreError, InstructionCodec};
use tracing::{debug, info_span, warn, Span};

use crate::error::{MatchError, Result};
use crate::family::ResponseKind;
use crate::ledger::InstructionLedger;
use crate::mint::{MintDescriptorValidator, ResponseClaim};

pub struct MatchConsumeEngine {
    span: Span,
}

impl Default for MatchConsumeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchConsumeEngine {
    pub fn new() -> Self {
        Self {
            span: info_span!("match_engine"),
        }
    }

    /// Log inside `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Consume the first instruction authorizing `claim`; returns its index
    pub fn match_and_consume<V: MintDescriptorValidator + ?Sized>(
        &self,
        claim: &ResponseClaim,
        ledger: &mut InstructionLedger,
        kind: ResponseKind,
        validator: &V,
    ) -> Result<usize> {
        let _guard = self.span.enter();

        if kind.requires_uniqueness() && claim.uniqueness_token.is_none() {
            warn!(request = %claim.request_tx_id, "Claim lacks a uniqueness token");
            return Err(MatchError::NoMatchingInstruction(claim.request_tx_id.to_hex()));
        }

        let index = self.find(claim, ledger, kind, validator)?;
        ledger.mark_consumed(index)?;
        debug!(index, request = %claim.request_tx_id, "Instruction consumed");
        Ok(index)
    }

    fn find<V: MintDescriptorValidator + ?Sized>(
        &self,
        claim: &ResponseClaim,
        ledger: &InstructionLedger,
        kind: ResponseKind,
        validator: &V,
    ) -> Result<usize> {
        let mut candidates = 0usize;
        let mut decode_failure: Option<(usize, CoreError)> = None;

        for (index, instruction) in ledger.unconsumed() {
            if !kind.accepts_meta(instruction.meta_type) || !kind.accepts_status(&instruction.status) {
                continue;
            }
            candidates += 1;

            let content = match InstructionCodec::from_instruction(instruction) {
                Ok(content) => content,
                Err(e) => {
                    debug!(index, error = %e, "Skipping undecodable instruction");
                    decode_failure.get_or_insert((index, e));
                    continue;
                }
            };

            if content.request_tx_id() != &claim.request_tx_id || instruction.shard_id != claim.shard_id {
                continue;
            }
            if let Some(token) = &claim.uniqueness_token {
                if ResponseKind::content_uniqueness(&content) != Some(token) {
                    continue;
                }
            }
            let Some(authorized) = kind.authorized_mint(&content) else {
                continue;
            };
            if !validator.check(&authorized, &claim.mint) {
                debug!(index, "Mint differs from authorized values");
                continue;
            }
            return Ok(index);
        }

        match decode_failure {
            Some((index, source)) if candidates == 1 => Err(MatchError::Decode { index, source }),
            _ => Err(MatchError::NoMatchingInstruction(claim.request_tx_id.to_hex())),
        }
    }
}
