use crate::crypto_ctx::{CodecDefaults, StackCrypto};
use raet_estate::EstateRegistry;

/// Everything a transaction needs to advance one step, borrowed for the
/// duration of a single `receive`/`process` call. Transactions never keep
/// a copy of this beyond the call.
pub struct StackContext<'a> {
    pub registry: &'a mut EstateRegistry,
    pub crypto: StackCrypto<'a>,
    pub codecs: CodecDefaults,
}

/// Whether a transaction should remain in the table or be dropped after
/// this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Live,
    Done,
}

/// The result of one `receive`/`process` step: effects for the driver to
/// apply, plus whether the transaction survives.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub effects: Vec<crate::effect::Effect>,
    pub outcome: Outcome,
}

impl StepResult {
    pub fn live(effects: Vec<crate::effect::Effect>) -> Self {
        Self { effects, outcome: Outcome::Live }
    }

    pub fn done(effects: Vec<crate::effect::Effect>) -> Self {
        Self { effects, outcome: Outcome::Done }
    }
}
