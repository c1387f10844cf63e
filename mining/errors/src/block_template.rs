use ember_consensus_core::errors::block::RuleError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BuilderError {
    /// The self-validated candidate was rejected by consensus, which means
    /// the assembler itself produced an invalid block.
    #[error("created an invalid block template: {0}")]
    InvalidTemplate(#[from] RuleError),

    #[error("a proof-of-stake template requires a coinstake transaction")]
    MissingCoinstake,
}

pub type BuilderResult<T> = std::result::Result<T, BuilderError>;
