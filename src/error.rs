use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Split of {original} does not re-sum after correction (got {summed}) for amount index {index}")]
    SplitSumMismatch {
        original: Decimal,
        summed: Decimal,
        index: usize,
    },

    #[error("Missing accounting properties for document {document}: {details}")]
    MissingAccountingProps { document: String, details: String },

    #[error("Ledger sink error: {0}")]
    SinkError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
