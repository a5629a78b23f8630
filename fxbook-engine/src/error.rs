use fxbook_core::Currency;
use fxbook_ledger::LedgerError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the allocation engine. Every variant aborts the
/// enclosing transaction.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient {currency} inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        currency: Currency,
        requested: Decimal,
        available: Decimal,
    },
    #[error("cannot reverse {entity}: {reason}")]
    InvalidReversal { entity: String, reason: String },
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("{currency} accounts and inventory disagree by {difference}")]
    ReconciliationMismatch {
        currency: Currency,
        difference: Decimal,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// `true` for a well-formed request the books legitimately refuse, as
    /// opposed to a storage or concurrency failure.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientInventory { .. }
                | EngineError::InvalidReversal { .. }
                | EngineError::Validation(_)
        )
    }

    /// Conflicts that disappear once the competing writer commits.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::ConcurrencyConflict(_) => true,
            EngineError::Ledger(err) => err.is_conflict(),
            _ => false,
        }
    }

    pub(crate) fn invalid_reversal(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidReversal {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        EngineError::Ledger(LedgerError::from(value))
    }
}
