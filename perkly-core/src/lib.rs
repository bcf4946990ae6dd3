pub mod models;
pub mod repository;
pub mod timestamp;
pub mod validation;

pub use models::{
    EligibilityResponse, EligibleOffer, Offer, OfferRequest, Transaction, TransactionRequest,
};
pub use repository::{LookasideCache, RecordStore, StoreError};
pub use validation::{ValidationError, ValidationErrorKind};

/// Failure of one of the engine's caller-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),
    // Internal detail stays on the source chain, never in the message.
    #[error("storage unavailable")]
    StorageUnavailable(#[source] StoreError),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => EngineError::DuplicateTransaction(id),
            other => EngineError::StorageUnavailable(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
