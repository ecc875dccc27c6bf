use lernstufe_bandits::BanditError;
use lernstufe_core::ValidationError;
use lernstufe_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad caller input; nothing was read or written.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Durable read or write failed; committed state is unchanged.
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error(transparent)]
    Policy(#[from] BanditError),
}

impl ApiError {
    /// Short classification used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
            Self::Policy(_) => "policy",
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
