use thiserror::Error;

#[derive(Debug, Error)]
pub enum BanditError {
    #[error("No arm to choose from: {0}")]
    NoCandidates(&'static str),
}

pub type Result<T> = std::result::Result<T, BanditError>;
