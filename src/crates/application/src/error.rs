use crate::store::StoreError;
use domain::song::SongError;
use domain::vote::VoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Song not found: {0}")]
    SongNotFound(i64),
    #[error("Song error: {0}")]
    SongError(#[from] SongError),
    #[error("Vote error: {0}")]
    VoteError(#[from] VoteError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
