use std::io::Error as IoError;
use std::path::PathBuf;

use figment::Error as FigmentError;
use thiserror::Error;

use crate::model::vote::VoteId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No secret is registered for the vote: it never existed or is no longer active.
    #[error("Vote with ID {0} either does not exist or is no longer active")]
    VoteNotFoundOrExpired(VoteId),
    #[error("Vote not found: {0}")]
    VoteNotFound(VoteId),
    #[error("Vote already exists: {0}")]
    VoteAlreadyExists(VoteId),
    #[error("Invalid vote ID: {0:?}")]
    InvalidVoteId(String),
    #[error("Empty secret for vote {0}")]
    EmptySecret(VoteId),
    #[error("Persistence unavailable at {}: {source}", .path.display())]
    PersistenceUnavailable {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("Malformed persisted state at {}: {reason}", .path.display())]
    MalformedPersistedState { path: PathBuf, reason: String },
    #[error(transparent)]
    Config(#[from] Box<FigmentError>),
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl From<FigmentError> for Error {
    fn from(err: FigmentError) -> Self {
        Self::Config(Box::new(err))
    }
}
