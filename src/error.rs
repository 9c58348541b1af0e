use thiserror::Error;

/// Programmer errors raised when a dispatch is malformed.
///
/// Network outcomes are never reported through this type; they resolve as
/// [`QueryOutcome::Failure`](crate::coordinator::QueryOutcome::Failure).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Query config is missing a target")]
    MissingTarget,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
