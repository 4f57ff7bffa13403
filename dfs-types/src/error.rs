//! The error-kind taxonomy shared by every dfs service.
//!
//! Every service boundary (HTTP handler, AMQP RPC handler, gRPC method)
//! converts into one of these kinds before it crosses back out to a caller;
//! internal glue code is free to use `anyhow` the way the rest of the
//! workspace does.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("bad input: {0:?}")]
    BadInput(Vec<String>),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rpc timed out after {0:?}")]
    RpcTimeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage io error: {0}")]
    StorageIo(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadInput(_) => ErrorKind::BadInput,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::NotFound => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::RpcTimeout(_) => ErrorKind::RpcTimeout,
            Error::Transport(_) => ErrorKind::Transport,
            Error::StorageIo(_) => ErrorKind::StorageIo,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::InternalInvariant(_) => ErrorKind::InternalInvariant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    BadInput,
    Unauthorized,
    NotFound,
    Conflict,
    PermissionDenied,
    RpcTimeout,
    Transport,
    StorageIo,
    Crypto,
    InternalInvariant,
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound,
            other => Error::StorageIo(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageIo(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
