pub use encore_core::*;
pub use encore_store::{Store, StoreReader, StoreWriter};

use miette::Diagnostic;
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    Eligibility(String),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    StateConflict(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("storage error: {0}")]
    StorageError(#[from] encore_store::Error),

    #[error("wallet error: {0}")]
    WalletError(#[from] WalletError),
}

impl Error {
    pub fn config(text: impl Display) -> Error {
        Error::ConfigError(text.to_string())
    }

    pub fn validation(field: &'static str, message: impl Display) -> Error {
        Error::Validation {
            field,
            message: message.to_string(),
        }
    }

    pub fn eligibility(reason: impl Display) -> Error {
        Error::Eligibility(reason.to_string())
    }

    pub fn conflict(message: impl Display) -> Error {
        Error::StateConflict(message.to_string())
    }

    pub fn server(error: impl Display) -> Error {
        Error::ServerError(error.to_string())
    }
}
