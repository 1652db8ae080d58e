//! Endpoint construction errors.

use thiserror::Error;

/// Why a trigger could not be turned into a bindable endpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("http endpoint for function {function} has no method")]
    MissingMethod { function: String },

    #[error("http endpoint for function {function} has no path")]
    MissingPath { function: String },

    #[error("http endpoint for function {function} has invalid method {method:?}")]
    InvalidMethod { function: String, method: String },

    #[error("http endpoint for function {function} has invalid path {path:?}: {reason}")]
    InvalidPath {
        function: String,
        path: String,
        reason: &'static str,
    },
}
