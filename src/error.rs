//! Error types for identity resolution
//!
//! Each collaborator has its own error enum. `ResolveError` wraps them
//! transparently so the caller sees the collaborator's message verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading ambient settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `AZURE_ENVIRONMENT` names a cloud we have no descriptor for
    #[error("there is no cloud environment matching the name {0:?}")]
    UnknownEnvironment(String),

    /// The environment override file could not be read
    #[error("failed to read environment file {}: {source}", .path.display())]
    EnvironmentFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The environment override file is not a valid descriptor
    #[error("invalid environment file {}: {source}", .path.display())]
    InvalidEnvironmentFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while building an authorizer or acquiring a token
#[derive(Debug, Error)]
pub enum AuthorizerError {
    /// A setting required by the selected credential is empty
    #[error("{setting} is required for {credential} authentication")]
    MissingSetting {
        setting: &'static str,
        credential: &'static str,
    },

    /// The ambient settings select a credential we cannot build
    #[error("unsupported credential: {0}")]
    Unsupported(String),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("token request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The token endpoint answered with a non-success status
    #[error("token endpoint returned {status}: {body}")]
    TokenRequest { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),
}

/// Errors raised by [`crate::IdentityResolver::resolve`]
///
/// Every variant is fatal. Callers are expected to abort startup.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    AmbientUnavailable(#[from] SettingsError),

    #[error(
        "subscription id is not set: pass one explicitly or set the AZURE_SUBSCRIPTION_ID env var"
    )]
    MissingSubscription,

    #[error(transparent)]
    AuthorizerConstructionFailed(#[from] AuthorizerError),
}
