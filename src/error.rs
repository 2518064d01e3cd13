//! Error types for direction synthesis.
//!
//! These cover problems with the feature collection itself. Failures to fetch
//! it from the transfer API live in `http::FetchError` and never
//! appear here.

use thiserror::Error;

use crate::features::EndpointKind;

/// Errors raised while turning a feature collection into directions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuidanceError {
    #[error("Missing endpoint: no feature marks the {0}")]
    MissingEndpoint(EndpointKind),

    #[error("Duplicate endpoint: more than one feature marks the {0}")]
    DuplicateEndpoint(EndpointKind),

    #[error("Endpoint without a location: the {0} feature has no usable geometry")]
    EndpointWithoutLocation(EndpointKind),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for GuidanceError {
    fn from(e: serde_json::Error) -> Self {
        GuidanceError::InvalidInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GuidanceError>;
