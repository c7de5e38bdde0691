use std::io;

use thiserror::Error;

use crate::node::Location;

/// A malformed declaration found while building the spec tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("`{text}` declared at {location} has no enclosing grouping")]
    NoActiveGrouping { text: String, location: Location },

    #[error("measurement `{text}` declared at {location} must take at least one sample")]
    ZeroSamples { text: String, location: Location },

    #[error("asynchronous node declared at {location} has a zero timeout")]
    ZeroTimeout { location: Location },

    #[error("grouping `{text}` declared at {location} panicked while declaring children: {message}")]
    GroupingPanicked {
        text: String,
        location: Location,
        message: String,
    },

    #[error("invalid {which} pattern `{pattern}`")]
    InvalidPattern {
        which: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Invalid suite configuration read from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid number")]
    InvalidNumber {
        var: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("{var}={value:?} is not a valid boolean")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}={value:?} is not a valid timeout in seconds")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("partition {index} must be between 1 and {count}, inclusive")]
    InvalidPartition { index: usize, count: usize },
}

/// A reporter failed to accept a lifecycle event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReporterError {
    #[error("failed to write report")]
    Io(#[from] io::Error),

    #[error("failed to forward event to {url}")]
    Transport {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A forwarded payload could not be encoded or decoded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WireError {
    #[error("failed to encode payload")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode payload")]
    Decode(#[source] serde_json::Error),

    #[error("unsupported protocol version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}
