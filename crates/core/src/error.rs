//! Error types for Ecotope

use thiserror::Error;

use crate::feature::FeatureId;

/// Main error type for Ecotope operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Contradictory or missing configuration. Always reported before any
    /// computation starts; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A feature's geometry is null, empty or unusable for the requested
    /// weights mode. The run aborts rather than silently skipping the
    /// feature, since dropped features would shift statistical results
    /// undetectably.
    #[error("invalid geometry for feature {feature}: {reason}")]
    InvalidGeometry { feature: FeatureId, reason: String },

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("attribute {attribute:?} of feature {feature} is not numeric")]
    NonNumericAttribute {
        feature: FeatureId,
        attribute: String,
    },

    /// Cooperative cancellation was observed. Distinguished from ordinary
    /// failures so callers can tell an intentional stop from broken input.
    #[error("operation cancelled")]
    Cancelled,

    #[error("GeoJSON error: {0}")]
    Format(String),

    #[error("algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for Ecotope operations
pub type Result<T> = std::result::Result<T, Error>;
