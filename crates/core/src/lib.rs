//! # Ecotope Core
//!
//! Core types, traits and I/O for the Ecotope spatial cluster-detection
//! library.
//!
//! This crate provides:
//! - `Feature` / `FeatureCollection`: vector feature model
//! - `FeatureId`: stable, ordered feature identity
//! - `CancelToken`: cooperative cancellation
//! - Algorithm trait for consistent API
//! - GeoJSON I/O

pub mod cancel;
pub mod error;
pub mod feature;
pub mod io;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use feature::{AttributeValue, Feature, FeatureCollection, FeatureId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::error::{Error, Result};
    pub use crate::feature::{AttributeValue, Feature, FeatureCollection, FeatureId};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in Ecotope.
///
/// Algorithms are pure functions that transform input data according to
/// parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
