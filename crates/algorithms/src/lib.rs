//! # Ecotope Algorithms
//!
//! Spatial cluster detection for vector feature sets.
//!
//! ## Modules
//!
//! - **weights**: Spatial weights matrices (contiguity and distance based)
//! - **stats**: Local statistic provider contract
//! - **cluster**: AMOEBA seed ranking, region growing and overlap
//!   resolution

pub mod cluster;
pub mod stats;
pub mod weights;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cluster::{
        amoeba, Amoeba, AmoebaInput, AmoebaParams, Cluster, Criterion, Detection, Overlap,
        SeedOption, SeedOrdering,
    };
    pub use crate::stats::{LocalStatisticProvider, PrecomputedScores, ScoreContext};
    pub use crate::weights::{
        ContiguityKind, DistanceBand, DistanceMetric, WeightsMatrix, WeightsMode, WeightsParams,
    };
    pub use ecotope_core::prelude::*;
}
