//! Error type for the simulation core.
//!
//! Construction-time errors propagate to the caller. Steady-state conditions
//! (no free elevator, full car) are not errors and never show up here.

use thiserror::Error;

use super::types::FloorNumber;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("passenger cannot travel from floor {origin} to itself")]
    InvalidTrip { origin: FloorNumber },

    #[error("floor {floor} is out of bounds [{min}, {max}]")]
    OutOfBounds {
        floor: FloorNumber,
        min: FloorNumber,
        max: FloorNumber,
    },

    #[error("dispatch policy '{0}' is not supported")]
    UnsupportedPolicy(String),

    #[error("cannot draw {requested} distinct values from {available} possible values")]
    ExhaustedDomain { requested: usize, available: usize },

    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Shorthand result type for the simulation core.
pub type SimResult<T> = Result<T, SimError>;
