//! Error types for the rigid-body simulation core.

use thiserror::Error;

use crate::types::Float;

/// Errors surfaced by body construction, integration and the
/// orientation correction.
#[derive(Debug, Error)]
pub enum SimError {
    /// A caller-supplied parameter violates a construction invariant.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The adaptive solver could not reach the requested time within
    /// its substep budget at the configured tolerance. `time` is the
    /// simulation time actually reached when the solver gave up.
    #[error("integration failed at t = {time} after {steps} substeps")]
    IntegrationFailure { time: Float, steps: usize },

    /// A matrix row was too short to normalize.
    #[error("numerical degeneracy: row norm {norm} too small to normalize")]
    NumericalDegeneracy { norm: Float },
}

impl SimError {
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter(reason.into())
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn invalid_parameter_display() {
        let err = SimError::invalid_parameter("mass must be positive, got 0");
        assert!(err.to_string().contains("invalid parameter"));
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn integration_failure_display() {
        let err = SimError::IntegrationFailure {
            time: 2.5,
            steps: 100000,
        };
        assert!(err.to_string().contains("t = 2.5"));
        assert!(err.to_string().contains("100000"));
    }

    #[test]
    fn numerical_degeneracy_display() {
        let err = SimError::NumericalDegeneracy { norm: 1e-12 };
        assert!(err.to_string().contains("too small to normalize"));
    }
}
