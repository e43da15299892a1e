//! Retarget tunables.

use crate::field::DEFAULT_EVAL_CHUNK_ROWS;
use crate::solve::{DEFAULT_DEGENERACY_TOLERANCE, DEFAULT_RESIDUAL_TOLERANCE, SolveOptions};
use crate::{MirrorAxis, RetargetError, RetargetResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration shared by retarget invocations.
///
/// These are the application-level knobs (sampling caps, solver
/// tolerances) as opposed to the per-call [`RetargetParams`].
///
/// [`RetargetParams`]: crate::RetargetParams
///
/// # Examples
///
/// ```
/// use mesh_retarget::RetargetConfig;
///
/// let config = RetargetConfig::default().with_max_vertices(500, 2000);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.vertex_cap(true), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetargetConfig {
    /// Correspondence point cap in default quality.
    pub max_vertices_low: usize,
    /// Correspondence point cap in high quality.
    pub max_vertices_high: usize,
    /// Axis normal to the mirror plane.
    pub mirror_axis: MirrorAxis,
    /// Query rows evaluated per block.
    pub eval_chunk_rows: usize,
    /// Relative tolerance for coincident or flat reference points.
    pub degeneracy_tolerance: f64,
    /// Maximum accepted relative residual.
    pub residual_tolerance: f64,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            max_vertices_low: 1000,
            max_vertices_high: 4000,
            mirror_axis: MirrorAxis::X,
            eval_chunk_rows: DEFAULT_EVAL_CHUNK_ROWS,
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
            residual_tolerance: DEFAULT_RESIDUAL_TOLERANCE,
        }
    }
}

impl RetargetConfig {
    /// Sets both correspondence caps.
    #[must_use]
    pub const fn with_max_vertices(mut self, low: usize, high: usize) -> Self {
        self.max_vertices_low = low;
        self.max_vertices_high = high;
        self
    }

    /// Sets the mirror axis.
    #[must_use]
    pub const fn with_mirror_axis(mut self, axis: MirrorAxis) -> Self {
        self.mirror_axis = axis;
        self
    }

    /// Sets the evaluation block size.
    #[must_use]
    pub const fn with_eval_chunk_rows(mut self, rows: usize) -> Self {
        self.eval_chunk_rows = rows;
        self
    }

    /// Sets the solver acceptance thresholds.
    #[must_use]
    pub const fn with_tolerances(mut self, degeneracy: f64, residual: f64) -> Self {
        self.degeneracy_tolerance = degeneracy;
        self.residual_tolerance = residual;
        self
    }

    /// Point cap for the requested quality mode.
    #[must_use]
    pub const fn vertex_cap(&self, high_quality: bool) -> usize {
        if high_quality {
            self.max_vertices_high
        } else {
            self.max_vertices_low
        }
    }

    /// Solver thresholds.
    #[must_use]
    pub const fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            degeneracy_tolerance: self.degeneracy_tolerance,
            residual_tolerance: self.residual_tolerance,
        }
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::InvalidParameter`] for zero caps or block
    /// size, or non-positive / non-finite tolerances.
    pub fn validate(&self) -> RetargetResult<()> {
        if self.max_vertices_low == 0 || self.max_vertices_high == 0 {
            return Err(RetargetError::InvalidParameter(
                "vertex caps must be at least 1".to_string(),
            ));
        }
        if self.eval_chunk_rows == 0 {
            return Err(RetargetError::InvalidParameter(
                "evaluation chunk size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("degeneracy_tolerance", self.degeneracy_tolerance),
            ("residual_tolerance", self.residual_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RetargetError::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RetargetConfig::default();
        assert_eq!(config.max_vertices_low, 1000);
        assert_eq!(config.max_vertices_high, 4000);
        assert_eq!(config.mirror_axis, MirrorAxis::X);
        assert_eq!(config.eval_chunk_rows, 4096);
        assert_eq!(config.vertex_cap(false), 1000);
        assert_eq!(config.solve_options(), SolveOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders() {
        let config = RetargetConfig::default()
            .with_mirror_axis(MirrorAxis::Z)
            .with_eval_chunk_rows(16)
            .with_tolerances(1e-10, 1e-4);
        assert_eq!(config.mirror_axis, MirrorAxis::Z);
        assert_eq!(config.eval_chunk_rows, 16);
        assert_eq!(config.solve_options().degeneracy_tolerance, 1e-10);
        assert_eq!(config.solve_options().residual_tolerance, 1e-4);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(RetargetConfig::default().with_max_vertices(0, 10).validate().is_err());
        assert!(RetargetConfig::default().with_eval_chunk_rows(0).validate().is_err());
        assert!(RetargetConfig::default().with_tolerances(0.0, 1e-6).validate().is_err());
        assert!(RetargetConfig::default().with_tolerances(1e-9, f64::NAN).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_fills_missing_fields() {
        let config: RetargetConfig = serde_json::from_str(r#"{"max_vertices_low": 250}"#).unwrap();
        assert_eq!(config.max_vertices_low, 250);
        assert_eq!(config.max_vertices_high, 4000);
    }
}
