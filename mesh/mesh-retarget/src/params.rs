//! Retarget parameters.
//!
//! This module provides the [`RetargetParams`] struct for configuring a
//! single retarget invocation, and the [`Destination`] it retargets to.

use crate::kernel::DEFAULT_RADIUS;
use crate::{RbfKernel, RetargetResult};
use mesh_types::MeshObject;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How results are written back to dependent meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WriteMode {
    /// Replace vertex positions.
    #[default]
    Overwrite,
    /// Store the result as a new shape key, leaving vertices untouched.
    ShapeKey,
}

/// What the source mesh is retargeted to.
///
/// Either way the destination shares topology and vertex order with the
/// source.
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// A modified copy of the source object.
    Object(&'a MeshObject),
    /// A shape key of the source mesh, by name.
    ShapeKey(&'a str),
}

/// Parameters for a retarget invocation.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{RbfKernel, RetargetParams, WriteMode};
///
/// let params = RetargetParams::new()
///     .with_kernel(RbfKernel::Gaussian)
///     .with_radius(0.25)
///     .with_mirror(true)
///     .with_write_mode(WriteMode::ShapeKey);
///
/// assert!(params.validate().is_ok());
/// assert_eq!(params.effective_radius(), 0.25);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetargetParams {
    /// Radial basis function kernel.
    pub kernel: RbfKernel,
    /// Smoothing radius, before the kernel's scale is applied.
    pub radius: f64,
    /// Swap source and destination, producing the (approximate) inverse.
    pub invert: bool,
    /// Evaluate dependents in the destination's world frame.
    pub use_object_transform: bool,
    /// Sample only the source mesh's selected vertices.
    pub only_selection: bool,
    /// Use the high quality correspondence cap.
    pub high_quality: bool,
    /// Double correspondences across the mirror plane.
    pub mirror: bool,
    /// How results are written.
    pub write_mode: WriteMode,
}

impl Default for RetargetParams {
    fn default() -> Self {
        Self::new()
    }
}

impl RetargetParams {
    /// Biharmonic kernel, radius 0.5, every option off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kernel: RbfKernel::Biharmonic,
            radius: DEFAULT_RADIUS,
            invert: false,
            use_object_transform: false,
            only_selection: false,
            high_quality: false,
            mirror: false,
            write_mode: WriteMode::Overwrite,
        }
    }

    /// Sets the kernel.
    #[must_use]
    pub const fn with_kernel(mut self, kernel: RbfKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Sets the user-facing radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Solves for the inverse deformation.
    #[must_use]
    pub const fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Evaluates dependents in the destination's world frame.
    #[must_use]
    pub const fn with_object_transform(mut self, enabled: bool) -> Self {
        self.use_object_transform = enabled;
        self
    }

    /// Samples only selected source vertices.
    #[must_use]
    pub const fn with_only_selection(mut self, enabled: bool) -> Self {
        self.only_selection = enabled;
        self
    }

    /// Uses the high quality point cap.
    #[must_use]
    pub const fn with_high_quality(mut self, enabled: bool) -> Self {
        self.high_quality = enabled;
        self
    }

    /// Enables mirror doubling.
    #[must_use]
    pub const fn with_mirror(mut self, enabled: bool) -> Self {
        self.mirror = enabled;
        self
    }

    /// Sets the write mode.
    #[must_use]
    pub const fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Radius after the kernel's scale.
    #[must_use]
    pub fn effective_radius(&self) -> f64 {
        self.kernel.effective_radius(self.radius)
    }

    /// Checks that the radius suits the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::InvalidParameter`](crate::RetargetError::InvalidParameter)
    /// if it does not.
    pub fn validate(&self) -> RetargetResult<()> {
        self.kernel.validate_radius(self.radius)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_host_operator() {
        let params = RetargetParams::default();
        assert_eq!(params.kernel, RbfKernel::Biharmonic);
        assert_eq!(params.radius, 0.5);
        assert!(!params.invert);
        assert!(!params.use_object_transform);
        assert!(!params.only_selection);
        assert!(!params.high_quality);
        assert!(!params.mirror);
        assert_eq!(params.write_mode, WriteMode::Overwrite);
    }

    #[test]
    fn builders_set_fields() {
        let params = RetargetParams::new()
            .with_kernel(RbfKernel::C2)
            .with_radius(0.75)
            .with_invert(true)
            .with_object_transform(true)
            .with_only_selection(true)
            .with_high_quality(true);
        assert_eq!(params.kernel, RbfKernel::C2);
        assert_eq!(params.effective_radius(), 1.5);
        assert!(params.invert && params.use_object_transform);
        assert!(params.only_selection && params.high_quality);
    }

    #[test]
    fn validate_checks_radius() {
        assert!(RetargetParams::new().with_radius(0.0).validate().is_ok());
        assert!(
            RetargetParams::new()
                .with_kernel(RbfKernel::Gaussian)
                .with_radius(0.0)
                .validate()
                .is_err()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_host_identifiers() {
        let params: RetargetParams =
            serde_json::from_str(r#"{"kernel": "INV_BIHARMONIC", "mirror": true}"#).unwrap();
        assert_eq!(params.kernel, RbfKernel::InverseBiharmonic);
        assert!(params.mirror);
        assert_eq!(params.radius, 0.5);
    }
}
