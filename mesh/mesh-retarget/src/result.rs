//! Retarget report.
//!
//! This module provides the [`RetargetReport`] returned by
//! [`retarget`](crate::retarget), describing the fitted correspondence
//! and what happened to every dependent mesh.

use crate::RbfKernel;
use std::fmt;

/// What happened to one dependent mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    /// The mesh was retargeted.
    Retargeted {
        /// Number of vertices written.
        vertices: usize,
        /// Largest vertex displacement, in the mesh's local frame.
        max_displacement: f64,
    },
    /// The mesh was left untouched.
    Skipped {
        /// Why it was skipped.
        reason: String,
    },
}

/// Outcome for a named dependent mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    /// Object name.
    pub name: String,
    /// Outcome.
    pub outcome: TargetOutcome,
}

/// Result of a retarget invocation.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{RbfKernel, RetargetReport};
///
/// let report = RetargetReport::new(RbfKernel::Biharmonic, 0.5);
/// assert_eq!(report.retargeted_count(), 0);
/// println!("{report}");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetargetReport {
    /// Kernel used.
    pub kernel: RbfKernel,
    /// Effective (scaled) radius used.
    pub radius: f64,
    /// Sampling stride.
    pub stride: usize,
    /// Correspondence rows read from the source, before mirroring.
    pub sampled_points: usize,
    /// Mirrored correspondence rows.
    pub mirrored_points: usize,
    /// Per-dependent outcomes, in input order.
    pub targets: Vec<TargetReport>,
}

impl RetargetReport {
    /// An empty report.
    #[must_use]
    pub const fn new(kernel: RbfKernel, radius: f64) -> Self {
        Self {
            kernel,
            radius,
            stride: 1,
            sampled_points: 0,
            mirrored_points: 0,
            targets: Vec::new(),
        }
    }

    /// Total rows in the solved system, excluding the affine rows.
    #[must_use]
    pub const fn correspondence_points(&self) -> usize {
        self.sampled_points + self.mirrored_points
    }

    /// Number of dependents that were retargeted.
    #[must_use]
    pub fn retargeted_count(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| matches!(t.outcome, TargetOutcome::Retargeted { .. }))
            .count()
    }

    /// Number of dependents that were skipped.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.targets.len() - self.retargeted_count()
    }

    /// Outcome for the dependent named `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.outcome)
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "RetargetReport: {} correspondence points ({} mirrored, stride {}), \
             kernel {} radius {:.4}, {} retargeted, {} skipped",
            self.correspondence_points(),
            self.mirrored_points,
            self.stride,
            self.kernel,
            self.radius,
            self.retargeted_count(),
            self.skipped_count()
        )
    }
}

impl fmt::Display for RetargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn report() -> RetargetReport {
        let mut report = RetargetReport::new(RbfKernel::C2, 1.0);
        report.stride = 2;
        report.sampled_points = 10;
        report.mirrored_points = 4;
        report.targets.push(TargetReport {
            name: "Shirt".into(),
            outcome: TargetOutcome::Retargeted {
                vertices: 120,
                max_displacement: 0.05,
            },
        });
        report.targets.push(TargetReport {
            name: "Empty".into(),
            outcome: TargetOutcome::Skipped {
                reason: "no vertices".into(),
            },
        });
        report
    }

    #[test]
    fn counts() {
        let r = report();
        assert_eq!(r.correspondence_points(), 14);
        assert_eq!(r.retargeted_count(), 1);
        assert_eq!(r.skipped_count(), 1);
        assert!(matches!(
            r.outcome("Empty"),
            Some(TargetOutcome::Skipped { .. })
        ));
        assert!(r.outcome("Missing").is_none());
    }

    #[test]
    fn summary_mentions_key_numbers() {
        let s = report().to_string();
        assert!(s.contains("14 correspondence points"));
        assert!(s.contains("stride 2"));
        assert!(s.contains("kernel C2"));
        assert!(s.contains("1 retargeted, 1 skipped"));
    }
}
