//! Error types for mesh retargeting operations.

use thiserror::Error;

/// Errors that can occur while fitting or applying a retarget field.
///
/// Correspondence and solve errors abort a whole retarget invocation.
/// Errors tied to a single dependent mesh only skip that mesh.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RetargetError {
    /// The source point cloud has no points.
    #[error("source mesh has no vertices")]
    EmptySource,

    /// Source and destination correspondence sets differ in size.
    #[error(
        "source and destination must have an equal number of vertices \
         (source has {source_points}, destination has {destination_points})"
    )]
    PointCountMismatch {
        /// Number of source points.
        source_points: usize,
        /// Number of destination points.
        destination_points: usize,
    },

    /// The selection mask left no points to sample.
    #[error("no vertices selected; select the areas of importance or disable selection-only sampling")]
    EmptySelection,

    /// The augmented RBF system could not be solved to finite weights.
    #[error("failed to retarget ({0}); try a different function or radius")]
    SingularSystem(String),

    /// A dependent mesh produced no points to evaluate.
    #[error("dependent mesh '{target}' has no vertices to retarget")]
    NoDependentPoints {
        /// Name of the dependent mesh.
        target: String,
    },

    /// The destination shape key does not exist on the source mesh.
    #[error("shape key '{name}' not found on the source mesh")]
    MissingShapeKey {
        /// Requested shape key name.
        name: String,
    },

    /// A selection mask does not cover the point source.
    #[error("selection mask has {mask} entries but the point source has {points} points")]
    MaskLengthMismatch {
        /// Mask length.
        mask: usize,
        /// Point count of the source being sampled.
        points: usize,
    },

    /// A weight matrix does not match the reference point set.
    #[error("weight matrix has {found} rows, expected {expected}")]
    WeightShapeMismatch {
        /// Expected row count (reference points + 4).
        expected: usize,
        /// Actual row count.
        found: usize,
    },

    /// An object's world matrix cannot be inverted.
    #[error("world matrix of '{object}' is not invertible")]
    NonInvertibleTransform {
        /// Name of the offending object.
        object: String,
    },

    /// The destination's world matrix cannot be inverted, so no dependent can
    /// be carried into its frame.
    #[error(
        "world matrix of destination '{object}' is not invertible; \
         fix its transform or disable object transforms"
    )]
    NonInvertibleDestination {
        /// Name of the destination object.
        object: String,
    },

    /// A point source reported an index it cannot produce a position for.
    #[error("point source has {points} points but no position for index {index}")]
    MissingPoint {
        /// Index that was requested.
        index: usize,
        /// Point count the source reported.
        points: usize,
    },

    /// A parameter or configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RetargetError {
    /// Whether this error only affects a single dependent target.
    ///
    /// Target-local errors are reported and skipped by the orchestrator
    /// instead of aborting the invocation.
    #[must_use]
    pub const fn is_target_local(&self) -> bool {
        matches!(
            self,
            Self::NoDependentPoints { .. } | Self::NonInvertibleTransform { .. }
        )
    }
}

/// Result type for retargeting operations.
pub type RetargetResult<T> = Result<T, RetargetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_actionable() {
        let err = RetargetError::SingularSystem("system matrix has a zero pivot".to_string());
        let msg = err.to_string();
        assert!(msg.contains("different function or radius"));
        assert!(msg.contains("zero pivot"));

        let err = RetargetError::NonInvertibleDestination {
            object: "Body".into(),
        };
        assert!(err.to_string().contains("disable object transforms"));
        assert!(!err.is_target_local());

        let err = RetargetError::PointCountMismatch {
            source_points: 8,
            destination_points: 6,
        };
        assert!(err.to_string().contains("source has 8"));
        assert!(err.to_string().contains("destination has 6"));
    }

    #[test]
    fn target_local_classification() {
        assert!(
            RetargetError::NoDependentPoints {
                target: "Hat".into()
            }
            .is_target_local()
        );
        assert!(
            RetargetError::NonInvertibleTransform {
                object: "Hat".into()
            }
            .is_target_local()
        );
        assert!(!RetargetError::EmptySource.is_target_local());
        assert!(!RetargetError::SingularSystem(String::new()).is_target_local());
    }
}
