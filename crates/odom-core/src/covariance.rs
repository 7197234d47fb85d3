//! Static uncertainty model.
//!
//! The encoder only observes motion along x. Every other axis gets a large
//! sentinel variance so a downstream filter ignores it instead of trusting a
//! fabricated near-zero value.

use odom_types::{COVARIANCE_DIM, Covariance};

/// Variance that marks an axis as "not estimated".
pub const UNKNOWN_VARIANCE: f64 = 999.0;

/// Index of the x axis in the (x, y, z, roll, pitch, yaw) ordering.
pub const X_AXIS: usize = 0;

/// Build the covariance block shared by every velocity publication.
///
/// Off-diagonal entries are 0 (uncorrelated), the x variance is
/// `uncertainty_fixed`, and all other diagonal entries are
/// [`UNKNOWN_VARIANCE`].
///
/// ```
/// use odom_core::covariance::{build_covariance, UNKNOWN_VARIANCE};
///
/// let cov = build_covariance(1e-3);
/// assert_eq!(cov.get(0, 0), 1e-3);
/// assert_eq!(cov.get(5, 5), UNKNOWN_VARIANCE);
/// assert_eq!(cov.get(0, 5), 0.0);
/// ```
pub fn build_covariance(uncertainty_fixed: f64) -> Covariance {
    let mut cov = Covariance::zeroed();
    for axis in 0..COVARIANCE_DIM {
        cov.set(axis, axis, UNKNOWN_VARIANCE);
    }
    cov.set(X_AXIS, X_AXIS, uncertainty_fixed);
    cov
}
