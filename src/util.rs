use na::{Matrix3, Vector3};

use crate::error::{Result, SimError};
use crate::types::Float;

/// Rows shorter than this cannot be normalized meaningfully.
const ROW_NORM_EPS: Float = 1e-9;

/// Skew-symmetric cross-product matrix of v, such that
/// star(v) * w == v × w for any w.
#[rustfmt::skip]
pub fn star(v: &Vector3<Float>) -> Matrix3<Float> {
    Matrix3::new(
        0.0,  -v.z,  v.y,
        v.z,   0.0, -v.x,
        -v.y,  v.x,  0.0,
    )
}

/// Restore a drifted rotation matrix to orthonormality.
///
/// Row 0 is authoritative: it is normalized in place, row 2 is rebuilt
/// from rows 0 × 1, and row 1 is rebuilt from rows 2 × 0. Accumulated
/// error therefore gets pushed out of row 0 and into rows 1 and 2.
pub fn orthonormalize(m: &Matrix3<Float>) -> Result<Matrix3<Float>> {
    let r1 = m.row(1).transpose();

    let r0 = normalize_row(&m.row(0).transpose())?;
    let r2 = normalize_row(&r0.cross(&r1))?;
    let r1 = normalize_row(&r2.cross(&r0))?;

    Ok(Matrix3::from_rows(&[
        r0.transpose(),
        r1.transpose(),
        r2.transpose(),
    ]))
}

fn normalize_row(r: &Vector3<Float>) -> Result<Vector3<Float>> {
    let norm = r.norm();
    if norm < ROW_NORM_EPS {
        return Err(SimError::NumericalDegeneracy { norm });
    }
    Ok(r / norm)
}

#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        let left = $left;
        let right = $right;
        let tol = $tolerance;
        let diff = (left - right).abs();
        if diff > tol {
            panic!(
                "assertion failed: {} ~= {} \
                (tolerance: {}, difference: {})",
                left, right, tol, diff
            );
        }
    };
}

#[macro_export]
macro_rules! assert_vec_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        let left = $left;
        let right = $right;
        let tol = $tolerance;
        for (a, b) in left.iter().zip(right.iter()) {
            crate::assert_close!(a, b, tol);
        }
    };
}

#[cfg(test)]
pub mod test_utils {
    use na::{vector, Matrix3, UnitQuaternion, Vector3};
    use rand::{rngs::ThreadRng, Rng};

    use crate::types::Float;

    /// Build a Vector3 where each element is random between (-range, range)
    pub fn random_vector(rng: &mut ThreadRng, range: Float) -> Vector3<Float> {
        vector![
            rng.random_range(-range..range),
            rng.random_range(-range..range),
            rng.random_range(-range..range)
        ]
    }

    /// Build a rotation matrix from Euler angles, where each angle is
    /// random between (-range, range)
    pub fn random_rotation(rng: &mut ThreadRng, range: Float) -> Matrix3<Float> {
        UnitQuaternion::from_euler_angles(
            rng.random_range(-range..range),
            rng.random_range(-range..range),
            rng.random_range(-range..range),
        )
        .to_rotation_matrix()
        .into_inner()
    }
}
