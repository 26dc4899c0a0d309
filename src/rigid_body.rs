use na::{vector, Matrix3, SVector, Vector3};

use crate::{
    error::{Result, SimError},
    types::Float,
};

/// Inertia tensors whose determinant magnitude falls below this are
/// treated as singular.
pub const INERTIA_DET_EPS: Float = 1e-12;

/// Flat solver-boundary layout of the dynamical state:
/// [position (3), orientation rows (9), linear momentum (3),
/// angular momentum (3), time (1)].
pub type StateVector = SVector<Float, 19>;

/// Immutable mass properties of a body: mass, body-frame inertia
/// tensor, and its cached inverse. Every derivative evaluation needs
/// the inverse, so it is computed once at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pub mass: Float,
    pub inertia: Matrix3<Float>,
    pub inertia_inv: Matrix3<Float>,
}

impl RigidBody {
    pub fn new(mass: Float, inertia: Matrix3<Float>) -> Result<Self> {
        if mass <= 0.0 {
            return Err(SimError::invalid_parameter(format!(
                "mass must be positive, got {mass}"
            )));
        }
        if inertia.determinant().abs() < INERTIA_DET_EPS {
            return Err(SimError::invalid_parameter(format!(
                "inertia tensor is singular, determinant {}",
                inertia.determinant()
            )));
        }
        let inertia_inv = inertia.try_inverse().ok_or_else(|| {
            SimError::invalid_parameter("inertia tensor is not invertible")
        })?;

        Ok(RigidBody {
            mass,
            inertia,
            inertia_inv,
        })
    }

    /// Solid cube of mass m and side length l.
    pub fn new_cube(m: Float, l: Float) -> Result<Self> {
        let moment_x = m * l * l / 6.0;
        let moment = Matrix3::from_diagonal(&vector![moment_x, moment_x, moment_x]);
        Self::new(m, moment)
    }

    /// Solid cuboid of mass m with width w, depth d and height h.
    pub fn new_cuboid(m: Float, w: Float, d: Float, h: Float) -> Result<Self> {
        let moment_x = m * (d * d + h * h) / 12.0;
        let moment_y = m * (w * w + h * h) / 12.0;
        let moment_z = m * (w * w + d * d) / 12.0;
        let moment = Matrix3::from_diagonal(&vector![moment_x, moment_y, moment_z]);
        Self::new(m, moment)
    }

    /// Solid sphere of mass m and radius r.
    pub fn new_sphere(m: Float, r: Float) -> Result<Self> {
        let moment_x = 2.0 / 5.0 * m * r * r;
        let moment = Matrix3::from_diagonal(&vector![moment_x, moment_x, moment_x]);
        Self::new(m, moment)
    }
}

/// Complete dynamical state of one body.
///
/// The orientation matrix degrades under integration and is restored
/// by [`crate::util::orthonormalize`] at a cadence the caller picks.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBodyState {
    /// World-frame center of mass.
    pub position: Vector3<Float>,
    /// Rotation matrix, body to world.
    pub orientation: Matrix3<Float>,
    pub linear_momentum: Vector3<Float>,
    /// World-frame angular momentum.
    pub angular_momentum: Vector3<Float>,
    /// Simulation clock, monotonically non-decreasing.
    pub time: Float,
}

impl RigidBodyState {
    pub fn new(
        position: Vector3<Float>,
        orientation: Matrix3<Float>,
        linear_momentum: Vector3<Float>,
        angular_momentum: Vector3<Float>,
    ) -> Self {
        RigidBodyState {
            position,
            orientation,
            linear_momentum,
            angular_momentum,
            time: 0.0,
        }
    }

    /// Body at rest at the given position, identity orientation.
    pub fn at_rest(position: Vector3<Float>) -> Self {
        RigidBodyState::new(
            position,
            Matrix3::identity(),
            Vector3::zeros(),
            Vector3::zeros(),
        )
    }

    /// Angle in degrees between `reference` and its image under the
    /// orientation, and the rotation axis between the two.
    ///
    /// The axis is the cross product of the two vectors; it is
    /// numerically meaningless when the angle is near 0° or 180°, even
    /// though the angle itself stays well defined. `reference` must be
    /// nonzero.
    pub fn orientation_angle(
        &self,
        reference: &Vector3<Float>,
    ) -> (Float, Vector3<Float>) {
        let image = self.orientation * reference;
        let cosang =
            (reference.dot(&image) / (reference.norm() * image.norm())).clamp(-1.0, 1.0);
        let axis = reference.cross(&image);
        (cosang.acos().to_degrees(), axis)
    }

    /// Pack into the flat layout the solver integrates.
    #[rustfmt::skip]
    pub fn to_flat(&self) -> StateVector {
        let p = &self.position;
        let r = &self.orientation;
        let h = &self.linear_momentum;
        let l = &self.angular_momentum;
        SVector::<Float, 19>::from_column_slice(&[
            p.x, p.y, p.z,
            r[(0, 0)], r[(0, 1)], r[(0, 2)],
            r[(1, 0)], r[(1, 1)], r[(1, 2)],
            r[(2, 0)], r[(2, 1)], r[(2, 2)],
            h.x, h.y, h.z,
            l.x, l.y, l.z,
            self.time,
        ])
    }

    /// Unpack from the flat solver layout.
    #[rustfmt::skip]
    pub fn from_flat(y: &StateVector) -> Self {
        RigidBodyState {
            position: vector![y[0], y[1], y[2]],
            orientation: Matrix3::new(
                y[3], y[4], y[5],
                y[6], y[7], y[8],
                y[9], y[10], y[11],
            ),
            linear_momentum: vector![y[12], y[13], y[14]],
            angular_momentum: vector![y[15], y[16], y[17]],
            time: y[18],
        }
    }
}

impl Default for RigidBodyState {
    fn default() -> Self {
        RigidBodyState::at_rest(Vector3::zeros())
    }
}
