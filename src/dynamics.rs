use na::Vector3;

use crate::{
    rigid_body::{RigidBody, RigidBodyState, StateVector},
    types::Float,
    util::star,
};

/// Net external force and torque on a body, both in world frame.
///
/// The adaptive solver evaluates the law with speculative intermediate
/// states that may be discarded, so implementations must be free of
/// side effects.
pub trait ForceTorque {
    fn eval(&self, t: Float, state: &RigidBodyState) -> (Vector3<Float>, Vector3<Float>);
}

impl<F> ForceTorque for F
where
    F: Fn(Float, &RigidBodyState) -> (Vector3<Float>, Vector3<Float>),
{
    fn eval(&self, t: Float, state: &RigidBodyState) -> (Vector3<Float>, Vector3<Float>) {
        self(t, state)
    }
}

/// Constant force and torque, independent of time and state.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantWrench {
    pub force: Vector3<Float>,
    pub torque: Vector3<Float>,
}

impl ConstantWrench {
    pub fn new(force: Vector3<Float>, torque: Vector3<Float>) -> Self {
        ConstantWrench { force, torque }
    }

    pub fn zero() -> Self {
        ConstantWrench::new(Vector3::zeros(), Vector3::zeros())
    }
}

impl ForceTorque for ConstantWrench {
    fn eval(&self, _t: Float, _state: &RigidBodyState) -> (Vector3<Float>, Vector3<Float>) {
        (self.force, self.torque)
    }
}

/// How angular velocity is recovered from world-frame angular momentum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AngularVelocityFrame {
    /// ω = I_body⁻¹ · L, applying the body-frame inverse tensor to the
    /// world-frame momentum as-is. Exact for isotropic tensors; for
    /// anisotropic tensors this skips the rotation of the tensor into
    /// world frame.
    BodyTensor,
    /// ω = R · I_body⁻¹ · Rᵀ · L, the world-frame inertia form.
    WorldFrameInertia,
}

pub fn angular_velocity(
    body: &RigidBody,
    state: &RigidBodyState,
    frame: AngularVelocityFrame,
) -> Vector3<Float> {
    match frame {
        AngularVelocityFrame::BodyTensor => body.inertia_inv * state.angular_momentum,
        AngularVelocityFrame::WorldFrameInertia => {
            let r = &state.orientation;
            r * body.inertia_inv * r.transpose() * state.angular_momentum
        }
    }
}

/// Rates of change of the flat state:
///     dx/dt = h / m
///     dR/dt = star(ω) · R
///     dh/dt = force
///     dL/dt = torque
///     dt/dt = 1
/// where h is linear momentum and L is angular momentum.
pub fn rigid_body_rates(
    body: &RigidBody,
    law: &dyn ForceTorque,
    frame: AngularVelocityFrame,
    t: Float,
    y: &StateVector,
) -> StateVector {
    let state = RigidBodyState::from_flat(y);
    let (force, torque) = law.eval(t, &state);

    let velocity = state.linear_momentum / body.mass;
    let omega = angular_velocity(body, &state, frame);
    let orientation_rate = star(&omega) * state.orientation;

    RigidBodyState {
        position: velocity,
        orientation: orientation_rate,
        linear_momentum: force,
        angular_momentum: torque,
        time: 1.0,
    }
    .to_flat()
}
