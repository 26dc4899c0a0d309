use na::Vector3;

use crate::{
    dynamics::{rigid_body_rates, AngularVelocityFrame, ForceTorque},
    error::{Result, SimError},
    integrators::Dopri8,
    rigid_body::{RigidBody, RigidBodyState, StateVector},
    types::Float,
    util::orthonormalize,
};

/// One body's simulation session: constants, state, force/torque law,
/// and an exclusively owned adaptive solver context.
///
/// Sessions are independent; integrating several bodies in parallel
/// just means one `Simulation` per body, each with its own context.
pub struct Simulation {
    pub body: RigidBody,
    pub state: RigidBodyState,
    law: Box<dyn ForceTorque>,
    solver: Dopri8,
    omega_frame: AngularVelocityFrame,
}

impl Simulation {
    pub fn new(body: RigidBody, state: RigidBodyState, law: Box<dyn ForceTorque>) -> Self {
        Simulation::with_solver(body, state, law, Dopri8::new())
    }

    pub fn with_solver(
        body: RigidBody,
        state: RigidBodyState,
        law: Box<dyn ForceTorque>,
        solver: Dopri8,
    ) -> Self {
        Simulation {
            body,
            state,
            law,
            solver,
            omega_frame: AngularVelocityFrame::BodyTensor,
        }
    }

    /// Switch how angular velocity is recovered from angular momentum.
    pub fn set_angular_velocity_frame(&mut self, frame: AngularVelocityFrame) {
        self.omega_frame = frame;
    }

    /// Replace the force/torque law for subsequent steps.
    pub fn set_law(&mut self, law: Box<dyn ForceTorque>) {
        self.law = law;
    }

    /// Advance the state to exactly `target_time`.
    ///
    /// On failure the state keeps its last successfully integrated
    /// value; a stale pose is never passed off as a fresh one.
    pub fn step(&mut self, target_time: Float) -> Result<&RigidBodyState> {
        let t0 = self.state.time;
        if target_time < t0 {
            return Err(SimError::invalid_parameter(format!(
                "target time {target_time} is before current time {t0}"
            )));
        }
        if target_time == t0 {
            return Ok(&self.state);
        }

        let y0 = self.state.to_flat();
        let y1 = self.solver.integrate(
            |t, y: &StateVector| {
                rigid_body_rates(&self.body, self.law.as_ref(), self.omega_frame, t, y)
            },
            t0,
            &y0,
            target_time,
        )?;

        self.state = RigidBodyState::from_flat(&y1);
        self.state.time = target_time;
        Ok(&self.state)
    }

    /// World-frame center of mass.
    pub fn position(&self) -> Vector3<Float> {
        self.state.position
    }

    /// Angle in degrees between `reference` and its image under the
    /// current orientation, plus the rotation axis between the two.
    /// See [`RigidBodyState::orientation_angle`] for the degenerate
    /// axis caveat near 0° and 180°.
    pub fn orientation_angle(&self, reference: &Vector3<Float>) -> (Float, Vector3<Float>) {
        self.state.orientation_angle(reference)
    }

    /// Undo accumulated orthonormality drift in the orientation.
    ///
    /// Left to the caller's cadence (e.g. once per rendered frame):
    /// the correction trades accuracy for cost and is not needed every
    /// substep.
    pub fn orthonormalize_orientation(&mut self) -> Result<()> {
        self.state.orientation = orthonormalize(&self.state.orientation)?;
        Ok(())
    }

    /// Discontinuously replace the body's momenta, e.g. as the
    /// response to a detected collision.
    ///
    /// This is deliberately separate from [`Simulation::step`]: the
    /// solver context is re-seeded so the next step starts fresh
    /// instead of warm-starting across the discontinuity.
    pub fn apply_collision_event(
        &mut self,
        linear_momentum: Vector3<Float>,
        angular_momentum: Vector3<Float>,
    ) {
        self.state.linear_momentum = linear_momentum;
        self.state.angular_momentum = angular_momentum;
        self.solver.reset();
    }
}

/// Drive a session with a fixed frame time from its current clock to
/// `final_time`, re-orthonormalizing the orientation once per frame.
/// Returns the frame times and states, starting with the initial ones.
pub fn simulate(
    sim: &mut Simulation,
    final_time: Float,
    dt: Float,
) -> Result<(Vec<Float>, Vec<RigidBodyState>)> {
    if dt <= 0.0 {
        return Err(SimError::invalid_parameter(format!(
            "frame time must be positive, got {dt}"
        )));
    }

    let mut t = sim.state.time;
    let mut times = vec![t];
    let mut states = vec![sim.state.clone()];
    while t < final_time {
        t = (t + dt).min(final_time);
        sim.step(t)?;
        sim.orthonormalize_orientation()?;
        times.push(t);
        states.push(sim.state.clone());
    }

    Ok((times, states))
}

#[cfg(test)]
mod simulate_tests {
    use itertools::izip;
    use na::{vector, Matrix3};

    use super::*;
    use crate::{assert_close, assert_vec_close, dynamics::ConstantWrench};

    fn free_body(mass: Float) -> Simulation {
        let body = RigidBody::new(mass, Matrix3::identity()).unwrap();
        Simulation::new(body, RigidBodyState::default(), Box::new(ConstantWrench::zero()))
    }

    #[test]
    fn zero_wrench_drifts_linearly() {
        // Arrange
        let mut sim = free_body(2.0);
        sim.state.position = vector![1.0, 2.0, 3.0];
        sim.state.linear_momentum = vector![4.0, -2.0, 0.0];

        // Act
        sim.step(10.0).unwrap();

        // Assert: position(t) = position(0) + t * momentum / mass
        assert_vec_close!(sim.position(), vector![21.0, -8.0, 3.0], 1e-9);
        assert_vec_close!(sim.state.linear_momentum, vector![4.0, -2.0, 0.0], 1e-9);
        assert_vec_close!(sim.state.orientation, Matrix3::<Float>::identity(), 1e-9);
        assert_close!(sim.state.time, 10.0, 0.0);
    }

    #[test]
    fn zero_torque_keeps_identity_orientation() {
        let mut sim = free_body(1.0);
        sim.state.linear_momentum = vector![1.0, 0.0, 0.0];

        let mut t = 0.0;
        for _ in 0..100 {
            t += 0.1;
            sim.step(t).unwrap();
        }

        assert_vec_close!(sim.state.orientation, Matrix3::<Float>::identity(), 1e-6);
    }

    #[test]
    fn zero_wrench_conserves_momentum_magnitudes() {
        let mut sim = free_body(1.0);
        sim.state.linear_momentum = vector![3.0, 0.0, 4.0];
        sim.state.angular_momentum = vector![0.0, 5.0, 12.0];

        sim.step(25.0).unwrap();

        assert_close!(sim.state.linear_momentum.norm(), 5.0, 1e-9);
        assert_close!(sim.state.angular_momentum.norm(), 13.0, 1e-9);
    }

    #[test]
    fn constant_force_quadratic_fall() {
        // mass 1, force (0,-1,0), starting at rest:
        // momentum.y = -t, so position.y = -t^2 / 2
        let body = RigidBody::new(1.0, Matrix3::identity()).unwrap();
        let law = ConstantWrench::new(vector![0.0, -1.0, 0.0], Vector3::zeros());
        let mut sim = Simulation::new(body, RigidBodyState::default(), Box::new(law));

        sim.step(10.0).unwrap();

        assert_close!(sim.position().y, -50.0, 1e-7);
        assert_close!(sim.state.linear_momentum.y, -10.0, 1e-9);
    }

    #[test]
    fn constant_torque_spins_up_monotonically() {
        // mass 1, identity inertia, torque (0,0,0.1): angular momentum
        // grows as 0.1 t and the body winds up about the z axis.
        let body = RigidBody::new(1.0, Matrix3::identity()).unwrap();
        let law = ConstantWrench::new(Vector3::zeros(), vector![0.0, 0.0, 0.1]);
        let mut sim = Simulation::new(body, RigidBodyState::default(), Box::new(law));

        let mut t = 0.0;
        let mut prev_angle = 0.0;
        while t < 5.0 - 1e-9 {
            t += 0.1;
            sim.step(t).unwrap();

            let (angle, axis) = sim.orientation_angle(&vector![1.0, 0.0, 0.0]);
            assert!(angle > prev_angle, "angle {angle} did not grow at t = {t}");
            assert!(axis.z > 0.0);
            prev_angle = angle;
        }

        assert_close!(sim.state.angular_momentum.z, 0.5, 1e-9);
        // with omega(t) = 0.1 t the wound-up angle is 0.05 t^2
        let expected_deg = (0.05 * 5.0 * 5.0 as Float).to_degrees();
        assert_close!(prev_angle, expected_deg, 1e-3);
    }

    #[test]
    fn split_step_matches_single_step() {
        let make = || {
            let body = RigidBody::new_cuboid(2.0, 1.0, 2.0, 3.0).unwrap();
            let law = ConstantWrench::new(vector![0.3, -1.0, 0.2], vector![0.05, 0.1, -0.02]);
            let mut state = RigidBodyState::default();
            state.linear_momentum = vector![1.0, 0.0, -1.0];
            state.angular_momentum = vector![0.0, 0.4, 0.1];
            Simulation::new(body, state, Box::new(law))
        };

        let mut single = make();
        single.step(1.0).unwrap();

        let mut split = make();
        split.step(0.5).unwrap();
        split.step(1.0).unwrap();

        assert_vec_close!(single.position(), split.position(), 1e-6);
        assert_vec_close!(
            single.state.linear_momentum,
            split.state.linear_momentum,
            1e-6
        );
        assert_vec_close!(single.state.orientation, split.state.orientation, 1e-6);
    }

    #[test]
    fn backwards_target_is_rejected() {
        let mut sim = free_body(1.0);
        sim.step(1.0).unwrap();

        let result = sim.step(0.5);

        assert!(matches!(result, Err(SimError::InvalidParameter(_))));
        assert_close!(sim.state.time, 1.0, 0.0);
    }

    #[test]
    fn step_to_current_time_is_a_no_op() {
        let mut sim = free_body(1.0);
        sim.state.linear_momentum = vector![1.0, 0.0, 0.0];
        sim.step(2.0).unwrap();
        let before = sim.state.clone();

        sim.step(2.0).unwrap();

        assert_eq!(sim.state, before);
    }

    #[test]
    fn collision_event_restarts_from_new_momentum() {
        // Fall for a while, then reflect the vertical momentum as a
        // crude bounce and keep integrating.
        let body = RigidBody::new(1.0, Matrix3::identity()).unwrap();
        let law = ConstantWrench::new(vector![0.0, -1.0, 0.0], Vector3::zeros());
        let mut sim = Simulation::new(body, RigidBodyState::default(), Box::new(law));

        sim.step(4.0).unwrap();
        assert_close!(sim.state.linear_momentum.y, -4.0, 1e-9);

        let reflected = vector![0.0, 4.0, 0.0];
        sim.apply_collision_event(reflected, Vector3::zeros());
        sim.step(5.0).unwrap();

        // momentum resumes from +4 and decays under the constant force
        assert_close!(sim.state.linear_momentum.y, 3.0, 1e-9);
        assert_close!(sim.state.time, 5.0, 0.0);
    }

    #[test]
    fn rebinding_the_law_takes_effect() {
        let mut sim = free_body(1.0);
        sim.step(1.0).unwrap();
        assert_vec_close!(sim.state.linear_momentum, Vector3::<Float>::zeros(), 1e-12);

        sim.set_law(Box::new(ConstantWrench::new(
            vector![1.0, 0.0, 0.0],
            Vector3::zeros(),
        )));
        sim.step(3.0).unwrap();

        assert_close!(sim.state.linear_momentum.x, 2.0, 1e-9);
    }

    #[test]
    fn simulate_returns_orthonormal_frames() {
        let body = RigidBody::new_cube(3.0, 1.0).unwrap();
        let mut state = RigidBodyState::default();
        state.angular_momentum = vector![0.2, 0.0, 0.5];
        let mut sim = Simulation::new(body, state, Box::new(ConstantWrench::zero()));

        let (times, states) = simulate(&mut sim, 2.0, 0.1).unwrap();

        assert_eq!(times.len(), 21);
        assert_eq!(states.len(), 21);
        for (t, state) in izip!(times.iter(), states.iter()) {
            assert_close!(state.time, *t, 1e-12);
            let residual = state.orientation * state.orientation.transpose();
            assert_vec_close!(residual, Matrix3::<Float>::identity(), 1e-9);
        }
    }

    #[test]
    fn simulate_rejects_non_positive_frame_time() {
        let mut sim = free_body(1.0);

        let result = simulate(&mut sim, 1.0, 0.0);

        assert!(matches!(result, Err(SimError::InvalidParameter(_))));
    }
}
