use itertools::izip;
use nalgebra::vector;
use tumble_physics::{
    dynamics::ConstantWrench,
    plot::plot,
    rigid_body::{RigidBody, RigidBodyState},
    simulate::{simulate, Simulation},
    types::Float,
};

/// Torque-free cube tumbling about a skew axis. Angular momentum
/// should stay constant while the orientation winds up.
pub fn main() {
    let body = RigidBody::new_cube(3.0, 1.0).unwrap();
    let mut state = RigidBodyState::default();
    state.angular_momentum = vector![0.2, 0.0, 0.5];
    let mut sim = Simulation::new(body, state, Box::new(ConstantWrench::zero()));

    let final_time = 10.0;
    let dt = 0.02;
    let (times, states) = simulate(&mut sim, final_time, dt).expect("integration failed");

    let l0 = states.first().unwrap().angular_momentum.norm();
    let l1 = states.last().unwrap().angular_momentum.norm();
    println!("|L| drift over {final_time}s: {:.3e}", (l1 - l0).abs());

    let angles: Vec<Float> = states
        .iter()
        .map(|state| state.orientation_angle(&vector![1.0, 0.0, 0.0]).0)
        .collect();

    for (t, angle) in izip!(times.iter(), angles.iter()).step_by(100) {
        println!("t = {:5.2}s   angle = {:7.2}°", t, angle);
    }

    plot(&angles, final_time, dt, times.len(), "tumble_angle");
}
