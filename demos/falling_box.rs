use itertools::izip;
use nalgebra::{vector, Matrix3};
use tumble_physics::{
    dynamics::ConstantWrench,
    plot::plot,
    rigid_body::{RigidBody, RigidBodyState},
    simulate::Simulation,
    types::Float,
};

/// Box tumbling under a constant downward force and a small z torque,
/// until it falls below the explosion altitude.
pub fn main() {
    let body = RigidBody::new(1.0, Matrix3::identity()).unwrap();
    let law = ConstantWrench::new(vector![0.0, -1.0, 0.0], vector![0.0, 0.0, 0.1]);
    let mut sim = Simulation::new(body, RigidBodyState::default(), Box::new(law));

    let dt = 0.1;
    let explosion_altitude = -1600.0;

    let mut times: Vec<Float> = vec![];
    let mut heights: Vec<Float> = vec![];
    let mut angles: Vec<Float> = vec![];

    let mut t = 0.0;
    loop {
        t += dt;
        sim.step(t).expect("integration failed");
        sim.orthonormalize_orientation()
            .expect("orientation degenerated");

        let (mut angle, axis) = sim.orientation_angle(&vector![1.0, 0.0, 0.0]);
        if axis.z < 0.0 {
            angle *= -1.0;
        }
        let pos = sim.position();

        times.push(t);
        heights.push(pos.y);
        angles.push(angle);

        if pos.y < explosion_altitude {
            println!("exploded at t = {:.1}s, y = {:.1}", t, pos.y);
            break;
        }
    }

    for (t, y, angle) in izip!(times.iter(), heights.iter(), angles.iter()).step_by(50) {
        println!("t = {:5.1}s   y = {:8.1}   angle = {:7.2}°", t, y, angle);
    }

    let num_steps = times.len();
    plot(&heights, t, dt, num_steps, "height");
    plot(&angles, t, dt, num_steps, "angle");
}
