#![allow(non_snake_case)]

use types::Float;
pub extern crate nalgebra as na;

pub mod dynamics;
pub mod error;
pub mod integrators;
pub mod plot;
pub mod rigid_body;
pub mod simulate;
pub mod types;
pub mod util;

pub const GRAVITY: Float = 9.81;

pub const PI: Float = std::f64::consts::PI;
pub const TWO_PI: Float = 2.0 * PI;
