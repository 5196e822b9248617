#![allow(dead_code)]

pub use log::{info, warn};

pub type Mat = nalgebra::DMatrix<f64>;
pub type DVec = nalgebra::DVector<f64>;

/// Machine-epsilon scale used for gradient skip tests and step-size floors
pub const EPS: f64 = 2.0 * f64::EPSILON;
