//! Dense numeric utilities shared by the latent Gaussian-process crates:
//! squared-exponential kernels, SVD-based generalized inverses,
//! autoregressive design matrices, seeded sampling, and delimited-text IO.

pub mod common;
pub mod common_io;
pub mod design;
pub mod kernel;
pub mod linalg;
pub mod sampling;
