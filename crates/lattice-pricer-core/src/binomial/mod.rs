pub mod analytic;
pub mod convergence;
pub mod lattice;
pub mod model;

#[cfg(feature = "surface")]
pub mod surface;
