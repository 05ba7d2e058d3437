//! Photon geodesics around Schwarzschild and Kerr black holes
//!
//! The physics core (`params`, `metric`, `integrator`, `rays`) is pure `f64`
//! code shared by two front ends: a side-by-side trajectory view and a
//! gravitational lensing view with CPU and GPU evaluation of the sky.

pub mod background;
pub mod equations_ui;
pub mod integrator;
pub mod lensing;
pub mod metric;
pub mod params;
pub mod rays;
pub mod renderer;
pub mod side_view;
pub mod trajectory;

pub use integrator::{Integrator, IntegratorConfig, Outcome, TerminationResult, Tracer};
pub use metric::{ConservedQuantities, MetricVariant, PhotonState};
pub use params::{BlackHoleParams, ParamDelta};
