//! Common utilities for the geodesic visualizations
//!
//! Window and GPU setup, the cameras driven by user input, and small buffer
//! and texture helpers shared by the renderers.

pub mod graphics;
pub mod camera;

pub use graphics::*;
pub use camera::*;
