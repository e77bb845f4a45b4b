//! ECS components for the velocity command pipeline.
//!
//! Submodules overview:
//! - [`model`] – markers identifying models and their links (sub-parts)
//! - [`velocitycmd`] – linear and angular velocity commands read by the integrator

pub mod model;
pub mod velocitycmd;
