//! Engine systems.
//!
//! Submodules overview
//! - [`consume`] – take velocity command components out of the world once per step
//! - [`ingest`] – transport callbacks that buffer inbound velocity messages
//! - [`linkresolver`] – resolve configured link names to link entities
//! - [`time`] – update per-step simulation information
//! - [`velocitycontrol`] – apply/drain phases and the exclusive systems running them

pub mod consume;
pub mod ingest;
pub mod linkresolver;
pub mod time;
pub mod velocitycontrol;
