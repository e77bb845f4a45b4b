//! Velocity command pipeline for simulated models.
//!
//! Velocity commands arrive asynchronously over a publish/subscribe transport,
//! one topic addressing a whole model and one topic per tracked link. They are
//! buffered in a mutex-guarded [`SharedCommandState`] and applied to the ECS
//! world at step boundaries: the Apply phase writes velocity command
//! components before integration, the Drain phase turns newly arrived link
//! messages into link velocities after it.
//!
//! [`SharedCommandState`]: resources::commandstate::SharedCommandState

pub mod components;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;
