//! Velocity command components.
//!
//! [`LinearVelocityCmd`] and [`AngularVelocityCmd`] hold the velocity the
//! integrator should drive an entity (model or link) to during the current
//! step. They are written by
//! [`VelocityControl::pre_update`](crate::systems::velocitycontrol::VelocityControl::pre_update)
//! and read (and usually consumed) by whatever integrates the world.
//!
//! Writing a command inserts the component when the entity does not carry it
//! yet and overwrites it otherwise.

use bevy_ecs::prelude::Component;
use glam::DVec3;

/// Commanded linear velocity in world units per second.
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct LinearVelocityCmd(pub DVec3);

/// Commanded angular velocity in radians per second.
#[derive(Component, Clone, Copy, Debug, PartialEq, Default)]
pub struct AngularVelocityCmd(pub DVec3);

impl LinearVelocityCmd {
    pub fn value(&self) -> DVec3 {
        self.0
    }
}

impl AngularVelocityCmd {
    pub fn value(&self) -> DVec3 {
        self.0
    }
}
