//! Registry of attached velocity controllers.
//!
//! Each attached model owns exactly one [`VelocityControl`]; controllers do
//! not share any state, so several models can be driven independently in the
//! same world. Removing a controller drops its transport subscriptions.

use bevy_ecs::prelude::{Entity, Resource};

use crate::systems::velocitycontrol::VelocityControl;

#[derive(Resource, Default)]
pub struct VelocityControllers {
    controllers: Vec<VelocityControl>,
}

impl VelocityControllers {
    pub fn push(&mut self, controller: VelocityControl) {
        self.controllers.push(controller);
    }

    pub fn iter(&self) -> impl Iterator<Item = &VelocityControl> {
        self.controllers.iter()
    }

    /// Controller attached to `model`, if any.
    pub fn get(&self, model: Entity) -> Option<&VelocityControl> {
        self.controllers.iter().find(|c| c.model() == model)
    }

    /// Detach and return the controller attached to `model`.
    pub fn remove(&mut self, model: Entity) -> Option<VelocityControl> {
        let index = self.controllers.iter().position(|c| c.model() == model)?;
        Some(self.controllers.remove(index))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
