//! Consumption of velocity command components.
//!
//! The integrator is not part of this crate. [`consume_velocity_commands`]
//! plays its role at the component boundary for headless runs and tests: it
//! takes every velocity command component out of the world, exactly like an
//! integrator that reads a command once per step. After it runs, only
//! commands written by the next Apply phase are visible.

use bevy_ecs::prelude::*;
use glam::DVec3;

use crate::components::velocitycmd::{AngularVelocityCmd, LinearVelocityCmd};

/// Velocity commands taken from one entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityCommandSample {
    pub entity: Entity,
    pub linear: Option<DVec3>,
    pub angular: Option<DVec3>,
}

/// Remove all velocity command components, returning them sorted by entity.
pub fn consume_velocity_commands(world: &mut World) -> Vec<VelocityCommandSample> {
    let mut query = world.query_filtered::<
        Entity,
        Or<(With<LinearVelocityCmd>, With<AngularVelocityCmd>)>,
    >();
    let mut entities: Vec<Entity> = query.iter(world).collect();
    entities.sort();

    entities
        .into_iter()
        .map(|entity| {
            let mut entity_mut = world.entity_mut(entity);
            VelocityCommandSample {
                entity,
                linear: entity_mut.take::<LinearVelocityCmd>().map(|cmd| cmd.value()),
                angular: entity_mut.take::<AngularVelocityCmd>().map(|cmd| cmd.value()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_taken_once() {
        let mut world = World::new();
        let a = world.spawn(LinearVelocityCmd(DVec3::X)).id();
        let b = world
            .spawn((LinearVelocityCmd(DVec3::Y), AngularVelocityCmd(DVec3::Z)))
            .id();
        world.spawn_empty();

        let samples = consume_velocity_commands(&mut world);
        assert_eq!(
            samples,
            vec![
                VelocityCommandSample {
                    entity: a,
                    linear: Some(DVec3::X),
                    angular: None,
                },
                VelocityCommandSample {
                    entity: b,
                    linear: Some(DVec3::Y),
                    angular: Some(DVec3::Z),
                },
            ]
        );
        assert!(world.get::<LinearVelocityCmd>(a).is_none());
        assert!(consume_velocity_commands(&mut world).is_empty());
    }
}
