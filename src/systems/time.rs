//! Step information update.
//!
//! Updates the shared [`UpdateInfo`](crate::resources::updateinfo::UpdateInfo)
//! resource once per simulation step, before the pre-update phase runs.
use bevy_ecs::prelude::*;

use crate::resources::updateinfo::UpdateInfo;

/// Record the step delta and paused flag on the `UpdateInfo` resource.
///
/// Paused steps keep `sim_time` and `iterations` unchanged. Inserts the
/// resource with default values first if the world does not have one yet.
pub fn advance_update_info(world: &mut World, dt: f64, paused: bool) {
    let mut info = world.get_resource_or_insert_with(UpdateInfo::default);
    info.dt = dt;
    info.paused = paused;
    if !paused {
        info.sim_time += dt;
        info.iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaused_step_advances_time() {
        let mut world = World::new();
        advance_update_info(&mut world, 0.5, false);
        advance_update_info(&mut world, 0.25, false);
        let info = world.resource::<UpdateInfo>();
        assert!((info.sim_time - 0.75).abs() < 1e-12);
        assert_eq!(info.iterations, 2);
        assert!(!info.paused);
    }

    #[test]
    fn paused_step_keeps_time() {
        let mut world = World::new();
        advance_update_info(&mut world, 0.5, false);
        advance_update_info(&mut world, 0.5, true);
        let info = world.resource::<UpdateInfo>();
        assert!((info.sim_time - 0.5).abs() < 1e-12);
        assert_eq!(info.iterations, 1);
        assert!(info.paused);
    }

    #[test]
    fn negative_delta_is_recorded() {
        let mut world = World::new();
        advance_update_info(&mut world, 1.0, false);
        advance_update_info(&mut world, -0.5, false);
        let info = world.resource::<UpdateInfo>();
        assert!(info.is_jump_back());
        assert!((info.sim_time - 0.5).abs() < 1e-12);
    }
}
