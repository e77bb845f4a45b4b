//! Lazy resolution of configured link names to link entities.
//!
//! Links may be spawned after the controller attaches, so resolution is
//! retried at the start of every Apply phase until every configured name maps
//! to an entity. A name that never resolves simply never receives commands.

use bevy_ecs::hierarchy::Children;
use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use log::{debug, warn};

use crate::components::model::Link;
use crate::resources::commandstate::SharedCommandState;

/// Find the link child of `model` named `name`.
pub fn find_link_by_name(world: &World, model: Entity, name: &str) -> Option<Entity> {
    let children: &[Entity] = world.get::<Children>(model)?;
    children.iter().copied().find(|&child| {
        world.get::<Link>(child).is_some()
            && world
                .get::<Name>(child)
                .is_some_and(|link_name| link_name.as_str() == name)
    })
}

/// Try to resolve every still-unresolved link name of `state`.
///
/// Returns the number of names resolved by this call. Each name that cannot
/// be found yet is reported with a warning and retried on the next call.
pub fn resolve_links(
    world: &World,
    model: Entity,
    model_name: &str,
    state: &SharedCommandState,
) -> usize {
    if state.all_links_resolved() {
        return 0;
    }

    let mut resolved = 0;
    for name in state.unresolved_links() {
        match find_link_by_name(world, model, &name) {
            Some(link) => {
                if state.mark_resolved(&name, link) {
                    debug!("Resolved link [{}] of model [{}] to {}", name, model_name, link);
                    resolved += 1;
                }
            }
            None => warn!("Failed to find link [{}] for model [{}]", name, model_name),
        }
    }
    resolved
}
