//! Model and link marker components.
//!
//! A model is an entity carrying [`Model`] and a [`Name`]. Its links are
//! entities carrying [`Link`] and a [`Name`], attached to the model through
//! [`ChildOf`]. Link names only need to be unique within one model.
//!
//! ```ignore
//! let vehicle = world.spawn((Model, Name::new("vehicle"))).id();
//! world.spawn((Link, Name::new("wheel"), ChildOf(vehicle)));
//! ```
//!
//! [`Name`]: bevy_ecs::name::Name
//! [`ChildOf`]: bevy_ecs::hierarchy::ChildOf

use bevy_ecs::prelude::Component;

/// Marks an entity as a model that velocity controllers can attach to.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Model;

/// Marks an entity as a link (rigid sub-part) of its parent model.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Link;
