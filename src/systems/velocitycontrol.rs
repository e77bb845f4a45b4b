//! Velocity controller: applies buffered commands around each simulation step.
//!
//! A [`VelocityControl`] is attached to one model entity. It subscribes to the
//! model's whole-model command topic and to one topic per configured link,
//! and then brackets every simulation step with two phases:
//!
//! - [`pre_update`](VelocityControl::pre_update) (Apply, before integration):
//!   writes the model command, resolves link names that are still unknown,
//!   and writes every known per-link velocity to its link entity.
//! - [`post_update`](VelocityControl::post_update) (Drain, after integration):
//!   converts the per-link messages received since the last drain into
//!   per-link velocities for the next Apply.
//!
//! A per-link message that arrives during step *k* is therefore applied no
//! earlier than step *k + 1*. Both phases do nothing on paused steps.
//!
//! # Scheduling
//!
//! Controllers are stored in the [`VelocityControllers`] resource. The
//! exclusive systems [`velocity_control_pre_update`] and
//! [`velocity_control_post_update`] run every registered controller with the
//! current [`UpdateInfo`]:
//!
//! ```ignore
//! advance_update_info(&mut world, dt, false);
//! pre.run(&mut world);          // velocity_control_pre_update
//! integrate(&mut world);        // consumes the velocity command components
//! post.run(&mut world);         // velocity_control_post_update
//! ```

use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use log::{error, info, trace, warn};

use crate::components::model::Model;
use crate::components::velocitycmd::{AngularVelocityCmd, LinearVelocityCmd};
use crate::error::VelocityControlError;
use crate::resources::commandstate::SharedCommandState;
use crate::resources::controllers::VelocityControllers;
use crate::resources::transport::{Subscription, TransportNode, as_valid_topic, valid_topic};
use crate::resources::updateinfo::UpdateInfo;
use crate::resources::velocityconfig::VelocityControlConfig;
use crate::systems::ingest::CommandIngestor;
use crate::systems::linkresolver::resolve_links;

/// Velocity command pipeline attached to one model entity.
pub struct VelocityControl {
    model: Entity,
    model_name: String,
    state: SharedCommandState,
    model_topic: String,
    link_topics: Vec<String>,
    _subscriptions: Vec<Subscription>,
}

impl VelocityControl {
    /// Attach a controller to `model`.
    ///
    /// Fails if `model` is not a named [`Model`] entity or if no valid
    /// whole-model topic can be derived. Subscriptions are released when the
    /// controller is dropped.
    pub fn configure(
        model: Entity,
        config: &VelocityControlConfig,
        world: &World,
        transport: &TransportNode,
    ) -> Result<Self, VelocityControlError> {
        let Some(model_name) = model_name(world, model) else {
            error!(
                "VelocityControl should be attached to a model entity. Failed to initialize."
            );
            return Err(VelocityControlError::NotAModel(model));
        };

        if let Some(linear) = &config.initial_linear {
            info!("Linear velocity initialized to [{}]", linear);
        }
        if let Some(angular) = &config.initial_angular {
            info!("Angular velocity initialized to [{}]", angular);
        }

        let state = SharedCommandState::new(config);
        let ingestor = CommandIngestor::new(state.clone());

        let default_topic = format!("/model/{model_name}/cmd_vel");
        let candidates = config.topic.iter().cloned().chain(Some(default_topic));
        let Some(model_topic) = valid_topic(candidates) else {
            error!("No valid command topic for model [{}]", model_name);
            return Err(VelocityControlError::InvalidTopic(model_name));
        };

        let mut subscriptions = vec![ingestor.subscribe_model(transport, &model_topic)?];
        info!(
            "VelocityControl subscribing to twist messages on [{}]",
            model_topic
        );

        let mut link_topics = Vec::new();
        for link_name in state.link_names() {
            let raw_topic = format!("/model/{model_name}/link/{link_name}/cmd_vel");
            let Some(link_topic) = as_valid_topic(&raw_topic) else {
                warn!("Invalid topic [{}] for link [{}]", raw_topic, link_name);
                continue;
            };
            subscriptions.push(ingestor.subscribe_link(transport, &link_topic)?);
            info!(
                "VelocityControl subscribing to twist messages on [{}]",
                link_topic
            );
            link_topics.push(link_topic);
        }

        Ok(Self {
            model,
            model_name,
            state,
            model_topic,
            link_topics,
            _subscriptions: subscriptions,
        })
    }

    /// Apply phase, run before the integrator.
    ///
    /// A backward time jump only produces a warning. Paused steps apply
    /// nothing and leave one-shot commands in place.
    pub fn pre_update(&self, info: &UpdateInfo, world: &mut World) {
        if info.is_jump_back() {
            warn!(
                "Detected jump back in time [{}s]. System may not work properly.",
                info.dt
            );
        }

        if info.paused {
            return;
        }

        let model_command = self.state.take_model_command();
        if let Some(angular) = model_command.angular {
            set_command(world, self.model, AngularVelocityCmd(angular));
        }
        if let Some(linear) = model_command.linear {
            set_command(world, self.model, LinearVelocityCmd(linear));
        }

        if !self.state.has_links() {
            return;
        }

        resolve_links(world, self.model, &self.model_name, &self.state);

        let links = self.state.link_command_snapshot();
        for command in links.angular {
            match command.entity {
                Some(link) => {
                    set_command(world, link, AngularVelocityCmd(command.velocity));
                }
                None => warn!("No link found for angular velocity cmd [{}]", command.name),
            }
        }
        for command in links.linear {
            match command.entity {
                Some(link) => {
                    set_command(world, link, LinearVelocityCmd(command.velocity));
                }
                None => warn!("No link found for linear velocity cmd [{}]", command.name),
            }
        }
    }

    /// Drain phase, run after the integrator. Returns the number of per-link
    /// messages converted.
    pub fn post_update(&self, info: &UpdateInfo) -> usize {
        if info.paused {
            return 0;
        }
        let drained = self.state.drain_pending();
        if drained > 0 {
            trace!(
                "Drained {} link command(s) for model [{}]",
                drained, self.model_name
            );
        }
        drained
    }

    pub fn model(&self) -> Entity {
        self.model
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Topic carrying whole-model commands.
    pub fn model_topic(&self) -> &str {
        &self.model_topic
    }

    /// Per-link command topics, in configuration order.
    pub fn link_topics(&self) -> &[String] {
        &self.link_topics
    }

    pub fn state(&self) -> &SharedCommandState {
        &self.state
    }

    /// An ingestor feeding this controller, for callers that receive
    /// messages outside the transport node.
    pub fn ingestor(&self) -> CommandIngestor {
        CommandIngestor::new(self.state.clone())
    }
}

/// Name of `entity` if it is a named model.
fn model_name(world: &World, entity: Entity) -> Option<String> {
    let entity_ref = world.get_entity(entity).ok()?;
    entity_ref.get::<Model>()?;
    entity_ref.get::<Name>().map(|name| name.as_str().to_string())
}

/// Insert or overwrite a velocity command component on `entity`.
fn set_command<C: Component>(world: &mut World, entity: Entity, command: C) -> bool {
    match world.get_entity_mut(entity) {
        Ok(mut entity_mut) => {
            entity_mut.insert(command);
            true
        }
        Err(_) => {
            warn!("Entity {} no longer exists, velocity command dropped", entity);
            false
        }
    }
}

/// Configure a controller for `model` and register it in
/// [`VelocityControllers`].
///
/// Attachment failures are logged once and returned; no controller is
/// registered in that case.
pub fn attach_velocity_control(
    world: &mut World,
    model: Entity,
    config: &VelocityControlConfig,
    transport: &TransportNode,
) -> Result<(), VelocityControlError> {
    let controller = VelocityControl::configure(model, config, world, transport)?;
    world
        .get_resource_or_insert_with(VelocityControllers::default)
        .push(controller);
    Ok(())
}

/// Exclusive system running the Apply phase of every registered controller.
pub fn velocity_control_pre_update(world: &mut World) {
    let Some(info) = world.get_resource::<UpdateInfo>().copied() else {
        return;
    };
    if !world.contains_resource::<VelocityControllers>() {
        return;
    }
    world.resource_scope(|world, controllers: Mut<VelocityControllers>| {
        for controller in controllers.iter() {
            controller.pre_update(&info, world);
        }
    });
}

/// Exclusive system running the Drain phase of every registered controller.
pub fn velocity_control_post_update(world: &mut World) {
    let Some(info) = world.get_resource::<UpdateInfo>().copied() else {
        return;
    };
    if let Some(controllers) = world.get_resource::<VelocityControllers>() {
        for controller in controllers.iter() {
            controller.post_update(&info);
        }
    }
}
