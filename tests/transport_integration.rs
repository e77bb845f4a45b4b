//! End-to-end tests: INI configuration, transport delivery on dispatcher
//! threads, and the step loop.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test transport_integration
//! ```

use std::time::Duration;

use bevy_ecs::hierarchy::ChildOf;
use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use glam::DVec3;

use velocitycontrol::components::model::{Link, Model};
use velocitycontrol::events::twist::Twist;
use velocitycontrol::resources::controllers::VelocityControllers;
use velocitycontrol::resources::transport::TransportNode;
use velocitycontrol::resources::updateinfo::UpdateInfo;
use velocitycontrol::resources::velocityconfig::VelocityControlConfig;
use velocitycontrol::systems::consume::{VelocityCommandSample, consume_velocity_commands};
use velocitycontrol::systems::time::advance_update_info;
use velocitycontrol::systems::velocitycontrol::{
    attach_velocity_control, velocity_control_post_update, velocity_control_pre_update,
};

const CONFIG: &str = "\
[velocity_control]
initial_linear = 1 0 0
initial_linear_persistent = false
link_names = wheel_left, wheel_right
";

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn spawn_vehicle(world: &mut World) -> (Entity, Entity, Entity) {
    let model = world.spawn((Model, Name::new("vehicle"))).id();
    let left = world
        .spawn((Link, Name::new("wheel_left"), ChildOf(model)))
        .id();
    let right = world
        .spawn((Link, Name::new("wheel_right"), ChildOf(model)))
        .id();
    (model, left, right)
}

fn run_step(world: &mut World, paused: bool) -> Vec<VelocityCommandSample> {
    advance_update_info(world, 0.001, paused);

    let mut pre = Schedule::default();
    pre.add_systems(velocity_control_pre_update);
    pre.run(world);

    let samples = consume_velocity_commands(world);

    let mut post = Schedule::default();
    post.add_systems(velocity_control_post_update);
    post.run(world);

    samples
}

fn sample_for(samples: &[VelocityCommandSample], entity: Entity) -> Option<VelocityCommandSample> {
    samples.iter().copied().find(|s| s.entity == entity)
}

#[test]
fn configured_controller_subscribes_expected_topics() {
    let config = VelocityControlConfig::parse(CONFIG).unwrap();
    let transport = TransportNode::new(2);
    let mut world = World::new();
    let (model, _, _) = spawn_vehicle(&mut world);

    attach_velocity_control(&mut world, model, &config, &transport).unwrap();

    let controllers = world.resource::<VelocityControllers>();
    let controller = controllers.get(model).unwrap();
    assert_eq!(controller.model_topic(), "/model/vehicle/cmd_vel");
    assert_eq!(
        controller.link_topics(),
        &[
            "/model/vehicle/link/wheel_left/cmd_vel".to_string(),
            "/model/vehicle/link/wheel_right/cmd_vel".to_string(),
        ]
    );
    assert_eq!(transport.subscriber_count("/model/vehicle/cmd_vel"), 1);
    assert_eq!(
        transport.subscriber_count("/model/vehicle/link/wheel_left/cmd_vel"),
        1
    );
}

#[test]
fn published_commands_reach_the_world() {
    let config = VelocityControlConfig::parse(CONFIG).unwrap();
    let transport = TransportNode::new(4);
    let mut world = World::new();
    world.insert_resource(UpdateInfo::default());
    let (model, left, right) = spawn_vehicle(&mut world);
    attach_velocity_control(&mut world, model, &config, &transport).unwrap();

    let first = run_step(&mut world, false);
    assert_eq!(sample_for(&first, model).unwrap().linear, Some(DVec3::X));

    transport
        .publish(
            "/model/vehicle/link/wheel_left/cmd_vel",
            Twist::angular(DVec3::new(0.0, 0.0, 2.0)),
        )
        .unwrap();
    transport
        .publish(
            "/model/vehicle/link/wheel_right/cmd_vel",
            Twist::angular(DVec3::new(0.0, 0.0, -2.0)),
        )
        .unwrap();
    transport
        .publish(
            "/model/vehicle/cmd_vel",
            Twist::new(DVec3::new(0.5, 0.0, 0.0), DVec3::ZERO),
        )
        .unwrap();
    assert!(transport.wait_idle(IDLE_TIMEOUT));

    // model command is visible immediately, link commands after one Drain
    let second = run_step(&mut world, false);
    assert_eq!(
        sample_for(&second, model).unwrap().linear,
        Some(DVec3::new(0.5, 0.0, 0.0))
    );
    assert!(sample_for(&second, left).is_none());
    assert!(sample_for(&second, right).is_none());

    for _ in 0..3 {
        let samples = run_step(&mut world, false);
        assert_eq!(
            sample_for(&samples, left).unwrap().angular,
            Some(DVec3::new(0.0, 0.0, 2.0))
        );
        assert_eq!(
            sample_for(&samples, right).unwrap().angular,
            Some(DVec3::new(0.0, 0.0, -2.0))
        );
        assert_eq!(
            sample_for(&samples, model).unwrap().linear,
            Some(DVec3::new(0.5, 0.0, 0.0))
        );
    }
}

#[test]
fn removing_controller_releases_subscriptions() {
    let config = VelocityControlConfig::parse(CONFIG).unwrap();
    let transport = TransportNode::new(1);
    let mut world = World::new();
    world.insert_resource(UpdateInfo::default());
    let (model, left, _) = spawn_vehicle(&mut world);
    attach_velocity_control(&mut world, model, &config, &transport).unwrap();

    let removed = world
        .resource_mut::<VelocityControllers>()
        .remove(model)
        .unwrap();
    drop(removed);
    assert_eq!(transport.subscriber_count("/model/vehicle/cmd_vel"), 0);

    // publishing to a topic nobody listens on is not an error
    transport
        .publish(
            "/model/vehicle/link/wheel_left/cmd_vel",
            Twist::linear(DVec3::X),
        )
        .unwrap();
    assert!(transport.wait_idle(IDLE_TIMEOUT));

    let samples = run_step(&mut world, false);
    assert!(samples.is_empty());
    assert!(world.get::<Name>(left).is_some());
}

#[test]
fn per_model_sections_drive_independent_controllers() {
    let contents = "\
[velocity_control.vehicle]
initial_linear = 1 0 0

[velocity_control.crane]
topic = /crane/cmd_vel
initial_angular = 0 0 1
initial_angular_persistent = false
";
    let configs = VelocityControlConfig::parse_all(contents).unwrap();
    assert_eq!(configs.len(), 2);

    let transport = TransportNode::new(2);
    let mut world = World::new();
    world.insert_resource(UpdateInfo::default());
    let mut models = Vec::new();
    for (name, config) in &configs {
        let name = name.clone().unwrap();
        let model = world.spawn((Model, Name::new(name.clone()))).id();
        attach_velocity_control(&mut world, model, config, &transport).unwrap();
        models.push((name, model));
    }
    let vehicle = models.iter().find(|(n, _)| n == "vehicle").unwrap().1;
    let crane = models.iter().find(|(n, _)| n == "crane").unwrap().1;
    assert_eq!(transport.subscriber_count("/crane/cmd_vel"), 1);

    let first = run_step(&mut world, false);
    assert_eq!(sample_for(&first, vehicle).unwrap().linear, Some(DVec3::X));
    assert_eq!(sample_for(&first, crane).unwrap().angular, Some(DVec3::Z));

    transport
        .publish("/crane/cmd_vel", Twist::linear(DVec3::Y))
        .unwrap();
    assert!(transport.wait_idle(IDLE_TIMEOUT));

    let second = run_step(&mut world, false);
    assert_eq!(sample_for(&second, vehicle).unwrap().linear, Some(DVec3::X));
    assert_eq!(sample_for(&second, crane).unwrap().linear, Some(DVec3::Y));
    assert_eq!(sample_for(&second, crane).unwrap().angular, Some(DVec3::ZERO));
}
