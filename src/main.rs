//! Headless velocity control runner.
//!
//! Builds a world with one model and one child link per configured link
//! name, attaches a velocity controller to it and steps the simulation:
//!
//! 1. publish the commands scheduled for this step and wait for the
//!    transport to deliver them
//! 2. advance `UpdateInfo`
//! 3. pre-update (Apply)
//! 4. consume the velocity command components, standing in for the
//!    integrator, and log them
//! 5. post-update (Drain)
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --config velocity_control.ini --steps 20 --commands cmds.jsonl
//! ```
//!
//! Each line of the commands file is a JSON object:
//!
//! ```json
//! {"step": 3, "topic": "/model/vehicle/link/wheel/cmd_vel", "twist": {"angular": [0, 0, 2]}}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy_ecs::hierarchy::ChildOf;
use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use clap::Parser;
use log::{error, info, warn};
use serde::Deserialize;

use velocitycontrol::components::model::{Link, Model};
use velocitycontrol::events::twist::Twist;
use velocitycontrol::resources::transport::TransportNode;
use velocitycontrol::resources::updateinfo::UpdateInfo;
use velocitycontrol::resources::velocityconfig::{DEFAULT_CONFIG_PATH, VelocityControlConfig};
use velocitycontrol::systems::consume::consume_velocity_commands;
use velocitycontrol::systems::time::advance_update_info;
use velocitycontrol::systems::velocitycontrol::{
    attach_velocity_control, velocity_control_post_update, velocity_control_pre_update,
};

/// Headless velocity control runner
#[derive(Parser)]
#[command(version, about = "Steps a model through scripted velocity commands.")]
struct Cli {
    /// INI configuration file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Name of the model entity.
    #[arg(long, default_value = "vehicle")]
    model: String,

    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 10)]
    steps: u64,

    /// Step size in seconds.
    #[arg(long, default_value_t = 0.001)]
    dt: f64,

    /// Number of transport dispatcher threads.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// JSON-lines file of commands to publish before given steps.
    #[arg(long, value_name = "PATH")]
    commands: Option<PathBuf>,

    /// Run this step paused. Can be repeated.
    #[arg(long = "pause-at", value_name = "STEP")]
    pause_at: Vec<u64>,
}

/// A command published right before step `step`.
#[derive(Deserialize, Debug)]
struct ScheduledCommand {
    step: u64,
    topic: String,
    #[serde(default)]
    twist: Twist,
}

fn load_commands(path: &Path) -> Result<Vec<ScheduledCommand>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read commands file {:?}: {}", path, e))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| format!("{:?} line {}: {}", path, index + 1, e))
        })
        .collect()
}

fn load_config(path: &Path) -> Result<VelocityControlConfig, String> {
    if !path.exists() {
        warn!("Config file {:?} not found, using defaults", path);
        return Ok(VelocityControlConfig::default());
    }
    VelocityControlConfig::load_from_file(path).map_err(|e| e.to_string())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let commands = match cli.commands.as_deref().map(load_commands).transpose() {
        Ok(commands) => commands.unwrap_or_default(),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // --------------- ECS world ---------------
    let mut world = World::new();
    world.insert_resource(UpdateInfo::default());

    let model = world.spawn((Model, Name::new(cli.model.clone()))).id();
    for link_name in &config.link_names {
        world.spawn((Link, Name::new(link_name.clone()), ChildOf(model)));
    }

    // --------------- Transport + controller ---------------
    let transport = TransportNode::new(cli.workers);
    if let Err(e) = attach_velocity_control(&mut world, model, &config, &transport) {
        error!("Failed to attach velocity control: {e}");
        std::process::exit(1);
    }

    let mut pre_update = Schedule::default();
    pre_update.add_systems(velocity_control_pre_update);
    let mut post_update = Schedule::default();
    post_update.add_systems(velocity_control_post_update);

    info!(
        "Running {} step(s) of {}s for model [{}]",
        cli.steps, cli.dt, cli.model
    );

    // --------------- Main loop ---------------
    for step in 0..cli.steps {
        for command in commands.iter().filter(|c| c.step == step) {
            if let Err(e) = transport.publish(&command.topic, command.twist) {
                warn!("step {}: failed to publish on [{}]: {}", step, command.topic, e);
            }
        }
        if !transport.wait_idle(Duration::from_secs(1)) {
            warn!("step {}: transport still busy, continuing", step);
        }

        let paused = cli.pause_at.contains(&step);
        advance_update_info(&mut world, cli.dt, paused);

        pre_update.run(&mut world);

        for sample in consume_velocity_commands(&mut world) {
            let name = world
                .get::<Name>(sample.entity)
                .map(|name| name.as_str().to_string())
                .unwrap_or_else(|| sample.entity.to_string());
            info!(
                "step {} [{}] linear={:?} angular={:?}",
                step, name, sample.linear, sample.angular
            );
        }

        post_update.run(&mut world);
    }

    info!("Done.");
}
