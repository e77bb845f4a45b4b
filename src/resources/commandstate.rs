//! Command state shared between transport callbacks and the step thread.
//!
//! [`SharedCommandState`] is the single owner of every buffer that crosses
//! threads:
//! - the whole-model command ([`ModelVelocityCommand`]),
//! - the ordered link name table with each name's [`LinkResolution`],
//! - the last known per-link linear and angular velocities,
//! - the per-link pending raw messages awaiting the next drain.
//!
//! All of it sits behind one mutex. Callers only get coarse operations
//! (ingest, take, snapshot, drain, resolve); each one holds the lock for its
//! whole read-decide-write sequence and never across component store writes
//! or transport calls.
//!
//! # Timeline
//!
//! 1. Transport threads call [`ingest_model`](SharedCommandState::ingest_model)
//!    and [`ingest_link`](SharedCommandState::ingest_link) at any time.
//! 2. Before integration, the step thread calls
//!    [`take_model_command`](SharedCommandState::take_model_command) (which
//!    clears one-shot commands atomically with the read) and
//!    [`link_command_snapshot`](SharedCommandState::link_command_snapshot).
//! 3. After integration, [`drain_pending`](SharedCommandState::drain_pending)
//!    turns pending raw messages into per-link velocities for the next step.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use bevy_ecs::prelude::Entity;
use glam::DVec3;
use log::warn;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::events::twist::Twist;
use crate::resources::velocityconfig::{LinkTopicMatching, PendingPolicy, VelocityControlConfig};

/// Whole-model command: at most one linear and one angular vector, each with
/// its own persistence flag.
///
/// A persistent vector stays in effect every step until replaced. A
/// non-persistent one is applied during exactly one step and then cleared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelVelocityCommand {
    pub linear: Option<DVec3>,
    pub linear_persistent: bool,
    pub angular: Option<DVec3>,
    pub angular_persistent: bool,
}

impl Default for ModelVelocityCommand {
    /// Zero linear and angular velocity, both sticky.
    fn default() -> Self {
        Self {
            linear: Some(DVec3::ZERO),
            linear_persistent: true,
            angular: Some(DVec3::ZERO),
            angular_persistent: true,
        }
    }
}

impl ModelVelocityCommand {
    /// Build the initial command from configuration.
    pub fn from_config(config: &VelocityControlConfig) -> Self {
        let mut command = Self::default();
        if let Some(linear) = config.initial_linear {
            command.linear = Some(linear.value);
            command.linear_persistent = linear.persistent;
        }
        if let Some(angular) = config.initial_angular {
            command.angular = Some(angular.value);
            command.angular_persistent = angular.persistent;
        }
        command
    }

    /// Replace both vectors with an inbound message. Inbound commands are
    /// always sticky.
    fn replace(&mut self, twist: &Twist) {
        self.linear = Some(twist.linear);
        self.angular = Some(twist.angular);
        self.linear_persistent = true;
        self.angular_persistent = true;
    }

    /// Read the vectors to apply this step, clearing the one-shot ones.
    fn take_for_step(&mut self) -> ModelCommandSnapshot {
        let snapshot = ModelCommandSnapshot {
            linear: self.linear,
            angular: self.angular,
        };
        if !self.linear_persistent {
            self.linear = None;
        }
        if !self.angular_persistent {
            self.angular = None;
        }
        snapshot
    }
}

/// Whole-model vectors to write during one Apply phase.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ModelCommandSnapshot {
    pub linear: Option<DVec3>,
    pub angular: Option<DVec3>,
}

/// Resolution state of one configured link name.
///
/// Resolution is monotonic: once `Resolved`, a name never goes back to
/// `Unresolved`, even if the entity is despawned later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkResolution {
    Unresolved,
    Resolved(Entity),
}

impl LinkResolution {
    pub fn entity(&self) -> Option<Entity> {
        match self {
            LinkResolution::Resolved(entity) => Some(*entity),
            LinkResolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LinkResolution::Resolved(_))
    }
}

/// Result of routing one inbound per-link message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored as the pending message for the link.
    Buffered(String),
    /// Overwrote the pending message for the link (latest-wins policy).
    Replaced(String),
    /// Dropped because a message for the link was already pending
    /// (first-wins policy).
    Discarded(String),
    /// The topic matched no configured link name.
    Unrouted,
}

/// One per-link velocity to write during an Apply phase.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkCommand {
    pub name: String,
    /// Resolved link entity, `None` while the name is unresolved.
    pub entity: Option<Entity>,
    pub velocity: DVec3,
}

/// Per-link velocities captured under the lock, sorted by link name.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LinkCommandSnapshot {
    pub angular: Vec<LinkCommand>,
    pub linear: Vec<LinkCommand>,
}

impl LinkCommandSnapshot {
    pub fn is_empty(&self) -> bool {
        self.angular.is_empty() && self.linear.is_empty()
    }
}

#[derive(Debug)]
struct LinkSlot {
    name: String,
    /// `/<name>/cmd_vel`, precomputed for substring matching.
    topic_suffix: String,
    resolution: LinkResolution,
}

#[derive(Debug)]
struct CommandBuffers {
    model: ModelVelocityCommand,
    links: Vec<LinkSlot>,
    linear_velocities: FxHashMap<String, DVec3>,
    angular_velocities: FxHashMap<String, DVec3>,
    pending: FxHashMap<String, Twist>,
    matching: LinkTopicMatching,
    policy: PendingPolicy,
}

impl CommandBuffers {
    /// Name of the configured link an inbound topic belongs to.
    fn route(&self, topic: &str) -> Option<&str> {
        match self.matching {
            LinkTopicMatching::Substring => self
                .links
                .iter()
                .find(|slot| topic.contains(&slot.topic_suffix))
                .map(|slot| slot.name.as_str()),
            LinkTopicMatching::Exact => {
                let mut segments = topic.split('/').filter(|s| !s.is_empty()).rev();
                match (segments.next(), segments.next()) {
                    (Some("cmd_vel"), Some(segment)) => self
                        .links
                        .iter()
                        .find(|slot| slot.name == segment)
                        .map(|slot| slot.name.as_str()),
                    _ => None,
                }
            }
        }
    }

    fn slot(&self, name: &str) -> Option<&LinkSlot> {
        self.links.iter().find(|slot| slot.name == name)
    }

    fn link_commands(&self, velocities: &FxHashMap<String, DVec3>) -> Vec<LinkCommand> {
        let mut commands: Vec<LinkCommand> = velocities
            .iter()
            .map(|(name, velocity)| LinkCommand {
                name: name.clone(),
                entity: self.slot(name).and_then(|slot| slot.resolution.entity()),
                velocity: *velocity,
            })
            .collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }
}

/// Mutex-guarded command buffers shared by the ingestor and the step
/// coordinator of one controller. Cloning shares the same buffers.
#[derive(Clone, Debug)]
pub struct SharedCommandState {
    inner: Arc<Mutex<CommandBuffers>>,
}

impl SharedCommandState {
    /// Create the buffers for one controller.
    ///
    /// Duplicate link names are ignored after their first occurrence.
    pub fn new(config: &VelocityControlConfig) -> Self {
        let mut links: Vec<LinkSlot> = Vec::with_capacity(config.link_names.len());
        for name in &config.link_names {
            if links.iter().any(|slot| &slot.name == name) {
                warn!("Duplicate link name [{}] ignored", name);
                continue;
            }
            links.push(LinkSlot {
                name: name.clone(),
                topic_suffix: format!("/{name}/cmd_vel"),
                resolution: LinkResolution::Unresolved,
            });
        }

        Self {
            inner: Arc::new(Mutex::new(CommandBuffers {
                model: ModelVelocityCommand::from_config(config),
                links,
                linear_velocities: FxHashMap::default(),
                angular_velocities: FxHashMap::default(),
                pending: FxHashMap::default(),
                matching: config.link_topic_matching,
                policy: config.pending_policy,
            })),
        }
    }

    // ==================== INGESTION (transport threads) ====================

    /// Replace the whole-model command. Both vectors become sticky.
    pub fn ingest_model(&self, twist: &Twist) {
        self.inner.lock().model.replace(twist);
    }

    /// Buffer a per-link message received on `topic`.
    ///
    /// At most one message per link is pending between drains; what happens
    /// to a second one depends on the configured [`PendingPolicy`].
    pub fn ingest_link(&self, twist: &Twist, topic: &str) -> IngestOutcome {
        let mut buffers = self.inner.lock();
        let Some(name) = buffers.route(topic).map(str::to_string) else {
            return IngestOutcome::Unrouted;
        };
        let policy = buffers.policy;
        match buffers.pending.entry(name) {
            Entry::Vacant(slot) => {
                let name = slot.key().clone();
                slot.insert(*twist);
                IngestOutcome::Buffered(name)
            }
            Entry::Occupied(mut slot) => match policy {
                PendingPolicy::FirstWins => IngestOutcome::Discarded(slot.key().clone()),
                PendingPolicy::LatestWins => {
                    slot.insert(*twist);
                    IngestOutcome::Replaced(slot.key().clone())
                }
            },
        }
    }

    // ==================== STEP THREAD ====================

    /// Read the whole-model vectors to apply this step and clear the
    /// non-persistent ones, in one critical section.
    pub fn take_model_command(&self) -> ModelCommandSnapshot {
        self.inner.lock().model.take_for_step()
    }

    /// Copy the per-link velocities together with each name's resolved
    /// entity.
    pub fn link_command_snapshot(&self) -> LinkCommandSnapshot {
        let buffers = self.inner.lock();
        LinkCommandSnapshot {
            angular: buffers.link_commands(&buffers.angular_velocities),
            linear: buffers.link_commands(&buffers.linear_velocities),
        }
    }

    /// Decode every pending message into the per-link velocities, overwriting
    /// previous values, then clear the pending buffer. Returns the number of
    /// messages drained.
    pub fn drain_pending(&self) -> usize {
        let mut guard = self.inner.lock();
        let buffers = &mut *guard;
        let drained = buffers.pending.len();
        for (name, twist) in buffers.pending.drain() {
            buffers.linear_velocities.insert(name.clone(), twist.linear);
            buffers.angular_velocities.insert(name, twist.angular);
        }
        drained
    }

    // ==================== LINK RESOLUTION ====================

    pub fn has_links(&self) -> bool {
        !self.inner.lock().links.is_empty()
    }

    /// Configured link names in attribution order.
    pub fn link_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .links
            .iter()
            .map(|slot| slot.name.clone())
            .collect()
    }

    /// Configured names that have no entity yet, in configuration order.
    pub fn unresolved_links(&self) -> Vec<String> {
        self.inner
            .lock()
            .links
            .iter()
            .filter(|slot| !slot.resolution.is_resolved())
            .map(|slot| slot.name.clone())
            .collect()
    }

    pub fn all_links_resolved(&self) -> bool {
        self.inner
            .lock()
            .links
            .iter()
            .all(|slot| slot.resolution.is_resolved())
    }

    /// Record the entity for `name`. Returns `false` if the name is unknown
    /// or already resolved; an existing resolution is never replaced.
    pub fn mark_resolved(&self, name: &str, entity: Entity) -> bool {
        let mut buffers = self.inner.lock();
        match buffers.links.iter_mut().find(|slot| slot.name == name) {
            Some(slot) if !slot.resolution.is_resolved() => {
                slot.resolution = LinkResolution::Resolved(entity);
                true
            }
            _ => false,
        }
    }

    pub fn link_resolution(&self, name: &str) -> Option<LinkResolution> {
        self.inner.lock().slot(name).map(|slot| slot.resolution)
    }

    // ==================== INSPECTION ====================

    /// Copy of the current whole-model command.
    pub fn model_command(&self) -> ModelVelocityCommand {
        self.inner.lock().model
    }

    pub fn pending_message(&self, name: &str) -> Option<Twist> {
        self.inner.lock().pending.get(name).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn link_linear_velocity(&self, name: &str) -> Option<DVec3> {
        self.inner.lock().linear_velocities.get(name).copied()
    }

    pub fn link_angular_velocity(&self, name: &str) -> Option<DVec3> {
        self.inner.lock().angular_velocities.get(name).copied()
    }
}
