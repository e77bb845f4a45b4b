use bevy_ecs::prelude::Resource;

/// Per-step simulation information handed to every controller.
///
/// `dt` is signed: a negative value means the simulation jumped back in time
/// (for example after a rewind request).
#[derive(Resource, Clone, Copy, Debug, PartialEq, Default)]
pub struct UpdateInfo {
    /// Simulated time in seconds.
    pub sim_time: f64,
    /// Simulated time elapsed since the previous step, in seconds.
    pub dt: f64,
    /// Number of unpaused steps executed so far.
    pub iterations: u64,
    /// Whether the current step is paused.
    pub paused: bool,
}

impl UpdateInfo {
    pub fn new(dt: f64, paused: bool) -> Self {
        Self {
            dt,
            paused,
            ..Default::default()
        }
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// True when the step moves simulated time backwards.
    pub fn is_jump_back(&self) -> bool {
        self.dt < 0.0
    }
}
