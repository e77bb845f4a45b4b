//! Velocity controller configuration.
//!
//! Supplies, at attachment time, the optional whole-model topic override,
//! the optional initial linear/angular commands with their persistence flags,
//! and the ordered list of link names to track. Can be built in code or
//! loaded from an INI file.
//!
//! # Configuration File Format
//!
//! ```ini
//! [velocity_control]
//! topic = /vehicle/cmd_vel
//! initial_linear = 1 0 0
//! initial_linear_persistent = false
//! initial_angular = 0 0 0.5
//! link_names = wheel_left, wheel_right
//! link_topic_matching = substring
//! pending_policy = first_wins
//!
//! [velocity_control.crane]
//! link_names = boom
//! ```
//!
//! `[velocity_control]` configures the default model; a
//! `[velocity_control.<model>]` section configures the model named `<model>`.
//! Section and key names are case-sensitive.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use configparser::ini::Ini;
use glam::DVec3;
use log::info;

use crate::error::ConfigError;

/// Section holding the configuration of the default model.
pub const DEFAULT_SECTION: &str = "velocity_control";
/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./velocity_control.ini";

/// How an inbound per-link message is attributed to a configured link name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkTopicMatching {
    /// First configured name (in configuration order) whose `/<name>/cmd_vel`
    /// occurs anywhere in the topic. Names that are substrings of each other
    /// can be misattributed depending on their order.
    #[default]
    Substring,
    /// The topic segment right before a trailing `cmd_vel` segment must equal
    /// the name.
    Exact,
}

/// What happens when a second message for the same link arrives before the
/// pending one has been drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PendingPolicy {
    /// Keep the first message, discard the newcomer.
    #[default]
    FirstWins,
    /// Replace the pending message with the newcomer.
    LatestWins,
}

impl LinkTopicMatching {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkTopicMatching::Substring => "substring",
            LinkTopicMatching::Exact => "exact",
        }
    }
}

impl FromStr for LinkTopicMatching {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(LinkTopicMatching::Substring),
            "exact" => Ok(LinkTopicMatching::Exact),
            _ => Err(()),
        }
    }
}

impl PendingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingPolicy::FirstWins => "first_wins",
            PendingPolicy::LatestWins => "latest_wins",
        }
    }
}

impl FromStr for PendingPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_wins" => Ok(PendingPolicy::FirstWins),
            "latest_wins" => Ok(PendingPolicy::LatestWins),
            _ => Err(()),
        }
    }
}

/// Initial model command and whether it persists past the first step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialVelocity {
    pub value: DVec3,
    pub persistent: bool,
}

impl InitialVelocity {
    /// A command that stays applied until replaced.
    pub fn sticky(value: DVec3) -> Self {
        Self {
            value,
            persistent: true,
        }
    }

    /// A command applied during exactly one step.
    pub fn one_shot(value: DVec3) -> Self {
        Self {
            value,
            persistent: false,
        }
    }
}

impl fmt::Display for InitialVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.value.x,
            self.value.y,
            self.value.z,
            if self.persistent { "" } else { " (one-shot)" }
        )
    }
}

/// Configuration of one velocity controller.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct VelocityControlConfig {
    /// Whole-model topic override. Falls back to `/model/<name>/cmd_vel`.
    pub topic: Option<String>,
    /// Initial linear command. `None` keeps the zero, sticky default.
    pub initial_linear: Option<InitialVelocity>,
    /// Initial angular command. `None` keeps the zero, sticky default.
    pub initial_angular: Option<InitialVelocity>,
    /// Link names to track, in attribution order.
    pub link_names: Vec<String>,
    pub link_topic_matching: LinkTopicMatching,
    pub pending_policy: PendingPolicy,
}

impl VelocityControlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_initial_linear(mut self, value: DVec3, persistent: bool) -> Self {
        self.initial_linear = Some(InitialVelocity { value, persistent });
        self
    }

    pub fn with_initial_angular(mut self, value: DVec3, persistent: bool) -> Self {
        self.initial_angular = Some(InitialVelocity { value, persistent });
        self
    }

    pub fn with_link(mut self, name: impl Into<String>) -> Self {
        self.link_names.push(name.into());
        self
    }

    pub fn with_link_topic_matching(mut self, matching: LinkTopicMatching) -> Self {
        self.link_topic_matching = matching;
        self
    }

    pub fn with_pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    /// Load the `[velocity_control]` section of an INI file.
    ///
    /// Missing keys keep their default values.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut ini = Ini::new_cs();
        ini.load(path.as_ref()).map_err(ConfigError::Load)?;
        let config = Self::from_ini(&ini, DEFAULT_SECTION)?;
        info!(
            "Loaded velocity control config from {:?}: {} link(s)",
            path.as_ref(),
            config.link_names.len()
        );
        Ok(config)
    }

    /// Parse the `[velocity_control]` section from INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = read_ini(contents)?;
        Self::from_ini(&ini, DEFAULT_SECTION)
    }

    /// Load every controller section of an INI file.
    ///
    /// Returns `(model, config)` pairs where `model` is `None` for the
    /// `[velocity_control]` section. Pairs are sorted by section name.
    pub fn load_all(
        path: impl AsRef<Path>,
    ) -> Result<Vec<(Option<String>, VelocityControlConfig)>, ConfigError> {
        let mut ini = Ini::new_cs();
        ini.load(path.as_ref()).map_err(ConfigError::Load)?;
        Self::all_from_ini(&ini)
    }

    /// Parse every controller section from INI text.
    pub fn parse_all(
        contents: &str,
    ) -> Result<Vec<(Option<String>, VelocityControlConfig)>, ConfigError> {
        let ini = read_ini(contents)?;
        Self::all_from_ini(&ini)
    }

    fn all_from_ini(
        ini: &Ini,
    ) -> Result<Vec<(Option<String>, VelocityControlConfig)>, ConfigError> {
        let mut sections = ini.sections();
        sections.sort();
        let mut configs = Vec::new();
        for section in sections {
            let model = if section == DEFAULT_SECTION {
                None
            } else if let Some(model) = section
                .strip_prefix(DEFAULT_SECTION)
                .and_then(|rest| rest.strip_prefix('.'))
                .filter(|model| !model.is_empty())
            {
                Some(model.to_string())
            } else {
                continue;
            };
            configs.push((model, Self::from_ini(ini, &section)?));
        }
        Ok(configs)
    }

    /// Read one section of an already parsed INI document.
    pub fn from_ini(ini: &Ini, section: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        config.topic = get_string(ini, section, "topic");

        if let Some(value) = get_vector(ini, section, "initial_linear")? {
            let persistent =
                get_bool(ini, section, "initial_linear_persistent")?.unwrap_or(true);
            config.initial_linear = Some(InitialVelocity { value, persistent });
        }
        if let Some(value) = get_vector(ini, section, "initial_angular")? {
            let persistent =
                get_bool(ini, section, "initial_angular_persistent")?.unwrap_or(true);
            config.initial_angular = Some(InitialVelocity { value, persistent });
        }

        if let Some(names) = get_string(ini, section, "link_names") {
            config.link_names = names
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = get_string(ini, section, "link_topic_matching") {
            config.link_topic_matching =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    section: section.to_string(),
                    key: "link_topic_matching".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = get_string(ini, section, "pending_policy") {
            config.pending_policy = value.parse().map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: "pending_policy".to_string(),
                value: value.clone(),
            })?;
        }

        Ok(config)
    }

    /// Write this configuration into `section` of `ini`.
    pub fn to_ini(&self, ini: &mut Ini, section: &str) {
        if let Some(topic) = &self.topic {
            ini.set(section, "topic", Some(topic.clone()));
        }
        if let Some(linear) = &self.initial_linear {
            ini.set(section, "initial_linear", Some(format_vector(linear.value)));
            ini.set(
                section,
                "initial_linear_persistent",
                Some(linear.persistent.to_string()),
            );
        }
        if let Some(angular) = &self.initial_angular {
            ini.set(section, "initial_angular", Some(format_vector(angular.value)));
            ini.set(
                section,
                "initial_angular_persistent",
                Some(angular.persistent.to_string()),
            );
        }
        if !self.link_names.is_empty() {
            ini.set(section, "link_names", Some(self.link_names.join(", ")));
        }
        ini.set(
            section,
            "link_topic_matching",
            Some(self.link_topic_matching.as_str().to_string()),
        );
        ini.set(
            section,
            "pending_policy",
            Some(self.pending_policy.as_str().to_string()),
        );
    }

    /// Save this configuration as the `[velocity_control]` section.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut ini = Ini::new_cs();
        self.to_ini(&mut ini, DEFAULT_SECTION);
        ini.write(path.as_ref())
            .map_err(|e| ConfigError::Save(e.to_string()))?;
        info!("Saved velocity control config to {:?}", path.as_ref());
        Ok(())
    }
}

/// Section name configuring `model`, or the default section for `None`.
pub fn section_for(model: Option<&str>) -> String {
    match model {
        Some(model) => format!("{DEFAULT_SECTION}.{model}"),
        None => DEFAULT_SECTION.to_string(),
    }
}

fn read_ini(contents: &str) -> Result<Ini, ConfigError> {
    let mut ini = Ini::new_cs();
    ini.read(contents.to_string()).map_err(ConfigError::Load)?;
    Ok(ini)
}

fn get_string(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get(section, key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_bool(ini: &Ini, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
    ini.getbool(section, key)
        .map_err(|reason| ConfigError::InvalidBool {
            section: section.to_string(),
            key: key.to_string(),
            reason,
        })
}

fn get_vector(ini: &Ini, section: &str, key: &str) -> Result<Option<DVec3>, ConfigError> {
    let Some(value) = get_string(ini, section, key) else {
        return Ok(None);
    };
    parse_vector(&value)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidVector {
            section: section.to_string(),
            key: key.to_string(),
            value,
        })
}

/// Parse three numbers separated by whitespace and/or commas.
pub fn parse_vector(value: &str) -> Option<DVec3> {
    let parts: Vec<f64> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] => Some(DVec3::new(*x, *y, *z)),
        _ => None,
    }
}

fn format_vector(value: DVec3) -> String {
    format!("{} {} {}", value.x, value.y, value.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vector_accepts_spaces_and_commas() {
        assert_eq!(parse_vector("1 0 0"), Some(DVec3::X));
        assert_eq!(parse_vector("0, 0, 2.5"), Some(DVec3::new(0.0, 0.0, 2.5)));
        assert_eq!(parse_vector("1 2"), None);
        assert_eq!(parse_vector("1 2 3 4"), None);
        assert_eq!(parse_vector("a b c"), None);
    }

    #[test]
    fn empty_section_yields_defaults() {
        let config = VelocityControlConfig::parse("[velocity_control]\n").unwrap();
        assert_eq!(config, VelocityControlConfig::default());
    }

    #[test]
    fn full_section_is_parsed() {
        let config = VelocityControlConfig::parse(
            "[velocity_control]\n\
             topic = /vehicle/cmd_vel\n\
             initial_linear = 1 0 0\n\
             initial_linear_persistent = false\n\
             initial_angular = 0 0 0.5\n\
             link_names = wheel_left, wheel_right\n\
             link_topic_matching = exact\n\
             pending_policy = latest_wins\n",
        )
        .unwrap();

        assert_eq!(config.topic.as_deref(), Some("/vehicle/cmd_vel"));
        assert_eq!(config.initial_linear, Some(InitialVelocity::one_shot(DVec3::X)));
        assert_eq!(
            config.initial_angular,
            Some(InitialVelocity::sticky(DVec3::new(0.0, 0.0, 0.5)))
        );
        assert_eq!(config.link_names, vec!["wheel_left", "wheel_right"]);
        assert_eq!(config.link_topic_matching, LinkTopicMatching::Exact);
        assert_eq!(config.pending_policy, PendingPolicy::LatestWins);
    }

    #[test]
    fn link_names_keep_configuration_order() {
        let config =
            VelocityControlConfig::parse("[velocity_control]\nlink_names = c b a\n").unwrap();
        assert_eq!(config.link_names, vec!["c", "b", "a"]);
    }

    #[test]
    fn malformed_vector_is_an_error() {
        let err = VelocityControlConfig::parse("[velocity_control]\ninitial_linear = 1 x 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVector { .. }));
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let err = VelocityControlConfig::parse("[velocity_control]\npending_policy = queue\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn persistence_without_initial_value_is_ignored() {
        let config = VelocityControlConfig::parse(
            "[velocity_control]\ninitial_angular_persistent = false\n",
        )
        .unwrap();
        assert_eq!(config.initial_angular, None);
    }

    #[test]
    fn parse_all_splits_sections_per_model() {
        let configs = VelocityControlConfig::parse_all(
            "[velocity_control]\nlink_names = wheel\n\
             [velocity_control.Crane]\nlink_names = boom\n\
             [unrelated]\nkey = value\n",
        )
        .unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].0, None);
        assert_eq!(configs[0].1.link_names, vec!["wheel"]);
        assert_eq!(configs[1].0.as_deref(), Some("Crane"));
        assert_eq!(configs[1].1.link_names, vec!["boom"]);
    }

    #[test]
    fn to_ini_round_trips_through_text() {
        let config = VelocityControlConfig::new()
            .with_topic("/cmd")
            .with_initial_linear(DVec3::new(1.0, 2.0, 3.0), false)
            .with_link("wheel")
            .with_pending_policy(PendingPolicy::LatestWins);
        let mut ini = Ini::new_cs();
        config.to_ini(&mut ini, &section_for(None));
        let parsed = VelocityControlConfig::parse(&ini.writes()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn section_for_model() {
        assert_eq!(section_for(None), "velocity_control");
        assert_eq!(section_for(Some("crane")), "velocity_control.crane");
    }
}
