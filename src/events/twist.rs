//! Velocity message carried on command topics.
//!
//! A [`Twist`] holds one linear and one angular 3-vector. Messages arrive on
//! transport-owned threads together with a [`MessageInfo`] naming the topic
//! they were published on, which is how per-link messages are attributed to
//! a link.
//!
//! JSON shape: `{"linear":[x,y,z],"angular":[x,y,z]}`.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Linear and angular velocity command.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Twist {
    #[serde(default)]
    pub linear: DVec3,
    #[serde(default)]
    pub angular: DVec3,
}

impl Twist {
    pub fn new(linear: DVec3, angular: DVec3) -> Self {
        Self { linear, angular }
    }

    pub fn linear(linear: DVec3) -> Self {
        Self {
            linear,
            angular: DVec3::ZERO,
        }
    }

    pub fn angular(angular: DVec3) -> Self {
        Self {
            linear: DVec3::ZERO,
            angular,
        }
    }
}

/// Delivery metadata handed to subscribers alongside each message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    /// Topic the message was published on.
    pub topic: String,
}

impl MessageInfo {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twist_json_shape() {
        let twist = Twist::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 0.0, 2.0));
        let json = serde_json::to_string(&twist).unwrap();
        assert_eq!(json, r#"{"linear":[1.0,0.0,0.0],"angular":[0.0,0.0,2.0]}"#);
    }

    #[test]
    fn twist_missing_fields_default_to_zero() {
        let twist: Twist = serde_json::from_str(r#"{"angular":[0,0,2]}"#).unwrap();
        assert_eq!(twist.linear, DVec3::ZERO);
        assert_eq!(twist.angular, DVec3::new(0.0, 0.0, 2.0));
    }
}
