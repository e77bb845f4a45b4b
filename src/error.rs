//! Error types.
//!
//! Only attachment and configuration can fail outright. Once a controller is
//! attached, every failure degrades to "that command is not applied this
//! step" and is reported through the `log` facade instead of an error value.

use bevy_ecs::prelude::Entity;
use thiserror::Error;

/// Errors raised while attaching a [`VelocityControl`](crate::systems::velocitycontrol::VelocityControl)
/// to a model entity.
#[derive(Debug, Error)]
pub enum VelocityControlError {
    /// The target entity does not exist or is not a named model.
    #[error("entity {0} is not a model entity")]
    NotAModel(Entity),
    /// Neither the configured topic nor the default one is a valid topic.
    #[error("no valid command topic for model [{0}]")]
    InvalidTopic(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by the in-process transport node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid topic [{0}]")]
    InvalidTopic(String),
    /// The dispatcher threads have shut down.
    #[error("transport node is closed")]
    Closed,
}

/// Errors raised while reading or writing the INI configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),
    #[error("failed to save config: {0}")]
    Save(String),
    #[error("[{section}] {key}: expected three numbers, got \"{value}\"")]
    InvalidVector {
        section: String,
        key: String,
        value: String,
    },
    #[error("[{section}] {key}: {reason}")]
    InvalidBool {
        section: String,
        key: String,
        reason: String,
    },
    #[error("[{section}] {key}: unknown value \"{value}\"")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}
