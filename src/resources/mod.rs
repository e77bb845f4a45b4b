//! Long-lived data shared by controllers, transport callbacks and systems.
//!
//! Overview
//! - `commandstate` – mutex-guarded command buffers shared across threads
//! - `controllers` – registry of attached velocity controllers
//! - `transport` – in-process publish/subscribe node and topic helpers
//! - `updateinfo` – per-step simulation time, delta and paused flag
//! - `velocityconfig` – controller configuration and its INI loader
pub mod commandstate;
pub mod controllers;
pub mod transport;
pub mod updateinfo;
pub mod velocityconfig;
