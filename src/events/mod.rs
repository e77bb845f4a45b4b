//! Message types exchanged with the transport.
//!
//! Submodules:
//! - [`twist`] – velocity message and its delivery metadata
pub mod twist;
