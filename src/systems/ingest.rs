//! Transport callbacks feeding the shared command state.
//!
//! [`CommandIngestor`] is cloned into every subscription callback. It runs on
//! transport dispatcher threads, possibly several at once, and only ever
//! touches [`SharedCommandState`] through its locking operations.

use log::trace;

use crate::error::TransportError;
use crate::events::twist::{MessageInfo, Twist};
use crate::resources::commandstate::{IngestOutcome, SharedCommandState};
use crate::resources::transport::{Subscription, TransportNode};

/// Translates inbound velocity messages into command state updates.
#[derive(Clone, Debug)]
pub struct CommandIngestor {
    state: SharedCommandState,
}

impl CommandIngestor {
    pub fn new(state: SharedCommandState) -> Self {
        Self { state }
    }

    /// Whole-model command: replaces the model command and makes it sticky.
    pub fn on_model_twist(&self, msg: &Twist) {
        self.state.ingest_model(msg);
        trace!(
            "model command linear={:?} angular={:?}",
            msg.linear, msg.angular
        );
    }

    /// Per-link command: buffered for the link its topic belongs to.
    ///
    /// Messages whose topic matches no configured link are ignored silently.
    pub fn on_link_twist(&self, msg: &Twist, info: &MessageInfo) -> IngestOutcome {
        let outcome = self.state.ingest_link(msg, info.topic());
        match &outcome {
            IngestOutcome::Buffered(name) => trace!("link [{}] command buffered", name),
            IngestOutcome::Replaced(name) => trace!("link [{}] pending command replaced", name),
            IngestOutcome::Discarded(name) => {
                trace!("link [{}] command discarded, one already pending", name)
            }
            IngestOutcome::Unrouted => {}
        }
        outcome
    }

    /// Subscribe [`on_model_twist`](Self::on_model_twist) to `topic`.
    pub fn subscribe_model(
        &self,
        transport: &TransportNode,
        topic: &str,
    ) -> Result<Subscription, TransportError> {
        let ingestor = self.clone();
        transport.subscribe(topic, move |msg, _info| ingestor.on_model_twist(msg))
    }

    /// Subscribe [`on_link_twist`](Self::on_link_twist) to `topic`.
    pub fn subscribe_link(
        &self,
        transport: &TransportNode,
        topic: &str,
    ) -> Result<Subscription, TransportError> {
        let ingestor = self.clone();
        transport.subscribe(topic, move |msg, info| {
            ingestor.on_link_twist(msg, info);
        })
    }
}
