//! In-memory envelope with a oneshot acknowledgement.

use std::collections::HashMap;

use tokio::sync::oneshot;
use trigger::{Envelope, OutboundMessage};

/// How an envelope was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; do not redeliver.
    Acknowledged,
    /// Not processed; redeliver.
    Rejected,
}

/// An [`Envelope`] that reports its [`Disposition`] over a oneshot channel.
///
/// Dropping the envelope unsettled closes the channel, which the receiving
/// side observes as a receive error.
#[derive(Debug)]
pub struct ChannelEnvelope {
    id: String,
    attributes: HashMap<String, String>,
    payload: Vec<u8>,
    settle: oneshot::Sender<Disposition>,
}

impl ChannelEnvelope {
    /// Creates an envelope and the receiver that learns how it was settled.
    pub fn new(
        id: impl Into<String>,
        attributes: HashMap<String, String>,
        payload: Vec<u8>,
    ) -> (Self, oneshot::Receiver<Disposition>) {
        let (settle, settled) = oneshot::channel();
        let envelope = Self {
            id: id.into(),
            attributes,
            payload,
            settle,
        };
        (envelope, settled)
    }

    /// Wraps an encoded trigger event.
    pub fn from_message(
        id: impl Into<String>,
        message: OutboundMessage,
    ) -> (Self, oneshot::Receiver<Disposition>) {
        Self::new(id, message.attributes, message.data)
    }

    fn settle(self, disposition: Disposition) {
        // The receiver may have given up waiting; nothing left to tell it.
        let _ = self.settle.send(disposition);
    }
}

impl Envelope for ChannelEnvelope {
    fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn acknowledge(self) {
        self.settle(Disposition::Acknowledged);
    }

    fn reject(self) {
        self.settle(Disposition::Rejected);
    }
}

#[cfg(test)]
mod tests {
    use trigger::TriggerEvent;

    use super::*;

    #[tokio::test]
    async fn acknowledge_is_observed() {
        let message = TriggerEvent::new("nightly-build").to_message().expect("encodes");
        let (envelope, settled) = ChannelEnvelope::from_message("m-1", message.clone());

        assert_eq!(envelope.id(), "m-1");
        assert_eq!(envelope.payload(), message.data.as_slice());
        assert_eq!(envelope.attributes(), &message.attributes);
        envelope.acknowledge();

        assert_eq!(settled.await.ok(), Some(Disposition::Acknowledged));
    }

    #[tokio::test]
    async fn reject_is_observed() {
        let (envelope, settled) = ChannelEnvelope::new("m-2", HashMap::new(), Vec::new());
        envelope.reject();
        assert_eq!(settled.await.ok(), Some(Disposition::Rejected));
    }

    #[tokio::test]
    async fn dropped_envelope_closes_the_channel() {
        let (envelope, settled) = ChannelEnvelope::new("m-3", HashMap::new(), Vec::new());
        drop(envelope);
        assert!(settled.await.is_err());
    }
}
