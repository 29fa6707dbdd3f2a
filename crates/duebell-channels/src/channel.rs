use async_trait::async_trait;

use crate::{error::ChannelError, phone::ChannelAddress, types::OutboundMessage};

/// Outbound side of a messaging channel.
///
/// The real WhatsApp client runs outside this process; implementations hand
/// the message to it and report whether it was accepted. Implementations must
/// be `Send + Sync` so the dispatcher can hold them behind an `Arc`.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"whatsapp"`).
    fn name(&self) -> &str;

    /// Deliver a single message to `to`.
    ///
    /// Return [`ChannelError::NotReady`] when the client is not paired so the
    /// caller retries later; any other error is a failed delivery.
    async fn send(&self, to: &ChannelAddress, msg: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Answers "can we send right now?" without touching the network.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self) -> Result<bool, ChannelError>;
}
