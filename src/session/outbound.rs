//! The UI host's outbound message.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::ShimError;

/// A message being written back to the UI, one fragment at a time.
#[async_trait]
pub trait OutboundMessage: Send {
    /// Append `token` and deliver it to the UI immediately.
    async fn stream_token(&mut self, token: &str) -> Result<(), ShimError>;

    /// Finalize the accumulated message.
    async fn send(&mut self) -> Result<(), ShimError>;

    /// The turn failed after zero or more fragments were delivered. The
    /// fragments already shown stay visible.
    async fn fail(&mut self, error: &ShimError) -> Result<(), ShimError> {
        let _ = error;
        Ok(())
    }

    /// Everything appended so far.
    fn content(&self) -> &str;
}

/// What a [`ChannelOutbound`] reports to the UI side.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Token(String),
    Sent(String),
    Failed { content: String, error: String },
}

/// Outbound message that forwards every event over an unbounded channel.
#[derive(Debug)]
pub struct ChannelOutbound {
    content: String,
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelOutbound {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self {
            content: String::new(),
            tx,
        }
    }

    /// A fresh outbound message and the stream of its events.
    pub fn channel() -> (Self, UnboundedReceiverStream<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), UnboundedReceiverStream::new(rx))
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), ShimError> {
        self.tx
            .send(event)
            .map_err(|_| ShimError::InvalidState("UI receiver dropped".into()))
    }
}

#[async_trait]
impl OutboundMessage for ChannelOutbound {
    async fn stream_token(&mut self, token: &str) -> Result<(), ShimError> {
        self.content.push_str(token);
        self.emit(OutboundEvent::Token(token.to_string()))
    }

    async fn send(&mut self) -> Result<(), ShimError> {
        self.emit(OutboundEvent::Sent(self.content.clone()))
    }

    async fn fail(&mut self, error: &ShimError) -> Result<(), ShimError> {
        self.emit(OutboundEvent::Failed {
            content: self.content.clone(),
            error: error.to_string(),
        })
    }

    fn content(&self) -> &str {
        &self.content
    }
}
