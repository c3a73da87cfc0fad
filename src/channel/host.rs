//! Seams between the control channel and its hosting environment.

use crate::channel::{ControlMessage, ControlReply, TabId};
use crate::error::ChannelError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// A responder's answer to one message
pub enum Reply {
    /// Answer available now
    Immediate(ControlReply),
    /// "I will respond later": the channel stays open until the future resolves
    Deferred(BoxFuture<'static, ControlReply>),
    /// Fire-and-forget; the channel closes without a reply
    NoResponse,
}

impl Reply {
    pub fn ack() -> Self {
        Reply::Immediate(ControlReply::Ack)
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ControlReply> + Send + 'static,
    {
        Reply::Deferred(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Deferred(_))
    }

    /// Wait for the reply. A deferred responder that dies before answering
    /// yields [`ChannelError::ReplyDropped`].
    ///
    /// Deferred responders run as their own task: dropping the returned
    /// future abandons the reply but the responder still runs to completion.
    pub async fn resolve(self, tab: TabId) -> Result<Option<ControlReply>, ChannelError> {
        match self {
            Reply::Immediate(reply) => Ok(Some(reply)),
            Reply::NoResponse => Ok(None),
            Reply::Deferred(pending) => tokio::spawn(pending)
                .await
                .map(Some)
                .map_err(|_| ChannelError::ReplyDropped(tab)),
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Immediate(reply) => f.debug_tuple("Immediate").field(reply).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
            Reply::NoResponse => f.write_str("NoResponse"),
        }
    }
}

/// Endpoint that receives control messages (a surface, or the controller)
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: ControlMessage) -> Reply;
}

/// Capabilities the hosting environment provides to the controller
#[async_trait]
pub trait Host: Send + Sync {
    /// Hand `message` to the listener on `tab`.
    ///
    /// Fails with [`ChannelError::NoReceiver`] when nothing is listening and
    /// [`ChannelError::TabClosed`] when the tab no longer exists.
    async fn deliver(
        &self,
        tab: TabId,
        message: &ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError>;

    /// Load the surface resource into `tab`
    async fn activate_surface(&self, tab: TabId, resource: &str) -> Result<(), ChannelError>;
}

/// Surface-side access to the controller
#[async_trait]
pub trait ControllerPort: Send + Sync {
    async fn request(
        &self,
        from: TabId,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError>;
}
