//! Controller
//!
//! The long-lived coordination context. It owns the canonical visibility
//! flag, reacts to user activation by pushing the new flag to the tab's
//! surface, and serves model listings to surfaces that ask for them.

use crate::channel::{
    ControlChannel, ControlMessage, ControlReply, MessageHandler, Reply, SurfaceState, TabId,
};
use crate::error::{ApiError, ChannelError, ProviderError};
use crate::provider::{list_models_with_retry, ModelDescriptor, ModelLister};
use crate::retry::RetryPolicy;
use crate::store::{settings, KeyedStore, StoreContext};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Controller {
    channel: ControlChannel,
    active_model: KeyedStore<Option<String>>,
    lister: Option<Arc<dyn ModelLister>>,
    retry: RetryPolicy,
    is_visible: Mutex<bool>,
}

impl Controller {
    pub fn new(channel: ControlChannel, store: StoreContext, retry: RetryPolicy) -> Self {
        let active_model = settings::active_model(&store);
        Self {
            channel,
            active_model,
            lister: None,
            retry,
            is_visible: Mutex::new(false),
        }
    }

    pub fn with_lister(mut self, lister: Arc<dyn ModelLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    pub fn is_visible(&self) -> bool {
        *self.is_visible.lock()
    }

    pub fn surface_state(&self, tab: TabId) -> SurfaceState {
        self.channel.state(tab)
    }

    /// Handle a user activation (icon click) on `tab`.
    ///
    /// Flips the visibility flag and pushes it to the tab, activating the
    /// surface if needed. Returns the new flag. A failed dispatch leaves the
    /// flag flipped and returns the error.
    pub async fn on_activation(&self, tab: TabId) -> Result<bool, ChannelError> {
        let session = self.channel.session(tab).await;
        let state = {
            let mut visible = self.is_visible.lock();
            *visible = !*visible;
            *visible
        };
        info!(tab, visible = state, "User activation");

        session
            .send(ControlMessage::ToggleVisibility { state })
            .await
            .map_err(|e| {
                warn!(tab, error = %e, "Visibility toggle not delivered");
                e
            })?;
        Ok(state)
    }

    /// The tab is gone; drop its state machine
    pub fn on_tab_closed(&self, tab: TabId) {
        if self.channel.forget(tab) {
            info!(tab, "Tab closed");
        }
    }

    /// Store `model` as the active model and push it to `tab`
    pub async fn select_model(&self, tab: TabId, model: &str) -> Result<(), ApiError> {
        self.active_model.set(Some(model.to_string())).await?;
        info!(tab, model, "Active model selected");
        self.channel
            .send(
                tab,
                ControlMessage::UpdateModel {
                    model: model.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn active_model(&self) -> Option<String> {
        self.active_model.get().await
    }

    /// Model listing through the retry policy
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let lister = self.lister.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured("no model provider configured".to_string())
        })?;
        list_models_with_retry(lister, &self.retry).await
    }

    /// Handler answering surface-originated requests
    pub fn inbox(&self) -> ControllerInbox {
        ControllerInbox {
            lister: self.lister.clone(),
            retry: self.retry,
        }
    }
}

/// Controller-side responder for surface requests
#[derive(Clone)]
pub struct ControllerInbox {
    lister: Option<Arc<dyn ModelLister>>,
    retry: RetryPolicy,
}

impl MessageHandler for ControllerInbox {
    fn on_message(&self, message: ControlMessage) -> Reply {
        match message {
            ControlMessage::FetchModels => {
                let Some(lister) = self.lister.clone() else {
                    return Reply::Immediate(ControlReply::Error {
                        message: ProviderError::NotConfigured(
                            "no model provider configured".to_string(),
                        )
                        .to_string(),
                    });
                };
                let retry = self.retry;
                Reply::deferred(async move {
                    match list_models_with_retry(lister.as_ref(), &retry).await {
                        Ok(models) => ControlReply::Models { models },
                        Err(e) => {
                            warn!(error = %e, "Model listing failed");
                            ControlReply::Error {
                                message: e.to_string(),
                            }
                        }
                    }
                })
            }
            other => Reply::Immediate(ControlReply::Error {
                message: ChannelError::Unsupported(other.action()).to_string(),
            }),
        }
    }
}
