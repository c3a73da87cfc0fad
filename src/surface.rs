//! Per-tab surface: mirrors what the controller pushes and what the shared
//! store broadcasts. It never owns visibility.

use crate::channel::{ControlMessage, ControlReply, ControllerPort, MessageHandler, Reply, TabId};
use crate::error::ChannelError;
use crate::provider::ModelDescriptor;
use crate::store::{settings, StoreContext, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// What the surface is currently rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceView {
    pub visible: bool,
    pub model: Option<String>,
}

pub struct Surface {
    tab: TabId,
    view: Arc<Mutex<SurfaceView>>,
    _model_watch: Subscription,
}

impl Surface {
    /// Load the surface into `tab`, reading shared settings from `store`
    pub async fn mount(tab: TabId, store: &StoreContext) -> Self {
        let active_model = settings::active_model(store);
        let view = Arc::new(Mutex::new(SurfaceView {
            visible: false,
            model: active_model.get().await,
        }));

        let watched = Arc::clone(&view);
        let model_watch = active_model.subscribe(move |model| {
            debug!(tab, ?model, "Active model changed");
            watched.lock().model = model;
        });

        Self {
            tab,
            view,
            _model_watch: model_watch,
        }
    }

    pub fn view(&self) -> SurfaceView {
        self.view.lock().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.view.lock().visible
    }

    /// Ask the controller for the model listing
    pub async fn request_models(
        &self,
        port: &dyn ControllerPort,
    ) -> Result<Vec<ModelDescriptor>, ChannelError> {
        match port.request(self.tab, ControlMessage::FetchModels).await? {
            Some(ControlReply::Models { models }) => Ok(models),
            Some(ControlReply::Error { message }) => Err(ChannelError::Rejected(message)),
            Some(ControlReply::Ack) | None => Err(ChannelError::Rejected(
                "controller sent no model listing".to_string(),
            )),
        }
    }
}

impl MessageHandler for Surface {
    fn on_message(&self, message: ControlMessage) -> Reply {
        match message {
            ControlMessage::ToggleVisibility { state } => {
                debug!(tab = self.tab, visible = state, "Visibility pushed");
                self.view.lock().visible = state;
                Reply::ack()
            }
            ControlMessage::UpdateModel { model } => {
                self.view.lock().model = Some(model);
                Reply::ack()
            }
            other => Reply::Immediate(ControlReply::Error {
                message: ChannelError::Unsupported(other.action()).to_string(),
            }),
        }
    }
}
