//! Control vocabulary exchanged between the controller and tab surfaces.

use crate::provider::ModelDescriptor;
use serde::{Deserialize, Serialize};

/// Browser tab identity; one surface per tab
pub type TabId = u32;

/// Closed set of control actions, tagged by `action` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Controller → surface: show or hide the injected UI
    ToggleVisibility { state: bool },
    /// Controller → surface: the active model changed
    UpdateModel { model: String },
    /// Surface → controller: request the current model listing
    FetchModels,
}

impl ControlMessage {
    pub fn action(&self) -> &'static str {
        match self {
            ControlMessage::ToggleVisibility { .. } => "toggleVisibility",
            ControlMessage::UpdateModel { .. } => "updateModel",
            ControlMessage::FetchModels => "fetchModels",
        }
    }
}

/// Reply carried back over the channel for request/response actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ControlReply {
    Ack,
    Models { models: Vec<ModelDescriptor> },
    Error { message: String },
}
