//! Per-tab surface state machine types.

use crate::channel::TabId;
use serde::{Deserialize, Serialize};

/// Controller's view of one tab's surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceState {
    /// No listener known for the tab; initial state
    #[default]
    NoSurface,
    /// An activation request is in flight
    Injecting,
    /// A listener answered the last dispatch
    SurfaceReady,
}

impl SurfaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceState::NoSurface => "no_surface",
            SurfaceState::Injecting => "injecting",
            SurfaceState::SurfaceReady => "surface_ready",
        }
    }
}

impl std::fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub tab: TabId,
    pub from: SurfaceState,
    pub to: SurfaceState,
}

impl std::fmt::Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab {}: {} -> {}", self.tab, self.from, self.to)
    }
}
