//! Control Channel
//!
//! Request/response messaging from the controller to per-tab surfaces, with
//! on-demand surface activation when a tab has no listener.
//!
//! Each tab has a small state machine:
//!
//! ```text
//!   NoSurface ──dispatch fails (no receiver)──▶ Injecting
//!   Injecting ──activation ok──▶ SurfaceReady   (then exactly one redelivery)
//!   Injecting ──activation fails──▶ NoSurface   (message dropped)
//!   SurfaceReady ──dispatch fails (no receiver)──▶ Injecting
//! ```
//!
//! Dispatches for one tab are serialized through a [`TabSession`]; different
//! tabs proceed independently. There is no unbounded retry anywhere: a tab
//! that can never load its surface costs one activation attempt per dispatch.

pub mod host;
pub mod local;
pub mod message;
pub mod state;

pub use host::{ControllerPort, Host, MessageHandler, Reply};
pub use local::LocalHost;
pub use message::{ControlMessage, ControlReply, TabId};
pub use state::{StateChange, SurfaceState};

use crate::error::ChannelError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{debug, info, warn};

const TRANSITION_BUFFER: usize = 64;

struct TabMachine {
    state: Mutex<SurfaceState>,
    dispatch: Arc<tokio::sync::Mutex<()>>,
}

impl TabMachine {
    fn new() -> Self {
        Self {
            state: Mutex::new(SurfaceState::NoSurface),
            dispatch: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Controller-side dispatcher with surface activation fallback
pub struct ControlChannel {
    host: Arc<dyn Host>,
    resource: String,
    tabs: Mutex<HashMap<TabId, Arc<TabMachine>>>,
    transitions: broadcast::Sender<StateChange>,
}

impl ControlChannel {
    /// `resource` is the surface code handed to [`Host::activate_surface`].
    pub fn new(host: Arc<dyn Host>, resource: impl Into<String>) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            host,
            resource: resource.into(),
            tabs: Mutex::new(HashMap::new()),
            transitions,
        }
    }

    /// Current state for `tab`; unobserved tabs are `NoSurface`
    pub fn state(&self, tab: TabId) -> SurfaceState {
        self.tabs
            .lock()
            .get(&tab)
            .map(|machine| *machine.state.lock())
            .unwrap_or_default()
    }

    /// Tabs with a live state machine, ascending
    pub fn tracked_tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.tabs.lock().keys().copied().collect();
        tabs.sort_unstable();
        tabs
    }

    /// Stream of state transitions across all tabs
    pub fn watch_transitions(&self) -> broadcast::Receiver<StateChange> {
        self.transitions.subscribe()
    }

    /// Drop the state machine of a closed tab
    pub fn forget(&self, tab: TabId) -> bool {
        let removed = self.tabs.lock().remove(&tab).is_some();
        if removed {
            debug!(tab, "Forgot tab state");
        }
        removed
    }

    /// Acquire the dispatch lock for `tab`. Waits for any in-flight dispatch
    /// cycle on the same tab to finish.
    pub async fn session(&self, tab: TabId) -> TabSession<'_> {
        let machine = Arc::clone(
            self.tabs
                .lock()
                .entry(tab)
                .or_insert_with(|| Arc::new(TabMachine::new())),
        );
        let guard = Arc::clone(&machine.dispatch).lock_owned().await;
        TabSession {
            channel: self,
            tab,
            machine,
            _guard: guard,
        }
    }

    /// One-shot dispatch: `session(tab)` then [`TabSession::send`]
    pub async fn send(
        &self,
        tab: TabId,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        self.session(tab).await.send(message).await
    }
}

/// Exclusive dispatch rights for one tab
pub struct TabSession<'a> {
    channel: &'a ControlChannel,
    tab: TabId,
    machine: Arc<TabMachine>,
    _guard: OwnedMutexGuard<()>,
}

impl TabSession<'_> {
    pub fn state(&self) -> SurfaceState {
        *self.machine.state.lock()
    }

    /// Deliver `message`, activating the surface once if nobody is listening.
    ///
    /// Resolves with the surface's reply (`None` for fire-and-forget
    /// responders). If activation or the single redelivery fails, the message
    /// is reported as [`ChannelError::Dropped`].
    pub async fn send(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        match self.channel.host.deliver(self.tab, &message).await {
            Ok(reply) => {
                self.transition(SurfaceState::SurfaceReady);
                Ok(reply)
            }
            Err(ChannelError::TabClosed(tab)) => {
                self.channel.forget(tab);
                Err(ChannelError::TabClosed(tab))
            }
            Err(err) if err.is_no_receiver() => self.recover(message).await,
            Err(err) => Err(err),
        }
    }

    async fn recover(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        self.transition(SurfaceState::Injecting);
        info!(
            tab = self.tab,
            resource = %self.channel.resource,
            action = message.action(),
            "No surface listening, activating"
        );

        if let Err(cause) = self
            .channel
            .host
            .activate_surface(self.tab, &self.channel.resource)
            .await
        {
            self.transition(SurfaceState::NoSurface);
            if matches!(cause, ChannelError::TabClosed(_)) {
                self.channel.forget(self.tab);
            }
            return Err(self.dropped(message, cause));
        }

        self.transition(SurfaceState::SurfaceReady);
        match self.channel.host.deliver(self.tab, &message).await {
            Ok(reply) => Ok(reply),
            Err(cause) => {
                self.transition(SurfaceState::NoSurface);
                Err(self.dropped(message, cause))
            }
        }
    }

    fn dropped(&self, message: ControlMessage, cause: ChannelError) -> ChannelError {
        warn!(
            tab = self.tab,
            action = message.action(),
            cause = %cause,
            "Dropping message"
        );
        ChannelError::Dropped {
            tab: self.tab,
            message,
            cause: Box::new(cause),
        }
    }

    fn transition(&self, to: SurfaceState) {
        let from = {
            let mut state = self.machine.state.lock();
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            debug!(tab = self.tab, %from, %to, "Surface state transition");
            // No observers is fine.
            let _ = self.channel.transitions.send(StateChange {
                tab: self.tab,
                from,
                to,
            });
        }
    }
}
