//! In-process hosting environment.
//!
//! Models the browser side of the channel: tabs that may or may not have a
//! surface listening, restricted pages that refuse activation, navigation
//! (which tears the surface down) and tab closure. Surfaces are created on
//! activation by a registered factory. Also routes surface-originated
//! requests to the controller's handler.

use crate::channel::host::{ControllerPort, Host, MessageHandler};
use crate::channel::{ControlMessage, ControlReply, TabId};
use crate::error::ChannelError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

type SurfaceFactory =
    Arc<dyn Fn(TabId) -> BoxFuture<'static, Result<Arc<dyn MessageHandler>, String>> + Send + Sync>;

#[derive(Default)]
struct TabEntry {
    surface: Option<Arc<dyn MessageHandler>>,
    restricted: bool,
    injected: Vec<String>,
    deliveries: usize,
}

#[derive(Default)]
pub struct LocalHost {
    tabs: Mutex<HashMap<TabId, TabEntry>>,
    factory: Mutex<Option<SurfaceFactory>>,
    controller: Mutex<Option<Arc<dyn MessageHandler>>>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces created on activation come from `factory`
    pub fn with_surface_factory<F, Fut>(self, factory: F) -> Self
    where
        F: Fn(TabId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn MessageHandler>, String>> + Send + 'static,
    {
        self.set_surface_factory(factory);
        self
    }

    pub fn set_surface_factory<F, Fut>(&self, factory: F)
    where
        F: Fn(TabId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn MessageHandler>, String>> + Send + 'static,
    {
        let factory: SurfaceFactory = Arc::new(move |tab| factory(tab).boxed());
        *self.factory.lock() = Some(factory);
    }

    /// Register the handler for requests sent through [`ControllerPort`]
    pub fn set_controller(&self, handler: Arc<dyn MessageHandler>) {
        *self.controller.lock() = Some(handler);
    }

    pub fn open_tab(&self, tab: TabId) {
        self.tabs.lock().entry(tab).or_default();
    }

    /// Open a privileged page that refuses surface activation
    pub fn open_restricted_tab(&self, tab: TabId) {
        self.tabs.lock().entry(tab).or_default().restricted = true;
    }

    /// Put a listening surface on `tab`, opening the tab if needed
    pub fn attach_surface(&self, tab: TabId, surface: Arc<dyn MessageHandler>) {
        self.tabs.lock().entry(tab).or_default().surface = Some(surface);
    }

    /// Navigation tears down the tab's surface
    pub fn navigate(&self, tab: TabId) {
        if let Some(entry) = self.tabs.lock().get_mut(&tab) {
            entry.surface = None;
        }
    }

    pub fn close_tab(&self, tab: TabId) {
        self.tabs.lock().remove(&tab);
    }

    pub fn has_surface(&self, tab: TabId) -> bool {
        self.tabs
            .lock()
            .get(&tab)
            .is_some_and(|entry| entry.surface.is_some())
    }

    /// Activation attempts made on `tab`, restricted or not
    pub fn injection_count(&self, tab: TabId) -> usize {
        self.tabs.lock().get(&tab).map_or(0, |entry| entry.injected.len())
    }

    pub fn injected_resources(&self, tab: TabId) -> Vec<String> {
        self.tabs
            .lock()
            .get(&tab)
            .map(|entry| entry.injected.clone())
            .unwrap_or_default()
    }

    /// Messages handed to a listening surface on `tab`
    pub fn delivery_count(&self, tab: TabId) -> usize {
        self.tabs.lock().get(&tab).map_or(0, |entry| entry.deliveries)
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn deliver(
        &self,
        tab: TabId,
        message: &ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        let surface = {
            let mut tabs = self.tabs.lock();
            let entry = tabs.get_mut(&tab).ok_or(ChannelError::TabClosed(tab))?;
            let surface = entry
                .surface
                .clone()
                .ok_or(ChannelError::NoReceiver(tab))?;
            entry.deliveries += 1;
            surface
        };

        debug!(tab, action = message.action(), "Delivering to surface");
        surface.on_message(message.clone()).resolve(tab).await
    }

    async fn activate_surface(&self, tab: TabId, resource: &str) -> Result<(), ChannelError> {
        {
            let mut tabs = self.tabs.lock();
            let entry = tabs.get_mut(&tab).ok_or(ChannelError::TabClosed(tab))?;
            entry.injected.push(resource.to_string());
            if entry.restricted {
                return Err(ChannelError::InjectionFailed {
                    tab,
                    reason: "cannot load resources into a restricted page".to_string(),
                });
            }
        }

        let factory = self
            .factory
            .lock()
            .clone()
            .ok_or_else(|| ChannelError::InjectionFailed {
                tab,
                reason: format!("no surface registered for resource '{}'", resource),
            })?;
        let surface = factory(tab)
            .await
            .map_err(|reason| ChannelError::InjectionFailed { tab, reason })?;

        // The tab may have closed while the surface was loading.
        let mut tabs = self.tabs.lock();
        let entry = tabs.get_mut(&tab).ok_or(ChannelError::TabClosed(tab))?;
        entry.surface = Some(surface);
        Ok(())
    }
}

#[async_trait]
impl ControllerPort for LocalHost {
    async fn request(
        &self,
        from: TabId,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, ChannelError> {
        let controller = self
            .controller
            .lock()
            .clone()
            .ok_or(ChannelError::ControllerUnavailable)?;
        debug!(tab = from, action = message.action(), "Surface request to controller");
        controller.on_message(message).resolve(from).await
    }
}
