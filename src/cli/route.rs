//! CLI route: single route table and run context.

use crate::channel::{ControlChannel, LocalHost, MessageHandler, StateChange, TabId};
use crate::cli::output::{format_models_table, format_simulation, SimulationReport};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, RelayConfig};
use crate::controller::Controller;
use crate::error::{ApiError, StorageError};
use crate::provider::{list_models_with_retry, normalize_model_id, ProviderFactory};
use crate::retry::RetryPolicy;
use crate::store::{settings, KeyedStore, MemoryArea, SledArea, StorageArea, StoreContext};
use crate::surface::Surface;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Runtime context for CLI execution, built from the layered configuration
pub struct RunContext {
    config: RelayConfig,
}

impl RunContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?.validated()?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = match command {
            Commands::Models { select } => self.handle_models(select.as_deref()).await,
            Commands::Get { key } => self.handle_get(key).await,
            Commands::Set { key, value } => self.handle_set(key, value).await,
            Commands::Reset { key } => self.handle_reset(key).await,
            Commands::Simulate {
                tab,
                surface_present,
                restricted,
                toggles,
            } => {
                self.handle_simulate(*tab, *surface_present, *restricted, *toggles)
                    .await
            }
            Commands::Config => self.handle_config(),
        };
        debug!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn open_store(&self) -> Result<StoreContext, ApiError> {
        let path = &self.config.storage.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }
        let area = SledArea::open(path)?;
        Ok(StoreContext::open(Arc::new(area), "cli"))
    }

    fn setting(&self, store: &StoreContext, key: &str) -> Result<KeyedStore<Option<String>>, ApiError> {
        settings::lookup(store, key).ok_or_else(|| ApiError::UnknownSetting(key.to_string()))
    }

    async fn handle_models(&self, select: Option<&str>) -> Result<String, ApiError> {
        let lister = ProviderFactory::create_client(&self.config.provider)?;
        let policy = RetryPolicy::from_config(&self.config.retry);
        let models = list_models_with_retry(lister.as_ref(), &policy).await?;

        let store = self.open_store()?;
        let active_model = settings::active_model(&store);
        if let Some(requested) = select {
            let id = normalize_model_id(requested);
            if !models.iter().any(|m| m.id == id) {
                return Err(ApiError::UnknownModel(id));
            }
            active_model.set(Some(id.clone())).await?;
            info!(model = %id, "Active model stored");
        }

        let active = active_model.try_get().await?;
        Ok(format_models_table(&models, active.as_deref()))
    }

    async fn handle_get(&self, key: &str) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let value = self.setting(&store, key)?.try_get().await?;
        Ok(render_setting(&value))
    }

    async fn handle_set(&self, key: &str, raw: &str) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let cell = self.setting(&store, key)?;
        let value = parse_setting_value(raw);
        cell.set(value.clone()).await?;
        Ok(format!("{} = {}", key, render_setting(&value)))
    }

    async fn handle_reset(&self, key: &str) -> Result<String, ApiError> {
        let store = self.open_store()?;
        let cell = self.setting(&store, key)?;
        cell.reset().await?;
        Ok(format!("{} = {}", key, render_setting(cell.default_value())))
    }

    async fn handle_simulate(
        &self,
        tab: TabId,
        surface_present: bool,
        restricted: bool,
        toggles: u32,
    ) -> Result<String, ApiError> {
        let report = simulate(&self.config, tab, surface_present, restricted, toggles).await?;
        Ok(format_simulation(&report))
    }

    fn handle_config(&self) -> Result<String, ApiError> {
        let mut shown = self.config.clone();
        if shown.provider.api_key.is_some() {
            shown.provider.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
    }
}

/// Run `toggles` activations of a controller against an in-process tab.
///
/// Uses an in-memory store so nothing durable is touched.
pub async fn simulate(
    config: &RelayConfig,
    tab: TabId,
    surface_present: bool,
    restricted: bool,
    toggles: u32,
) -> Result<SimulationReport, ApiError> {
    let area: Arc<dyn StorageArea> = Arc::new(MemoryArea::new());
    let mounted: Arc<Mutex<Vec<Arc<Surface>>>> = Arc::new(Mutex::new(Vec::new()));

    let factory_area = Arc::clone(&area);
    let factory_mounted = Arc::clone(&mounted);
    let host = Arc::new(LocalHost::new().with_surface_factory(move |tab| {
        let area = Arc::clone(&factory_area);
        let mounted = Arc::clone(&factory_mounted);
        async move {
            let ctx = StoreContext::open(area, &format!("surface-{}", tab));
            let surface = Arc::new(Surface::mount(tab, &ctx).await);
            mounted.lock().push(Arc::clone(&surface));
            Ok::<_, String>(surface as Arc<dyn MessageHandler>)
        }
    }));

    if restricted {
        host.open_restricted_tab(tab);
    } else if surface_present {
        let ctx = StoreContext::open(Arc::clone(&area), &format!("surface-{}", tab));
        let surface = Arc::new(Surface::mount(tab, &ctx).await);
        mounted.lock().push(Arc::clone(&surface));
        host.attach_surface(tab, surface);
    } else {
        host.open_tab(tab);
    }

    let controller = Controller::new(
        ControlChannel::new(host.clone(), config.surface.resource.clone()),
        StoreContext::open(area, "controller"),
        RetryPolicy::from_config(&config.retry),
    );
    host.set_controller(Arc::new(controller.inbox()));
    let mut transitions = controller.channel().watch_transitions();

    let mut activations = Vec::new();
    let mut seen = Vec::new();
    for _ in 0..toggles {
        let outcome = controller
            .on_activation(tab)
            .await
            .map_err(|e| e.to_string());
        activations.push(outcome);
        // One activation emits at most three transitions, so draining per
        // activation stays well inside the broadcast buffer.
        drain_transitions(&mut transitions, &mut seen);
    }

    let surface = mounted.lock().last().map(|s| s.view());
    Ok(SimulationReport {
        tab,
        transitions: seen,
        activations,
        injections: host.injection_count(tab),
        deliveries: host.delivery_count(tab),
        controller_visible: controller.is_visible(),
        surface,
    })
}

fn drain_transitions(rx: &mut broadcast::Receiver<StateChange>, seen: &mut Vec<StateChange>) {
    loop {
        match rx.try_recv() {
            Ok(change) => seen.push(change),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Transition observer lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

/// `null` clears the setting, a JSON string is unquoted, anything else is
/// taken verbatim.
pub fn parse_setting_value(raw: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => None,
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => Some(raw.to_string()),
    }
}

fn render_setting(value: &Option<String>) -> String {
    match value {
        Some(v) => v.clone(),
        None => "(unset)".to_string(),
    }
}
