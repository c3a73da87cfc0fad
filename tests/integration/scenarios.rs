//! End-to-end controller scenarios: activation with and without a surface,
//! and model listing against an unreachable endpoint.

use std::sync::Arc;
use std::time::Duration;
use tabrelay::channel::{
    ControlChannel, ControlMessage, LocalHost, MessageHandler, StateChange, SurfaceState,
};
use tabrelay::controller::Controller;
use tabrelay::error::ProviderError;
use tabrelay::provider::OllamaClient;
use tabrelay::retry::RetryPolicy;
use tabrelay::store::{MemoryArea, StorageArea, StoreContext};
use tabrelay::surface::Surface;
use tokio::sync::broadcast;

use crate::integration::RecordingSurface;

fn controller_for(host: Arc<LocalHost>, area: Arc<dyn StorageArea>) -> Controller {
    Controller::new(
        ControlChannel::new(host, "content.js"),
        StoreContext::open(area, "controller"),
        RetryPolicy::default(),
    )
}

fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<(SurfaceState, SurfaceState)> {
    let mut seen = Vec::new();
    while let Ok(change) = rx.try_recv() {
        seen.push((change.from, change.to));
    }
    seen
}

#[tokio::test]
async fn scenario_a_activation_without_surface_injects_then_delivers_once() {
    let recorder = RecordingSurface::new();
    let factory_recorder = recorder.clone();
    let host = Arc::new(LocalHost::new().with_surface_factory(move |_tab| {
        let surface = factory_recorder.clone();
        async move { Ok::<_, String>(surface as Arc<dyn MessageHandler>) }
    }));
    host.open_tab(7);

    let controller = controller_for(host.clone(), Arc::new(MemoryArea::new()));
    let mut transitions = controller.channel().watch_transitions();

    let visible = controller.on_activation(7).await.unwrap();

    assert!(visible);
    assert_eq!(
        drain(&mut transitions),
        vec![
            (SurfaceState::NoSurface, SurfaceState::Injecting),
            (SurfaceState::Injecting, SurfaceState::SurfaceReady),
        ]
    );
    assert_eq!(host.injected_resources(7), vec!["content.js".to_string()]);
    assert_eq!(
        recorder.seen(),
        vec![ControlMessage::ToggleVisibility { state: true }]
    );
}

#[tokio::test]
async fn scenario_b_activation_with_surface_delivers_directly() {
    let area: Arc<dyn StorageArea> = Arc::new(MemoryArea::new());
    let surface = Arc::new(Surface::mount(7, &StoreContext::open(area.clone(), "surface-7")).await);
    let host = Arc::new(LocalHost::new());
    host.attach_surface(7, surface.clone());

    let controller = controller_for(host.clone(), area);
    assert!(!controller.is_visible());

    let visible = controller.on_activation(7).await.unwrap();

    assert!(visible);
    assert!(controller.is_visible());
    assert!(surface.is_visible());
    assert_eq!(host.injection_count(7), 0);
    assert_eq!(host.delivery_count(7), 1);
    assert_eq!(controller.surface_state(7), SurfaceState::SurfaceReady);
}

#[tokio::test]
async fn scenario_b_second_activation_hides_again() {
    let area: Arc<dyn StorageArea> = Arc::new(MemoryArea::new());
    let surface = Arc::new(Surface::mount(7, &StoreContext::open(area.clone(), "surface-7")).await);
    let host = Arc::new(LocalHost::new());
    host.attach_surface(7, surface.clone());
    let controller = controller_for(host, area);

    assert!(controller.on_activation(7).await.unwrap());
    assert!(!controller.on_activation(7).await.unwrap());
    assert!(!surface.is_visible());
}

#[tokio::test]
async fn scenario_c_unreachable_endpoint_is_not_retried() {
    // Reserve a port, then release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let lister = Arc::new(OllamaClient::new(Some(format!("http://127.0.0.1:{}", port))).unwrap());
    let host = Arc::new(LocalHost::new());
    let controller = controller_for(host, Arc::new(MemoryArea::new())).with_lister(lister);

    // With the default 1s base delay, any retry would push this well past 500ms.
    let started = std::time::Instant::now();
    let err = controller.list_models().await.unwrap_err();

    assert!(
        matches!(err, ProviderError::Connection(_) | ProviderError::Timeout(_)),
        "unexpected error {err:?}"
    );
    assert!(!err.to_string().contains("429"));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn model_selection_reaches_every_surface() {
    let area: Arc<dyn StorageArea> = Arc::new(MemoryArea::new());
    let on_tab = Arc::new(Surface::mount(1, &StoreContext::open(area.clone(), "surface-1")).await);
    let elsewhere =
        Arc::new(Surface::mount(2, &StoreContext::open(area.clone(), "surface-2")).await);
    let host = Arc::new(LocalHost::new());
    host.attach_surface(1, on_tab.clone());
    host.attach_surface(2, elsewhere.clone());
    let controller = controller_for(host, area);

    controller.select_model(1, "llama3").await.unwrap();

    // Pushed directly to tab 1.
    assert_eq!(on_tab.view().model.as_deref(), Some("llama3"));
    // Tab 2 learns it through the store broadcast.
    for _ in 0..100 {
        if elsewhere.view().model.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(elsewhere.view().model.as_deref(), Some("llama3"));
    assert_eq!(controller.active_model().await.as_deref(), Some("llama3"));
}
