//! CLI output: error mapping and text presentation.

use crate::channel::StateChange;
use crate::error::{ApiError, ChannelError};
use crate::provider::ModelDescriptor;
use crate::surface::SurfaceView;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Map domain errors to a string for CLI output, with a hint where one helps.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ChannelError(ChannelError::Dropped { cause, .. })
            if matches!(**cause, ChannelError::InjectionFailed { .. }) =>
        {
            format!("{}\nhint: the page does not allow the surface to load", e)
        }
        ApiError::UnknownSetting(_) => format!(
            "{}\nhint: known settings are {}",
            e,
            crate::store::settings::KNOWN_KEYS.join(", ")
        ),
        _ => e.to_string(),
    }
}

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Model listing as a table, marking the active model
pub fn format_models_table(models: &[ModelDescriptor], active: Option<&str>) -> String {
    if models.is_empty() {
        return "No models available.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Model", "Active"]);
    for model in models {
        let marker = if Some(model.id.as_str()) == active {
            "*"
        } else {
            ""
        };
        table.add_row(vec![model.id.clone(), marker.to_string()]);
    }
    table.to_string()
}

/// Outcome of `tabrelay simulate`
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub tab: u32,
    pub transitions: Vec<StateChange>,
    pub activations: Vec<Result<bool, String>>,
    pub injections: usize,
    pub deliveries: usize,
    pub controller_visible: bool,
    pub surface: Option<SurfaceView>,
}

pub fn format_simulation(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Simulation (tab {})", report.tab))
    ));

    out.push_str("Transitions:\n");
    if report.transitions.is_empty() {
        out.push_str("  (none)\n");
    }
    for change in &report.transitions {
        out.push_str(&format!("  {} -> {}\n", change.from, change.to));
    }

    out.push_str("\nActivations:\n");
    for (i, outcome) in report.activations.iter().enumerate() {
        match outcome {
            Ok(visible) => out.push_str(&format!(
                "  {}. {} visible={}\n",
                i + 1,
                "delivered".green(),
                visible
            )),
            Err(reason) => out.push_str(&format!("  {}. {} {}\n", i + 1, "dropped".red(), reason)),
        }
    }

    out.push_str(&format!(
        "\nInjections: {}\nDeliveries: {}\nController visible: {}\n",
        report.injections, report.deliveries, report.controller_visible
    ));
    match &report.surface {
        Some(view) => out.push_str(&format!(
            "Surface: visible={} model={}\n",
            view.visible,
            view.model.as_deref().unwrap_or("-")
        )),
        None => out.push_str(&format!("Surface: {}\n", "not loaded".dimmed())),
    }
    out
}
