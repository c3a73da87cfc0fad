//! CLI domain: parse, route and output only.
//! Single route table dispatches to the controller, store and provider.

mod output;
mod parse;
mod route;

pub use output::{
    format_models_table, format_section_heading, format_simulation, map_error, SimulationReport,
};
pub use parse::{Cli, Commands};
pub use route::{parse_setting_value, simulate, RunContext};
