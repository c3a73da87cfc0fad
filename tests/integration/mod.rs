//! Integration tests for the tabrelay coordination layer

mod cli_binary;
mod keyed_store;
mod scenarios;
mod test_utils;

pub use test_utils::{with_xdg_env, RecordingSurface};
