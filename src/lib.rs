//! Tabrelay: Controller/Surface Coordination
//!
//! Runtime coordination between a long-lived background controller and
//! short-lived per-tab surfaces: a shared change-notifying key/value store,
//! bounded retry with exponential backoff for outbound calls, and a control
//! channel that activates a tab's surface on demand when nobody is listening.

pub mod channel;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod store;
pub mod surface;
