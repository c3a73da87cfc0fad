//! Well-known shared settings.
//!
//! Visibility is deliberately absent: it is owned by the controller and only
//! ever pushed over the control channel.

use crate::store::{KeyedStore, StoreContext};

pub const ACTIVE_MODEL: &str = "activeModel";
pub const API_KEY: &str = "apiKey";

/// Keys the CLI may read and write
pub const KNOWN_KEYS: &[&str] = &[ACTIVE_MODEL, API_KEY];

/// Currently selected model id; `None` until the user picks one
pub fn active_model(ctx: &StoreContext) -> KeyedStore<Option<String>> {
    ctx.live_cell(ACTIVE_MODEL, None)
}

/// Provider credential; `None` until configured
pub fn api_key(ctx: &StoreContext) -> KeyedStore<Option<String>> {
    ctx.live_cell(API_KEY, None)
}

/// Resolve a well-known setting by key
pub fn lookup(ctx: &StoreContext, key: &str) -> Option<KeyedStore<Option<String>>> {
    match key {
        ACTIVE_MODEL => Some(active_model(ctx)),
        API_KEY => Some(api_key(ctx)),
        _ => None,
    }
}
