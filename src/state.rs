//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the storage boundary and the realtime channel hub; per-connection
//! chat sessions are built from these on WebSocket upgrade and own all of
//! their own mutable state.

use std::sync::Arc;

use crate::hub::ChannelHub;
use crate::store::ChatStore;

/// Shared application state. Clone is required by Axum; both fields are
/// Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub hub: Arc<ChannelHub>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, hub: Arc<ChannelHub>) -> Self {
        Self { store, hub }
    }
}

/// Parse an environment variable with a default on absence or parse failure.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_value() {
        assert_eq!(env_parse("PAIRCHAT_TEST_UNSET_VAR", 42_usize), 42);
    }
}
