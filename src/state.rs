//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::AppConfig;
use crate::database::Store;
use crate::geocoding::Geocoder;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub geocoder: Arc<dyn Geocoder>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, geocoder: Arc<dyn Geocoder>, config: AppConfig) -> Self {
        Self {
            store,
            geocoder,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
