use std::sync::Arc;

use papercast_core::Papercast;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Papercast>,
}

impl AppState {
    pub fn new(app: Papercast) -> Self {
        Self { app: Arc::new(app) }
    }
}
