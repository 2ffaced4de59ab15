use std::sync::Arc;

use mongodb::Database;

use crate::summary::TextGenerator;

/// Shared handles passed to every handler. The text generator lives here so
/// its lifecycle is owned by the entry point, not by the summary module.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub generator: Arc<dyn TextGenerator>,
}
