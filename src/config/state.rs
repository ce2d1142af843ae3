// Application state module
// Immutable per-process state shared by every connection

use super::types::Config;
use crate::handler::content::ContentResponder;
use crate::resource::DirProvider;

/// Application state
pub struct AppState {
    pub config: Config,
    pub provider: DirProvider,
    pub responder: ContentResponder,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            provider: DirProvider::new(&config.files.root),
            responder: ContentResponder::new(config.serve_options()),
        }
    }
}
