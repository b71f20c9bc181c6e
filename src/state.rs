use std::sync::Arc;

use crate::live::Hub;
use crate::store::Store;
use crate::types::LeagueConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub league: Arc<LeagueConfig>,
    pub live: Hub,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(store: Store, league: LeagueConfig, secure_cookies: bool) -> Self {
        Self {
            store: Arc::new(store),
            league: Arc::new(league),
            live: Hub::new(),
            secure_cookies,
        }
    }
}
