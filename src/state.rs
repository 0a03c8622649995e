use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::session::SessionStore;
use crate::config::Config;
use crate::services::PriceFeed;
use crate::store::DynStore;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Config,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub price_feed: Arc<dyn PriceFeed>,
}

impl AppState {
    pub fn new(store: DynStore, config: Config, price_feed: Arc<dyn PriceFeed>) -> Self {
        let sessions = SessionStore::new(config.auth.session_hours);
        Self {
            store,
            config,
            sessions: Arc::new(Mutex::new(sessions)),
            price_feed,
        }
    }
}
