use crate::auth::Sessions;
use crate::config::Config;
use crate::models::Store;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<Store>>,
    pub sessions: Arc<Mutex<Sessions>>,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        let sessions = Sessions::new(config.session_ttl);
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            sessions: Arc::new(Mutex::new(sessions)),
        }
    }
}
