use crate::{
    config::Config,
    services::MessageStore,
    websocket::{ChatHub, PresenceRegistry},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: PresenceRegistry,
    pub hub: Arc<ChatHub>,
    pub store: Arc<dyn MessageStore>,
    pub config: Arc<Config>,
}
