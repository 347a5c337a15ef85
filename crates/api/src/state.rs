use std::sync::Arc;

use conveyor_dispatch::Dispatcher;
use conveyor_events::TaskEventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The dispatcher core: task store, worker registry, queues.
    pub dispatcher: Arc<Dispatcher>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Event bus carrying per-task chunk and terminal events.
    pub events: Arc<TaskEventBus>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch_config()));
        let events = dispatcher.events();
        Self {
            dispatcher,
            config: Arc::new(config),
            events,
        }
    }
}
