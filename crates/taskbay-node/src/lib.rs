//! Taskbay node: the runnable marketplace service.
//!
//! Wires storage, the market coordinator, and the delivery collaborators
//! together behind an axum REST API.

pub mod api;
pub mod config;
pub mod events;
pub mod logging;
pub mod push;

pub use api::{build_router, start_api_server, AppState};
pub use config::NodeConfig;
pub use events::{BusRealtime, EventBus, MarketEvent, PresenceRegistry};
pub use push::{DeviceRegistry, LogPushGateway, PushDispatcher, PushGateway};
