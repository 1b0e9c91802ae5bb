// aquila-api: Async Rust client for the Aquila device hub (REST + push channels)

pub mod client;
pub mod devices;
pub mod error;
pub mod interceptor;
pub mod models;
pub mod services;
pub mod session;
pub mod transport;
pub mod websocket;

pub use client::HubClient;
pub use error::Error;
pub use interceptor::{Interceptor, NoopInterceptor};
pub use models::{Device, DeviceQuery, ServicePatch, ServiceState};
pub use transport::{JSON_CONTENT_TYPE, TlsMode, TransportConfig};
pub use websocket::{PushChannel, PushHandle, PushNotification, ReconnectConfig};
