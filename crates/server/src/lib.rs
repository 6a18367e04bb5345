//! HTTP and WebSocket surface for the TTS streaming gateway
//!
//! REST endpoints handle admission and discovery; the streaming endpoint
//! upgrades to a WebSocket and hands the connection to the worker pool as a
//! framed transport.

pub mod http;
pub mod metrics;
pub mod state;
pub mod wav;
pub mod ws;

pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
pub use ws::WsTransport;
