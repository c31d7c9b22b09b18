//! API Module
//!
//! HTTP handlers and routing for the health and diagnostics surface.
//!
//! # Endpoints
//! - `GET /status` - Static liveness marker
//! - `GET /healthz` - Liveness with timestamp
//! - `GET /readyz` - Pings the configured store
//! - `GET /redis-health-check` - Pings Redis
//! - `GET /sys-env` - Application and cache settings
//! - `GET /logging` - Emits a line at every log level
//! - `GET /stats` - Cache repository statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
