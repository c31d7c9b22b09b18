//! Response models for the health and diagnostics API
//!
//! DTOs serialized into HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{
    ErrorResponse, HealthResponse, LoggingResponse, ReadinessResponse, StatsResponse,
    StatusResponse, SysEnvResponse,
};
