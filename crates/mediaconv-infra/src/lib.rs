//! Mediaconv Infrastructure Library
//!
//! Shared pieces used by the gateway, the worker and the CLI:
//! - Telemetry initialization
//! - Request ID middleware
//! - The JSON error body
//! - Shutdown signal handling

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod error;
pub mod shutdown;
pub mod telemetry;

#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};

pub use error::ErrorResponse;
pub use shutdown::shutdown_signal;
pub use telemetry::{init_telemetry, LogFormat};
