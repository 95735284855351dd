//! Observability for the printer device
//!
//! Structured logging through `tracing`, plus the best-effort single-pixel
//! status signal.

pub mod logging;
pub mod status;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use status::{LogIndicator, StatusIndicator, StatusSignal};

// Span macros for structured logging
pub use logging::{connect_span, dispatch_span};
