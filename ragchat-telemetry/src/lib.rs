//! Logging setup for ragchat binaries.
//!
//! Library crates only emit `tracing` events and spans; a binary calls
//! [`init_telemetry`] once at startup to decide where they go. Output is
//! written to stderr so that answers streamed to stdout stay clean.
//!
//! ```rust,ignore
//! use ragchat_telemetry::{LogFormat, TelemetryConfig, init_telemetry};
//!
//! init_telemetry(&TelemetryConfig::default().with_format(LogFormat::Json))?;
//! ```

mod init;

pub use init::{
    DEFAULT_DIRECTIVE, LogFormat, TelemetryConfig, TelemetryError, build_filter, init_telemetry,
};
