//! Async host for model views: bounded parallel partition execution on tokio,
//! tracing-instrumented callbacks and environment-driven configuration.

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod wrap;

pub use config::HostConfig;
pub use driver::ParallelDriver;
pub use error::HostError;
pub use logging::init_logging;
pub use wrap::TracingWrapper;
