//! printdash - personal dashboard and proxy for workshop 3D printers.
//!
//! This library provides the components behind the dashboard binary: an HTTP
//! front end that gates webcam streaming, job status, print cancellation and
//! light switching behind basic auth, plus a background monitor per printer
//! that posts a chat message whenever the printer's job state changes.
//!
//! # Core Components
//!
//! * [`config`] - Configuration from environment variables and secret files
//! * [`printer`] - Printer API client (job status, cancel, webcam stream)
//! * [`notifier`] - Matrix chat notifications
//! * [`monitor`] - Per-printer job state polling and change detection
//! * [`server`] - Basic-auth-gated axum front end

pub mod config;
pub mod monitor;
pub mod notifier;
pub mod printer;
pub mod server;

// Re-export commonly used types for convenience
pub use config::{Config, MatrixConfig, PrinterConfig};
pub use monitor::{StateChange, StateTracker};
pub use notifier::Notifier;
pub use printer::{JobStatus, PrinterClient};
pub use server::AppState;
