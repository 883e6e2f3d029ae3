// Common library: job control plane, engine contract and shared models

pub mod config;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;

pub use monitor::JobMonitors;
pub use scheduler::{InMemoryScheduler, SchedulerBackend};
