//! Jobwatch command-line front end: wires the core state machine to the engine.
pub mod platform;

pub use platform::run_app;
