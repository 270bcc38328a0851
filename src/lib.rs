//! RunFlow core: tracks an outdoor run in real time.
//!
//! Three pieces carry the interesting logic: the position fusion engine
//! (filters GPS fixes and blends step estimation under signal loss), the
//! voice command pipeline (a continuously-restarting recognition loop), and
//! the session controller (lifecycle, distance/time accounting, milestone
//! announcements, persisted history).
//!
//! Platform adapters — GPS, accelerometer, speech in/out, the assistant
//! gateway — are injected through the traits in [`capabilities`]; the core
//! never talks to hardware or the network directly.

pub mod assistant;
pub mod capabilities;
pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod milestone;
pub mod models;
pub mod session;
pub mod settings;
pub mod voice;

pub use assistant::AssistantCoach;
pub use config::FilterConfig;
pub use db::Database;
pub use error::RunflowError;
pub use fusion::FusionEngine;
pub use models::{PositionSample, RunRecord, RunStats, SessionStatus};
pub use session::RunController;
pub use settings::SettingsStore;

/// Initialize logging for embedding binaries (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
