mod sample;
mod session;

pub use sample::{MotionSample, PositionSample};
pub use session::{
    calories_estimate, format_pace, format_time, speed_kph, RunRecord, RunStats, SessionStatus,
};
