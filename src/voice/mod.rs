pub mod classifier;
pub mod pipeline;

pub use classifier::{classify, normalize, VoiceIntent};
pub use pipeline::{PipelineState, VoicePipeline};
