use thiserror::Error;

/// Capability-level failures. Every variant degrades a feature; none of them
/// is allowed to abort a running session.
#[derive(Debug, Error)]
pub enum RunflowError {
    /// A platform capability refused access (location, motion, microphone).
    #[error("permission denied for {0}")]
    PermissionDenied(&'static str),

    /// Location fixes stopped arriving or timed out; step estimation takes over.
    #[error("location signal lost: {0}")]
    SignalLoss(String),

    /// The recognition stream failed; always retried with backoff.
    #[error("speech recognition fault: {0}")]
    RecognitionFault(String),

    /// The assistant gateway failed; the local command handler answers instead.
    #[error("assistant unavailable: {0}")]
    AssistantFault(String),
}
