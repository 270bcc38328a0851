//! Trait seams for the platform adapters the core depends on.
//!
//! The core never talks to a real GPS chip, accelerometer, microphone, or
//! network; it consumes these capabilities through trait objects so the
//! embedding app supplies platform bindings and tests supply fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RunflowError;
use crate::models::{MotionSample, PositionSample};

/// Events delivered by an active location watch.
#[derive(Debug, Clone)]
pub enum LocationEvent {
    Fix(PositionSample),
    /// The adapter lost the signal or timed out; recoverable.
    Unavailable(String),
}

/// Events emitted by a continuous speech recognition stream.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// A final (non-interim) transcript.
    Transcript(String),
    /// Transient recognition failure; the pipeline retries with backoff.
    Error(String),
    /// The provider closed the stream (silence timeout etc.).
    Ended,
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    /// One-shot high accuracy fix, awaited with a timeout. Used to gate
    /// session start.
    async fn initial_fix(&self, timeout_ms: u64) -> Result<PositionSample, RunflowError>;

    /// Begin a continuous watch. Events flow through the returned channel
    /// until the receiver is dropped.
    async fn watch(&self) -> Result<mpsc::Receiver<LocationEvent>, RunflowError>;
}

#[async_trait]
pub trait MotionSource: Send + Sync {
    /// Subscribe to raw acceleration samples. Some platforms require a
    /// permission prompt before the stream opens.
    async fn subscribe(&self) -> Result<mpsc::Receiver<MotionSample>, RunflowError>;
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open a continuous, final-transcripts-only recognition stream.
    async fn start(&self) -> Result<mpsc::Receiver<RecognitionEvent>, RunflowError>;
}

/// Text-to-speech. `speak` cancels any utterance already playing so at most
/// one is audible at a time.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

/// Remote natural-language capability; failures are always recoverable.
#[async_trait]
pub trait AssistantGateway: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, RunflowError>;
}
