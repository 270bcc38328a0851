//! Continuously-restarting voice command pipeline.
//!
//! Recognition providers terminate unpredictably (silence timeouts, transient
//! errors), so the restart-on-end/error loop is the core contract here: the
//! microphone stays live for the whole run without user intervention. The
//! adapter's callbacks are turned into [`RecognitionEvent`] messages and the
//! pipeline walks a named state machine over them instead of chaining
//! restart callbacks.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::assistant::AssistantCoach;
use crate::capabilities::{RecognitionEvent, Speaker, SpeechRecognizer};
use crate::models::RunStats;
use crate::settings::SettingsStore;

use super::classifier::{
    classify, is_noise, local_answer, normalize, routes_to_assistant, wants_stop, VoiceIntent,
};

/// Backoff after a recognition error before re-entering `Listening`.
const ERROR_RESTART_DELAY: Duration = Duration::from_millis(2000);
/// Backoff after the provider ends the stream on its own.
const END_RESTART_DELAY: Duration = Duration::from_millis(500);
/// Grace period between a spoken stop acknowledgment and actual teardown.
const STOP_COMMAND_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Listening,
    /// A final transcript is being classified and dispatched.
    HandlingResult,
    Restarting,
}

/// Requests the pipeline sends back to the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    StopRun,
}

pub struct VoicePipeline {
    recognizer: Arc<dyn SpeechRecognizer>,
    speaker: Arc<dyn Speaker>,
    coach: Arc<AssistantCoach>,
    settings: Option<Arc<SettingsStore>>,
    stats_rx: watch::Receiver<RunStats>,
    control_tx: mpsc::Sender<ControlRequest>,
}

impl VoicePipeline {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        speaker: Arc<dyn Speaker>,
        coach: Arc<AssistantCoach>,
        settings: Option<Arc<SettingsStore>>,
        stats_rx: watch::Receiver<RunStats>,
        control_tx: mpsc::Sender<ControlRequest>,
    ) -> Self {
        Self {
            recognizer,
            speaker,
            coach,
            settings,
            stats_rx,
            control_tx,
        }
    }

    /// Drive the recognition loop until the token cancels. Total recognition
    /// failure returns without touching the rest of the session: voice input
    /// is simply disabled for the remainder of the run.
    pub async fn run(self, cancel: CancellationToken) {
        info!("voice pipeline {:?}", PipelineState::Starting);
        let mut events = match self.recognizer.start().await {
            Ok(rx) => rx,
            Err(err) => {
                warn!("voice recognition unavailable: {err}");
                self.speaker.speak("Voice recognition failed to start");
                return;
            }
        };
        info!("voice pipeline {:?}", PipelineState::Listening);

        let final_state = loop {
            tokio::select! {
                _ = cancel.cancelled() => break PipelineState::Stopped,
                event = events.recv() => {
                    let next = match event {
                        Some(RecognitionEvent::Transcript(raw)) => {
                            info!("voice pipeline {:?}", PipelineState::HandlingResult);
                            self.handle_transcript(&raw, &cancel).await;
                            // the underlying stream is continuous; back to listening
                            PipelineState::Listening
                        }
                        Some(RecognitionEvent::Error(message)) => {
                            warn!("recognition error: {message}");
                            self.speaker.speak(&format!("Voice error: {message}"));
                            self.restart_after(ERROR_RESTART_DELAY, &cancel, &mut events).await
                        }
                        Some(RecognitionEvent::Ended) | None => {
                            info!("recognition stream ended");
                            self.restart_after(END_RESTART_DELAY, &cancel, &mut events).await
                        }
                    };
                    if next != PipelineState::Listening {
                        break next;
                    }
                }
            }
        };

        info!("voice pipeline {:?}", final_state);
    }

    /// Enter `Restarting`: back off, then try to re-open the recognition
    /// stream. Failure to restart leaves the pipeline `Stopped` until the
    /// next session start.
    async fn restart_after(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
        events: &mut mpsc::Receiver<RecognitionEvent>,
    ) -> PipelineState {
        info!(
            "voice pipeline {:?}, backing off {}ms",
            PipelineState::Restarting,
            delay.as_millis()
        );
        tokio::select! {
            _ = cancel.cancelled() => return PipelineState::Stopped,
            _ = tokio::time::sleep(delay) => {}
        }

        match self.recognizer.start().await {
            Ok(rx) => {
                *events = rx;
                PipelineState::Listening
            }
            Err(err) => {
                warn!("failed to restart recognition: {err}");
                PipelineState::Stopped
            }
        }
    }

    async fn handle_transcript(&self, raw: &str, cancel: &CancellationToken) {
        let utterance = normalize(raw);
        if is_noise(&utterance) {
            return;
        }
        info!("voice command: {utterance:?}");

        let stats = *self.stats_rx.borrow();
        let response = self.dispatch(&utterance, &stats).await;
        if !response.is_empty() {
            self.speaker.speak(&response);
        }

        // Stop detection is independent of the routing branch; the delay lets
        // the spoken acknowledgment finish before teardown.
        if wants_stop(&utterance) {
            let control_tx = self.control_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(STOP_COMMAND_DELAY) => {
                        let _ = control_tx.send(ControlRequest::StopRun).await;
                    }
                }
            });
        }
    }

    /// Choose the assistant or the local handler; assistant failures fall
    /// back to the local answer for the same utterance.
    async fn dispatch(&self, utterance: &str, stats: &RunStats) -> String {
        let intent = classify(utterance);

        if intent == VoiceIntent::AssistantToggle {
            return match self.coach.toggle() {
                Some(enabled) => {
                    if let Some(settings) = &self.settings {
                        if let Err(err) = settings.set_assistant_mode(enabled) {
                            warn!("failed to persist assistant mode: {err:#}");
                        }
                    }
                    if enabled {
                        "AI Coach activated!".to_string()
                    } else {
                        "Basic mode activated".to_string()
                    }
                }
                None => "AI Coach not available.".to_string(),
            };
        }

        if routes_to_assistant(utterance, self.coach.is_enabled(), self.coach.is_online()) {
            let prompt = self.coach.command_prompt(utterance, stats);
            match self.coach.ask(&prompt).await {
                Ok(answer) => return answer,
                Err(err) => warn!("assistant dispatch failed, using local answer: {err}"),
            }
        }

        local_answer(intent, utterance, stats)
    }
}
