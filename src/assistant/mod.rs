//! Assistant gateway wrapper: coach persona prompts, online tracking, and a
//! bounded conversation history used for context and logging only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::capabilities::AssistantGateway;
use crate::error::RunflowError;
use crate::models::{format_pace, format_time, RunStats, SessionStatus};

const HISTORY_CAPACITY: usize = 10;
const PROMPT_EXCERPT_LEN: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub prompt_excerpt: String,
    pub response_text: String,
    pub timestamp: DateTime<Utc>,
}

/// Owns the assistant-mode flag, the online flag, and the gateway handle.
/// All failures surface as [`RunflowError::AssistantFault`]; callers fall
/// back to the local handler.
pub struct AssistantCoach {
    gateway: Option<Arc<dyn AssistantGateway>>,
    enabled: AtomicBool,
    online: AtomicBool,
    history: Mutex<VecDeque<ConversationTurn>>,
}

impl AssistantCoach {
    pub fn new(gateway: Option<Arc<dyn AssistantGateway>>, enabled: bool) -> Self {
        Self {
            gateway,
            enabled: AtomicBool::new(enabled),
            online: AtomicBool::new(true),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Overwrite the mode flag, e.g. from a stored preference at startup.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip assistant mode. Returns the new value, or `None` when no gateway
    /// was configured at all (the preference stays untouched).
    pub fn toggle(&self) -> Option<bool> {
        self.gateway.as_ref()?;
        let next = !self.is_enabled();
        self.enabled.store(next, Ordering::Relaxed);
        Some(next)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Externally driven by network-state events.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
        info!(
            "assistant network state: {}",
            if online { "online" } else { "offline" }
        );
    }

    /// True when a request would actually reach the gateway.
    pub fn available(&self) -> bool {
        self.gateway.is_some() && self.is_enabled() && self.is_online()
    }

    /// Send a prompt to the gateway, recording the turn on success.
    pub async fn ask(&self, prompt: &str) -> Result<String, RunflowError> {
        if !self.is_online() {
            return Err(RunflowError::AssistantFault("offline".to_string()));
        }
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| RunflowError::AssistantFault("no gateway configured".to_string()))?;

        match gateway.ask(prompt).await {
            Ok(response) => {
                self.record_turn(prompt, &response);
                Ok(response)
            }
            Err(err) => {
                warn!("assistant request failed: {err}");
                Err(err)
            }
        }
    }

    fn record_turn(&self, prompt: &str, response: &str) {
        let excerpt: String = prompt.chars().take(PROMPT_EXCERPT_LEN).collect();
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.push_back(ConversationTurn {
            prompt_excerpt: excerpt,
            response_text: response.to_string(),
            timestamp: Utc::now(),
        });
        while history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        match self.history.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Coach persona prompt for an in-run utterance.
    pub fn command_prompt(&self, utterance: &str, stats: &RunStats) -> String {
        format!(
            "You are Coach Flow, an enthusiastic running coach. Be motivational, concise, and helpful.\n\n\
             Current run stats: {}\n\n\
             User says: \"{}\"\n\n\
             Important rules:\n\
             1. If the user wants to stop or end the run, acknowledge it warmly.\n\
             2. If asking for distance, pace, or time, include the exact numbers from the stats above.\n\
             3. Keep responses under 2 sentences.\n\
             4. Be positive and encouraging.\n\n\
             Response:",
            stats_text(stats),
            utterance
        )
    }

    /// Prompt for the spoken end-of-run summary.
    pub fn summary_prompt(&self, distance_km: f64, elapsed_ms: u64) -> String {
        let pace = format_pace(distance_km, elapsed_ms);
        format!(
            "The user just completed a run.\n\n\
             Run completed:\n\
             - Distance: {distance_km:.2} km\n\
             - Time: {}\n\
             - Pace: {pace} per km\n\n\
             Give a 2-sentence summary that's positive and encouraging. End with a motivational phrase.\n\n\
             Summary:",
            format_time(elapsed_ms)
        )
    }

    /// Prompt announcing a crossed kilometer.
    pub fn milestone_prompt(&self, km: u32, stats: &RunStats) -> String {
        self.command_prompt(&format!("I just reached {km} kilometers"), stats)
    }
}

fn stats_text(stats: &RunStats) -> String {
    format!(
        "Distance: {:.2} km, Time: {}, Pace: {}/km, Status: {}",
        stats.distance_km,
        format_time(stats.elapsed_ms),
        format_pace(stats.distance_km, stats.elapsed_ms),
        if stats.status == SessionStatus::Running {
            "Running"
        } else {
            "Stopped"
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGateway;

    #[async_trait]
    impl AssistantGateway for EchoGateway {
        async fn ask(&self, prompt: &str) -> Result<String, RunflowError> {
            Ok(format!("echo: {}", prompt.chars().take(10).collect::<String>()))
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl AssistantGateway for FailingGateway {
        async fn ask(&self, _prompt: &str) -> Result<String, RunflowError> {
            Err(RunflowError::AssistantFault("boom".to_string()))
        }
    }

    fn running_stats() -> RunStats {
        RunStats {
            status: SessionStatus::Running,
            distance_km: 3.5,
            elapsed_ms: 1_200_000,
        }
    }

    #[tokio::test]
    async fn records_turns_with_bounded_history() {
        let coach = AssistantCoach::new(Some(Arc::new(EchoGateway)), true);
        for i in 0..15 {
            coach.ask(&format!("prompt number {i}")).await.unwrap();
        }
        let history = coach.history();
        assert_eq!(history.len(), 10);
        // oldest five evicted
        assert!(history[0].prompt_excerpt.contains("number 5"));
    }

    #[tokio::test]
    async fn offline_refuses_without_calling_gateway() {
        let coach = AssistantCoach::new(Some(Arc::new(EchoGateway)), true);
        coach.set_online(false);
        assert!(!coach.available());
        assert!(coach.ask("anything").await.is_err());
        assert!(coach.history().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_records_nothing() {
        let coach = AssistantCoach::new(Some(Arc::new(FailingGateway)), true);
        assert!(coach.ask("anything").await.is_err());
        assert!(coach.history().is_empty());
    }

    #[test]
    fn toggle_is_refused_without_gateway() {
        let coach = AssistantCoach::new(None, true);
        assert_eq!(coach.toggle(), None);
        assert!(!coach.available());
    }

    #[test]
    fn toggle_flips_mode_with_gateway() {
        let coach = AssistantCoach::new(Some(Arc::new(EchoGateway)), true);
        assert_eq!(coach.toggle(), Some(false));
        assert!(!coach.available());
        assert_eq!(coach.toggle(), Some(true));
        assert!(coach.available());
    }

    #[test]
    fn prompts_embed_current_stats() {
        let coach = AssistantCoach::new(None, true);
        let prompt = coach.command_prompt("how far", &running_stats());
        assert!(prompt.contains("3.50 km"));
        assert!(prompt.contains("20:00"));
        let summary = coach.summary_prompt(3.5, 1_200_000);
        assert!(summary.contains("3.50 km"));
    }
}
