//! Deterministic utterance classification.
//!
//! The local handler answers simple questions without the assistant; routing
//! and stop detection work off the same normalized transcript.

use crate::models::{format_pace, format_time, RunStats};

/// Intent tags in matching priority order; first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceIntent {
    Distance,
    Pace,
    Time,
    Stop,
    AssistantToggle,
    FreeForm,
}

/// Lower-case and trim a raw transcript.
pub fn normalize(transcript: &str) -> String {
    transcript.trim().to_lowercase()
}

/// Transcripts this short are treated as recognition noise.
pub fn is_noise(normalized: &str) -> bool {
    normalized.chars().count() <= 2
}

/// Stop/finish/done anywhere in the utterance schedules a session stop,
/// independent of which handler produced the spoken reply.
pub fn wants_stop(normalized: &str) -> bool {
    normalized.contains("stop") || normalized.contains("done") || normalized.contains("finish")
}

/// Whether the utterance should go to the assistant instead of the local
/// handler: assistant mode on, gateway online, and either an addressing cue
/// or a long-enough utterance.
pub fn routes_to_assistant(normalized: &str, assistant_enabled: bool, online: bool) -> bool {
    assistant_enabled
        && online
        && (normalized.contains("coach")
            || normalized.contains("hey")
            || normalized.chars().count() > 10)
}

pub fn classify(normalized: &str) -> VoiceIntent {
    if normalized.contains("how far") || normalized.contains("distance") {
        VoiceIntent::Distance
    } else if normalized.contains("pace") || normalized.contains("speed") {
        VoiceIntent::Pace
    } else if normalized.contains("time") {
        VoiceIntent::Time
    } else if wants_stop(normalized) {
        VoiceIntent::Stop
    } else if normalized.contains("activate ai") || normalized.contains("ai mode") {
        VoiceIntent::AssistantToggle
    } else {
        VoiceIntent::FreeForm
    }
}

/// Deterministic spoken reply for an intent given the current run stats.
/// `AssistantToggle` is answered by the caller, which owns the preference.
pub fn local_answer(intent: VoiceIntent, normalized: &str, stats: &RunStats) -> String {
    match intent {
        VoiceIntent::Distance => {
            format!("You've run {:.2} kilometers!", stats.distance_km)
        }
        VoiceIntent::Pace => {
            let pace = format_pace(stats.distance_km, stats.elapsed_ms);
            format!("Your pace is {pace} per kilometer")
        }
        VoiceIntent::Time => {
            format!("Elapsed time: {}", format_time(stats.elapsed_ms))
        }
        VoiceIntent::Stop => "Stopping your run now!".to_string(),
        VoiceIntent::AssistantToggle | VoiceIntent::FreeForm => {
            format!("I heard: \"{normalized}\". Try: how far, pace, time, or stop.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;

    fn stats(distance_km: f64, elapsed_ms: u64) -> RunStats {
        RunStats {
            status: SessionStatus::Running,
            distance_km,
            elapsed_ms,
        }
    }

    #[test]
    fn short_transcripts_are_noise() {
        assert!(is_noise(""));
        assert!(is_noise("ok"));
        assert!(!is_noise("hey"));
    }

    #[test]
    fn classification_priority_first_match_wins() {
        assert_eq!(classify("how far have i gone"), VoiceIntent::Distance);
        assert_eq!(classify("what's my pace"), VoiceIntent::Pace);
        // "speed" maps to pace, matching the local handler's wording
        assert_eq!(classify("current speed"), VoiceIntent::Pace);
        assert_eq!(classify("what time is it"), VoiceIntent::Time);
        assert_eq!(classify("i'm done"), VoiceIntent::Stop);
        assert_eq!(classify("ai mode"), VoiceIntent::AssistantToggle);
        assert_eq!(classify("tell me a joke"), VoiceIntent::FreeForm);
        // distance outranks stop when both keywords appear
        assert_eq!(classify("stop telling me the distance"), VoiceIntent::Distance);
    }

    #[test]
    fn stop_keywords_detected_anywhere() {
        assert!(wants_stop("stop"));
        assert!(wants_stop("i want to finish now"));
        assert!(wants_stop("we're done here"));
        assert!(!wants_stop("keep going"));
    }

    #[test]
    fn assistant_routing_needs_mode_online_and_cue_or_length() {
        assert!(routes_to_assistant("hey coach", true, true));
        assert!(routes_to_assistant("how am i doing out there", true, true));
        // short utterance, no cue: local
        assert!(!routes_to_assistant("pace", true, true));
        // offline or disabled always local
        assert!(!routes_to_assistant("hey coach", true, false));
        assert!(!routes_to_assistant("hey coach", false, true));
    }

    #[test]
    fn local_answers_embed_run_figures() {
        let s = stats(5.0, 1_500_000);
        assert_eq!(
            local_answer(VoiceIntent::Distance, "how far", &s),
            "You've run 5.00 kilometers!"
        );
        assert!(local_answer(VoiceIntent::Pace, "pace", &s).contains("5:00"));
        assert!(local_answer(VoiceIntent::Time, "time", &s).contains("25:00"));
    }
}
