use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::assistant::AssistantCoach;
use crate::capabilities::{
    LocationEvent, LocationSource, MotionSource, Speaker, SpeechRecognizer,
};
use crate::config::FilterConfig;
use crate::db::Database;
use crate::fusion::FusionEngine;
use crate::milestone::{milestone_crossed, template_announcement};
use crate::models::{format_pace, format_time, RunRecord, RunStats, SessionStatus};
use crate::settings::SettingsStore;
use crate::voice::pipeline::{ControlRequest, VoicePipeline};

use super::state::RunState;

/// How long `start()` waits for the initial location fix.
const INITIAL_FIX_TIMEOUT_MS: u64 = 5000;
/// Cadence of the stats snapshot published for the voice pipeline and UI.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Background tasks owned by one running session, torn down together on stop.
struct SessionTasks {
    cancel: CancellationToken,
    location: JoinHandle<()>,
    motion: JoinHandle<()>,
    voice: JoinHandle<()>,
    ticker: JoinHandle<()>,
    distance: JoinHandle<()>,
    control: JoinHandle<()>,
}

/// Orchestrates the run lifecycle: owns the [`RunState`], starts and stops
/// the fusion engine, motion listener, and voice pipeline, and persists the
/// summary record.
///
/// Everything asynchronous carries the session generation: completions that
/// arrive after `stop()` bumped the counter are discarded instead of applied,
/// so a gateway call issued just before teardown cannot resurrect a stopped
/// session.
#[derive(Clone)]
pub struct RunController {
    state: Arc<Mutex<RunState>>,
    db: Database,
    settings: Arc<SettingsStore>,
    location: Arc<dyn LocationSource>,
    motion: Arc<dyn MotionSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
    speaker: Arc<dyn Speaker>,
    coach: Arc<AssistantCoach>,
    config: FilterConfig,
    tasks: Arc<Mutex<Option<SessionTasks>>>,
    stats_tx: Arc<watch::Sender<RunStats>>,
    generation: Arc<AtomicU64>,
}

impl RunController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        location: Arc<dyn LocationSource>,
        motion: Arc<dyn MotionSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
        speaker: Arc<dyn Speaker>,
        coach: Arc<AssistantCoach>,
        config: FilterConfig,
    ) -> Self {
        let (stats_tx, _stats_rx) = watch::channel(RunStats::default());
        // The toggle path persists the preference; reading it back here
        // closes the loop across restarts of the embedding app.
        coach.set_enabled(settings.assistant_mode());
        Self {
            state: Arc::new(Mutex::new(RunState::new())),
            db,
            settings,
            location,
            motion,
            recognizer,
            speaker,
            coach,
            config,
            tasks: Arc::new(Mutex::new(None)),
            stats_tx: Arc::new(stats_tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Live snapshot stream; updated every tick while a session runs.
    pub fn stats(&self) -> watch::Receiver<RunStats> {
        self.stats_tx.subscribe()
    }

    pub async fn current_state(&self) -> RunState {
        self.state.lock().await.clone()
    }

    /// Start a run. Requires one successful initial fix; on failure the
    /// session stays `Idle` and the error is reported upward.
    pub async fn start(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.status == SessionStatus::Running {
                bail!("run already active");
            }
        }

        let anchor = match self.location.initial_fix(INITIAL_FIX_TIMEOUT_MS).await {
            Ok(fix) => fix,
            Err(err) => {
                warn!("initial fix failed: {err}");
                self.speaker
                    .speak("Could not start run. Please check location permissions.");
                return Err(err).context("failed to acquire initial location fix");
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        let (mut engine, distance_rx) = FusionEngine::new(self.config.clone());
        engine.reset(anchor);
        let fusion = Arc::new(Mutex::new(engine));

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_id.clone(), started_at, Instant::now());
        }
        self.publish_stats().await;

        let greeting = if self.coach.available() {
            "Run started! Your AI coach is ready. Say anything to me!"
        } else {
            "Run started! Say 'how far', 'pace', 'time', or 'stop'."
        };
        self.speaker.speak(greeting);

        let cancel = CancellationToken::new();
        let (control_tx, control_rx) = mpsc::channel(8);

        let tasks = SessionTasks {
            location: self.spawn_location_task(fusion.clone(), cancel.clone(), generation),
            motion: self.spawn_motion_task(fusion.clone(), cancel.clone(), generation),
            voice: self.spawn_voice_task(control_tx, cancel.clone()),
            ticker: self.spawn_ticker(cancel.clone()),
            distance: self.spawn_distance_task(distance_rx, cancel.clone(), generation),
            control: self.spawn_control_task(control_rx, cancel.clone()),
            cancel,
        };
        *self.tasks.lock().await = Some(tasks);

        info!("run {session_id} started at {started_at}");
        Ok(())
    }

    /// Stop the run. Idempotent: a second call is a no-op returning `None`.
    /// Teardown is best-effort per component and never blocks the others.
    pub async fn stop(&self) -> Result<Option<RunRecord>> {
        let (session_id, distance_km, elapsed_ms) = {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Running {
                return Ok(None);
            }
            state.stop();
            (
                state.session_id.clone().unwrap_or_default(),
                state.distance_km,
                state.elapsed_ms(),
            )
        };

        // Invalidate every in-flight async completion from this session.
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(tasks) = self.tasks.lock().await.take() {
            tasks.cancel.cancel();
            // Location watch, motion listener, voice pipeline, in that order.
            tasks.location.abort();
            info!("location watch stopped");
            tasks.motion.abort();
            info!("motion listener stopped");
            tasks.voice.abort();
            info!("voice pipeline stopped");
            tasks.ticker.abort();
            tasks.distance.abort();
            tasks.control.abort();
        }

        self.publish_stats().await;

        let pace = format_pace(distance_km, elapsed_ms);
        let summary = if self.coach.available() {
            let prompt = self.coach.summary_prompt(distance_km, elapsed_ms);
            match self.coach.ask(&prompt).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("assistant summary failed, using template: {err}");
                    template_summary(distance_km, elapsed_ms, &pace)
                }
            }
        } else {
            template_summary(distance_km, elapsed_ms, &pace)
        };
        self.speaker.speak(&summary);

        let record = RunRecord {
            id: session_id,
            date: Utc::now(),
            distance_km,
            elapsed_ms,
            pace_label: pace,
        };
        self.db
            .append_run_record(&record)
            .await
            .context("failed to persist run record")?;

        info!(
            "run stopped: {:.2} km in {}, pace {}",
            record.distance_km,
            format_time(record.elapsed_ms),
            record.pace_label
        );
        Ok(Some(record))
    }

    /// Driven by network-state events from the embedding app.
    pub fn set_network_online(&self, online: bool) {
        self.coach.set_online(online);
        if self.coach.is_enabled() {
            if online {
                self.speaker.speak("Back online! AI Coach is ready.");
            } else {
                self.speaker.speak("Offline. Using basic mode.");
            }
        }
    }

    async fn publish_stats(&self) {
        let state = self.state.lock().await;
        // send_replace: the snapshot must update even with no subscribers yet
        self.stats_tx.send_replace(RunStats {
            status: state.status,
            distance_km: state.distance_km,
            elapsed_ms: state.elapsed_ms(),
        });
    }

    fn spawn_location_task(
        &self,
        fusion: Arc<Mutex<FusionEngine>>,
        cancel: CancellationToken,
        generation: u64,
    ) -> JoinHandle<()> {
        let location = self.location.clone();
        let speaker = self.speaker.clone();
        let current_generation = self.generation.clone();

        tokio::spawn(async move {
            let mut events = match location.watch().await {
                Ok(rx) => rx,
                Err(err) => {
                    // Recoverable: the run keeps going on step estimation.
                    warn!("location watch unavailable: {err}");
                    speaker.speak("GPS signal weak. Using step estimation.");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(LocationEvent::Fix(sample)) => {
                            if current_generation.load(Ordering::SeqCst) != generation {
                                break;
                            }
                            fusion.lock().await.handle_fix(sample);
                        }
                        Some(LocationEvent::Unavailable(message)) => {
                            warn!("location unavailable: {message}");
                            speaker.speak("GPS signal weak. Using step estimation.");
                        }
                        None => break,
                    },
                }
            }
        })
    }

    fn spawn_motion_task(
        &self,
        fusion: Arc<Mutex<FusionEngine>>,
        cancel: CancellationToken,
        generation: u64,
    ) -> JoinHandle<()> {
        let motion = self.motion.clone();
        let state = self.state.clone();
        let current_generation = self.generation.clone();

        tokio::spawn(async move {
            let mut samples = match motion.subscribe().await {
                Ok(rx) => rx,
                Err(err) => {
                    // No motion permission just means no step fallback.
                    warn!("motion capability unavailable: {err}");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sample = samples.recv() => match sample {
                        Some(sample) => {
                            if current_generation.load(Ordering::SeqCst) != generation {
                                break;
                            }
                            let steps = {
                                let mut engine = fusion.lock().await;
                                engine.handle_step(&sample);
                                engine.step_count()
                            };
                            state.lock().await.record_steps(steps);
                        }
                        None => break,
                    },
                }
            }
        })
    }

    fn spawn_voice_task(
        &self,
        control_tx: mpsc::Sender<ControlRequest>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let pipeline = VoicePipeline::new(
            self.recognizer.clone(),
            self.speaker.clone(),
            self.coach.clone(),
            Some(self.settings.clone()),
            self.stats_tx.subscribe(),
            control_tx,
        );
        tokio::spawn(pipeline.run(cancel))
    }

    fn spawn_ticker(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if controller.state.lock().await.status != SessionStatus::Running {
                            break;
                        }
                        controller.publish_stats().await;
                    }
                }
            }
        })
    }

    /// Applies accepted distance updates to the session in arrival order and
    /// runs milestone detection after each one.
    fn spawn_distance_task(
        &self,
        mut distance_rx: watch::Receiver<f64>,
        cancel: CancellationToken,
        generation: u64,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = distance_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let distance_km = *distance_rx.borrow_and_update();
                        let crossed = {
                            let mut state = controller.state.lock().await;
                            if state.status != SessionStatus::Running {
                                break;
                            }
                            state.apply_distance(distance_km);
                            let crossed =
                                milestone_crossed(state.last_announced_km, state.distance_km);
                            if let Some(km) = crossed {
                                state.record_announcement(km);
                            }
                            crossed
                        };
                        controller.publish_stats().await;
                        if let Some(km) = crossed {
                            controller.announce_milestone(km, generation).await;
                        }
                    }
                }
            }
        })
    }

    /// Speak a milestone announcement, preferring the assistant. Skipped when
    /// the session generation moved on while the gateway call was in flight.
    async fn announce_milestone(&self, km: u32, generation: u64) {
        let stats = *self.stats_tx.subscribe().borrow();
        let fallback = template_announcement(km, stats.distance_km, stats.elapsed_ms);

        let text = if self.coach.available() {
            let prompt = self.coach.milestone_prompt(km, &stats);
            match self.coach.ask(&prompt).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("assistant milestone announcement failed: {err}");
                    fallback
                }
            }
        } else {
            fallback
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            info!("dropping stale milestone announcement for km {km}");
            return;
        }
        self.speaker.speak(&text);
    }

    fn spawn_control_task(
        &self,
        mut control_rx: mpsc::Receiver<ControlRequest>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = control_rx.recv() => match request {
                        Some(ControlRequest::StopRun) => {
                            // Detached so aborting this task cannot interrupt
                            // the teardown it requested.
                            let ctrl = controller.clone();
                            tokio::spawn(async move {
                                if let Err(err) = ctrl.stop().await {
                                    error!("voice-requested stop failed: {err:#}");
                                }
                            });
                        }
                        None => break,
                    },
                }
            }
        })
    }
}

fn template_summary(distance_km: f64, elapsed_ms: u64, pace: &str) -> String {
    format!(
        "Run completed! {:.2} km in {}. Pace: {}/km.",
        distance_km,
        format_time(elapsed_ms),
        pace
    )
}
