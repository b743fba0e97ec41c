//! Async front end for [`Engine`].
//!
//! One task owns the engine and drains a command queue. User commands and
//! timer ticks share that queue, so every read-modify-write against the
//! ledger happens in submission order. Signals are fanned out on a
//! broadcast channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Engine, EngineSnapshot, EngineState, TimerConfig};
use crate::energy::{Completion, DisplayMode, EnergyColor};
use crate::error::{CoreError, Result};
use crate::events::Signal;
use crate::prediction::{Prediction, ScheduledItem};

const COMMAND_QUEUE_SIZE: usize = 64;
const SIGNAL_BUFFER_SIZE: usize = 256;

/// Source of "now" for the engine task.
///
/// Calendar days are read in `Tz`, so a zone with DST must be kept as that
/// zone rather than flattened to the offset of a single instant.
pub trait Clock: Send + Sync + 'static {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// Wall clock in the system's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    type Tz = FixedOffset;

    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TickKind {
    Warning,
    Decay,
}

enum Command {
    RecordCompletion {
        completion: Completion,
        reply: oneshot::Sender<Vec<Signal>>,
    },
    RecordSample {
        task_duration_minutes: u32,
        resonance_outcome: f64,
        reply: oneshot::Sender<Vec<Signal>>,
    },
    Predict {
        scheduled: Vec<ScheduledItem>,
        goal: EnergyColor,
        reply: oneshot::Sender<Prediction>,
    },
    SetDisplayMode {
        mode: DisplayMode,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    Tick {
        kind: TickKind,
        reply: Option<oneshot::Sender<Vec<Signal>>>,
    },
    Shutdown {
        reply: oneshot::Sender<EngineState>,
    },
}

/// Handle to a running engine task.
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    signals: broadcast::Sender<Signal>,
    timers: Vec<JoinHandle<()>>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Start the engine task and its timers on the current tokio runtime.
    pub fn spawn(engine: Engine, clock: impl Clock, timers: &TimerConfig) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (signals, _) = broadcast::channel(SIGNAL_BUFFER_SIZE);

        let task = tokio::spawn(run(engine, clock, command_rx, signals.clone()));

        let mut timer_tasks = Vec::new();
        if timers.warning_check_secs > 0 {
            timer_tasks.push(spawn_timer(
                commands.clone(),
                TickKind::Warning,
                Duration::from_secs(timers.warning_check_secs),
            ));
        }
        if timers.decay_tick_secs > 0 {
            timer_tasks.push(spawn_timer(
                commands.clone(),
                TickKind::Decay,
                Duration::from_secs(timers.decay_tick_secs),
            ));
        }

        info!(
            warning_check_secs = timers.warning_check_secs,
            decay_tick_secs = timers.decay_tick_secs,
            "engine started"
        );

        Self {
            commands,
            signals,
            timers: timer_tasks,
            task,
        }
    }

    /// Receive every signal emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    pub async fn record_completion(&self, completion: Completion) -> Result<Vec<Signal>> {
        self.request(|reply| Command::RecordCompletion { completion, reply })
            .await
    }

    pub async fn record_sample(
        &self,
        task_duration_minutes: u32,
        resonance_outcome: f64,
    ) -> Result<Vec<Signal>> {
        self.request(|reply| Command::RecordSample {
            task_duration_minutes,
            resonance_outcome,
            reply,
        })
        .await
    }

    pub async fn predict(
        &self,
        scheduled: Vec<ScheduledItem>,
        goal: EnergyColor,
    ) -> Result<Prediction> {
        self.request(|reply| Command::Predict {
            scheduled,
            goal,
            reply,
        })
        .await
    }

    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<()> {
        self.request(|reply| Command::SetDisplayMode { mode, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Run a decay tick now instead of waiting for the timer.
    pub async fn tick_decay(&self) -> Result<Vec<Signal>> {
        self.request(|reply| Command::Tick {
            kind: TickKind::Decay,
            reply: Some(reply),
        })
        .await
    }

    /// Stop the timers and the engine task, returning the final state.
    ///
    /// Commands already queued are processed first.
    pub async fn shutdown(self) -> Result<EngineState> {
        for timer in &self.timers {
            timer.abort();
        }
        let state = self.request(|reply| Command::Shutdown { reply }).await?;
        if let Err(e) = self.task.await {
            warn!("engine task ended abnormally: {e}");
        }
        Ok(state)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| CoreError::EngineStopped)?;
        response.await.map_err(|_| CoreError::EngineStopped)
    }
}

fn spawn_timer(
    commands: mpsc::Sender<Command>,
    kind: TickKind,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if commands.send(Command::Tick { kind, reply: None }).await.is_err() {
                debug!(?kind, "timer stopping, engine closed");
                return;
            }
        }
    })
}

async fn run(
    mut engine: Engine,
    clock: impl Clock,
    mut commands: mpsc::Receiver<Command>,
    signals: broadcast::Sender<Signal>,
) {
    while let Some(command) = commands.recv().await {
        let now = clock.now();
        match command {
            Command::RecordCompletion { completion, reply } => {
                let emitted = engine.record_completion(&completion, &now);
                publish(&signals, &emitted);
                let _ = reply.send(emitted);
            }
            Command::RecordSample {
                task_duration_minutes,
                resonance_outcome,
                reply,
            } => {
                let emitted = engine.record_sample(task_duration_minutes, resonance_outcome, &now);
                publish(&signals, &emitted);
                let _ = reply.send(emitted);
            }
            Command::Predict {
                scheduled,
                goal,
                reply,
            } => {
                let _ = reply.send(engine.predict(&scheduled, goal, &now));
            }
            Command::SetDisplayMode { mode, reply } => {
                engine.set_display_mode(mode);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.snapshot(&now));
            }
            Command::Tick { kind, reply } => {
                let emitted = match kind {
                    TickKind::Warning => engine.tick_warning(&now),
                    TickKind::Decay => engine.tick_decay(&now),
                };
                publish(&signals, &emitted);
                if let Some(reply) = reply {
                    let _ = reply.send(emitted);
                }
            }
            Command::Shutdown { reply } => {
                info!("engine shutting down");
                let _ = reply.send(engine.into_state());
                return;
            }
        }
    }
    debug!("engine command channel closed");
}

fn publish(signals: &broadcast::Sender<Signal>, emitted: &[Signal]) {
    for signal in emitted {
        // no subscribers is fine
        let _ = signals.send(signal.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergySource;
    use crate::storage::Config;
    use chrono::TimeZone;

    fn start() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
            .unwrap()
    }

    fn no_timers() -> TimerConfig {
        TimerConfig {
            warning_check_secs: 0,
            decay_tick_secs: 0,
        }
    }

    fn spawn(clock: &FixedClock, timers: &TimerConfig) -> EngineHandle {
        let engine = Engine::new(EngineState::new(&clock.now()), &Config::default());
        EngineHandle::spawn(engine, clock.clone(), timers)
    }

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let clock = FixedClock::new(start());
        let handle = spawn(&clock, &no_timers());
        let mut rx = handle.subscribe();

        let completion = Completion::new(EnergySource::Tasks, 100, "write report");
        let emitted = handle.record_completion(completion).await.unwrap();
        assert!(matches!(emitted[0], Signal::EnergyAdded { amount: 100, .. }));
        assert!(matches!(rx.recv().await.unwrap(), Signal::EnergyAdded { .. }));

        clock.advance(chrono::Duration::hours(5));
        let emitted = handle.tick_decay().await.unwrap();
        assert!(matches!(emitted[..], [Signal::DecayApplied { amount: 2, .. }]));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.energy.total_energy, 98);

        let state = handle.shutdown().await.unwrap();
        assert_eq!(state.energy.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_predict_and_display_mode() {
        let clock = FixedClock::new(start());
        let handle = spawn(&clock, &no_timers());
        handle.set_display_mode(DisplayMode::Aura).await.unwrap();
        let prediction = handle.predict(Vec::new(), EnergyColor::Yellow).await.unwrap();
        assert_eq!(prediction.goal_threshold, 200);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.energy.display_mode, DisplayMode::Aura);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_timer_emits_signal() {
        let clock = FixedClock::new(start());
        let handle = spawn(
            &clock,
            &TimerConfig {
                warning_check_secs: 60,
                decay_tick_secs: 0,
            },
        );
        let mut rx = handle.subscribe();
        clock.advance(chrono::Duration::minutes(210));

        tokio::time::sleep(Duration::from_secs(61)).await;
        match rx.recv().await.unwrap() {
            Signal::DecayWarning {
                minutes_until_decay,
                ..
            } => assert_eq!(minutes_until_decay, 30),
            other => panic!("unexpected signal {other:?}"),
        }
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_engine_reports_stopped() {
        let clock = FixedClock::new(start());
        let mut handle = spawn(&clock, &no_timers());
        handle.task.abort();
        assert!((&mut handle.task).await.is_err());
        let err = handle.snapshot().await.unwrap_err();
        assert!(matches!(err, CoreError::EngineStopped));
    }
}
