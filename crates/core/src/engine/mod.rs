use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    animation::{Animation, Step},
    config::{AppConfig, Cycles, ScheduleConfig, StripConfig},
    transport::Transport,
    DotstarError, Result, Strip,
};

/// Longest uninterrupted sleep while pausing between steps.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Cloneable stop flag shared between the engine and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Blocks for `duration`, waking early on cancellation. Returns whether
    /// the token is cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Lifecycle of an [`AnimationEngine`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub cycles_completed: u64,
    /// Flushes requested by `update`, excluding the clear/init/teardown ones.
    pub repaints: usize,
    pub cancelled: bool,
}

/// Drives one animation over one strip, step by step.
pub struct AnimationEngine {
    strip_config: StripConfig,
    schedule: ScheduleConfig,
    animation: Box<dyn Animation>,
    state: EngineState,
    current_step: usize,
    current_cycle: u64,
}

impl AnimationEngine {
    /// Validates both configurations up front so a bad setup fails before
    /// any transport is opened.
    pub fn new(
        strip_config: StripConfig,
        schedule: ScheduleConfig,
        animation: Box<dyn Animation>,
    ) -> Result<Self> {
        strip_config.validate()?;
        schedule.validate()?;
        Ok(Self {
            strip_config,
            schedule,
            animation,
            state: EngineState::Idle,
            current_step: 0,
            current_cycle: 0,
        })
    }

    /// Builds an engine for the animation selected in `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.strip.clone(),
            config.schedule,
            config.animation.build(),
        )
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn current_cycle(&self) -> u64 {
        self.current_cycle
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Runs the animation to completion or cancellation.
    ///
    /// The strip is built on `transport`, cleared, initialised and flushed,
    /// then stepped until the configured number of cycles is reached or
    /// `cancel` fires. Whatever happens after the strip exists, the same
    /// cleanup runs: `shutdown`, clear, release.
    pub fn start(
        &mut self,
        transport: Box<dyn Transport>,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        if self.state != EngineState::Idle {
            return Err(DotstarError::InvalidState("animation engine has already run"));
        }
        let mut strip = Strip::new(&self.strip_config, transport)?;
        self.state = EngineState::Running;
        tracing::debug!(schedule = ?self.schedule, "animation running");

        let mut report = RunReport::default();
        let outcome = self.run(&mut strip, cancel, &mut report);
        let cleanup = self.cleanup(&mut strip);
        self.state = EngineState::Stopped;
        tracing::debug!(?report, "animation stopped");

        if let (Err(_), Err(err)) = (&outcome, &cleanup) {
            tracing::warn!(error = %err, "cleanup failed after animation error");
        }
        outcome?;
        cleanup?;
        Ok(report)
    }

    fn run(
        &mut self,
        strip: &mut Strip,
        cancel: &CancelToken,
        report: &mut RunReport,
    ) -> Result<()> {
        strip.clear()?;
        self.animation.init(strip);
        strip.show()?;

        let pause = self.schedule.pause();
        let steps_per_cycle = self.schedule.steps_per_cycle;
        self.current_cycle = 0;
        loop {
            for current_step in 0..steps_per_cycle {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return Ok(());
                }
                self.current_step = current_step;
                let step = Step {
                    steps_per_cycle,
                    current_step,
                    current_cycle: self.current_cycle,
                };
                if self.animation.update(strip, step) {
                    strip.show()?;
                    report.repaints += 1;
                }
                if cancel.sleep(pause) {
                    report.cancelled = true;
                    return Ok(());
                }
            }
            self.current_cycle += 1;
            report.cycles_completed = self.current_cycle;
            if let Cycles::Count(limit) = self.schedule.cycles {
                if self.current_cycle >= limit {
                    return Ok(());
                }
            }
        }
    }

    fn cleanup(&mut self, strip: &mut Strip) -> Result<()> {
        self.animation.shutdown(strip);
        strip.teardown()
    }
}

impl fmt::Debug for AnimationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationEngine")
            .field("strip_config", &self.strip_config)
            .field("schedule", &self.schedule)
            .field("state", &self.state)
            .field("current_step", &self.current_step)
            .field("current_cycle", &self.current_cycle)
            .finish()
    }
}
