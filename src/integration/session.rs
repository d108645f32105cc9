//! Interval-driven capture loop around the attendance pipeline.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::ConfigError;

use super::pipeline::{AttendancePipeline, ConfirmationOutcome};
use super::{DetectionSource, EmbeddingSource, SubmissionSink};

/// Configuration for the capture loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between pipeline ticks
    pub tick_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 150,
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::TickInterval);
        }
        Ok(())
    }
}

/// One raw frame from the capture device.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for the frame acquisition seam.
///
/// Camera handling lives outside this crate; implementations hand
/// over whatever the device produced for the current tick.
pub trait FrameSource {
    /// Error type for capture failures.
    type Error: std::fmt::Display;

    /// Grab the frame for the current tick.
    fn next_frame(&mut self) -> Result<Frame, Self::Error>;
}

/// Aggregate counters for one `run` of the capture loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub frame_errors: u64,
    pub detector_errors: u64,
    pub confirmations: u64,
    pub submissions: u64,
    pub duplicates: u64,
    pub failed_submissions: u64,
}

/// Periodic driver for an [`AttendancePipeline`].
///
/// One pipeline tick runs to completion per interval; ticks never
/// overlap, so no locking is needed around the pipeline state. The
/// loop survives every per-tick failure and only exits on shutdown.
/// Because `run` borrows the pipeline, stopping and re-running keeps
/// all track and registry state; only `AttendancePipeline::reset`
/// discards it.
pub struct CaptureSession {
    config: SessionConfig,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the capture loop until the shutdown channel fires.
    ///
    /// Returns the aggregate counters for this run.
    pub async fn run<D, E, S, F>(
        &self,
        pipeline: &mut AttendancePipeline<D, E, S>,
        frames: &mut F,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionStats
    where
        D: DetectionSource,
        E: EmbeddingSource,
        S: SubmissionSink,
        F: FrameSource,
    {
        let mut interval = time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = SessionStats::default();
        info!(
            "capture session started, tick interval {}ms",
            self.config.tick_interval_ms
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    stats.ticks += 1;

                    let frame = match frames.next_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("frame capture failed: {}", e);
                            stats.frame_errors += 1;
                            continue;
                        }
                    };

                    let report = pipeline.process_frame(
                        &frame.data,
                        frame.width,
                        frame.height,
                        Instant::now(),
                    );

                    if report.detector_error.is_some() {
                        stats.detector_errors += 1;
                    }
                    stats.confirmations += report.outcomes.len() as u64;
                    for outcome in &report.outcomes {
                        match outcome {
                            ConfirmationOutcome::Submitted { .. } => stats.submissions += 1,
                            ConfirmationOutcome::Duplicate { .. } => stats.duplicates += 1,
                            ConfirmationOutcome::SubmissionFailed { .. } => {
                                stats.failed_submissions += 1
                            }
                            _ => {}
                        }
                    }

                    debug!("tick {}: {} live tracks", stats.ticks, report.tracks.len());
                }
                changed = shutdown.changed() => {
                    // A dropped sender stops the session like an explicit signal.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("capture session stopped after {} ticks", stats.ticks);
        stats
    }
}
