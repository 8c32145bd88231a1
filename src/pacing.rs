//! Fixed-rate pacing of the capture loop.
//!
//! The scheduler asks the frame source for exactly `target_frames` snapshots,
//! spacing them on an absolute schedule: the intended instant of frame `i` is
//! `start + i * interval`. After each capture the next deadline advances by
//! `interval` from the previous deadline, never from the current time, so a
//! slow frame shortens the next wait instead of shifting the whole schedule
//! and the average rate converges to the target without cumulative drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::capture::{FrameBuffer, FrameSource};
use crate::error::{RecorderError, Result};

/// Frames are reported to the progress observer at this frame-count cadence.
pub const PROGRESS_INTERVAL_FRAMES: u64 = 50;

/// Upper bound on back-to-back captures per scheduling check. Keeps a large
/// clock step from turning into an unbounded catch-up burst.
const MAX_CATCHUP_FRAMES_PER_CHECK: u32 = 4;

/// Yield between scheduling checks instead of spinning.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Ceiling for the configured frame rate. Screen reads cannot keep up with
/// more anyway, and the bound keeps the interval arithmetic in range.
pub const MAX_FPS: i64 = 1000;

/// Ceiling for the configured duration: one day.
pub const MAX_DURATION_SECONDS: i64 = 86_400;

/// Derived pacing parameters for one recording.
#[derive(Debug, Clone, Copy)]
pub struct PacingPlan {
    pub target_frames: u64,
    pub frame_interval: Duration,
    pub fps: u32,
    pub target_duration: Duration,
}

impl PacingPlan {
    /// Compute the plan from duration and frame rate, rejecting
    /// non-positive values before any capture resource is touched.
    pub fn new(duration_seconds: i64, fps: i64) -> Result<Self> {
        if duration_seconds <= 0 || duration_seconds > MAX_DURATION_SECONDS {
            return Err(RecorderError::invalid_parameters(format!(
                "duration must be between 1 and {MAX_DURATION_SECONDS} seconds, got {duration_seconds}"
            )));
        }
        if fps <= 0 || fps > MAX_FPS {
            return Err(RecorderError::invalid_parameters(format!(
                "fps must be between 1 and {MAX_FPS}, got {fps}"
            )));
        }

        Ok(Self {
            target_frames: duration_seconds as u64 * fps as u64,
            frame_interval: Duration::from_secs(1) / fps as u32,
            fps: fps as u32,
            target_duration: Duration::from_secs(duration_seconds as u64),
        })
    }
}

/// Consumer of paced frames, in strict arrival order.
pub trait FrameSink {
    fn append(&mut self, frame: FrameBuffer) -> Result<()>;
}

/// Progress notification emitted every [`PROGRESS_INTERVAL_FRAMES`] frames.
/// Observational only; has no effect on pacing.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub frames_recorded: u64,
    pub target_frames: u64,
    pub percent: u8,
}

/// Outcome of a scheduler run.
#[derive(Debug, Clone, Copy)]
pub struct PacingReport {
    pub frames_recorded: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Drives capture at the planned rate and forwards every frame to the sink.
pub struct PacingScheduler {
    plan: PacingPlan,
}

impl PacingScheduler {
    pub fn new(plan: PacingPlan) -> Self {
        Self { plan }
    }

    /// Run the capture loop to completion.
    ///
    /// A capture or sink error aborts the whole run and propagates; skipping
    /// a frame silently would break the pacing invariant, and a corrupted
    /// video is worse than a short one. The cancel flag is honored at tick
    /// boundaries only.
    pub fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(ProgressUpdate),
    ) -> Result<PacingReport>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let plan = &self.plan;
        let start = Instant::now();
        let mut next_frame_time = start;
        let mut frames_recorded: u64 = 0;
        let mut cancelled = false;

        debug!(
            target_frames = plan.target_frames,
            interval_us = plan.frame_interval.as_micros() as u64,
            "pacing loop started"
        );

        while frames_recorded < plan.target_frames {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            if Instant::now() < next_frame_time {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }

            // Due. When the loop has fallen behind, capture back-to-back up
            // to the catch-up bound, then yield before the next check.
            let mut burst = 0;
            while frames_recorded < plan.target_frames
                && burst < MAX_CATCHUP_FRAMES_PER_CHECK
                && Instant::now() >= next_frame_time
            {
                let frame = source.capture()?;
                sink.append(frame)?;
                frames_recorded += 1;
                burst += 1;
                next_frame_time += plan.frame_interval;

                if frames_recorded % PROGRESS_INTERVAL_FRAMES == 0 {
                    let percent =
                        (frames_recorded * 100 / plan.target_frames).min(100) as u8;
                    on_progress(ProgressUpdate {
                        frames_recorded,
                        target_frames: plan.target_frames,
                        percent,
                    });
                }
            }

            if burst == MAX_CATCHUP_FRAMES_PER_CHECK && frames_recorded < plan.target_frames {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        Ok(PacingReport {
            frames_recorded,
            elapsed: start.elapsed(),
            cancelled,
        })
    }
}
