//! Recording session: orchestrates region resolution, pacing, encoding,
//! finalization, and final statistics for a single run.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::capture::FrameSource;
use crate::encoder::EncoderSession;
use crate::error::{RecorderError, Result};
use crate::pacing::{PacingPlan, PacingScheduler, ProgressUpdate};
use crate::region::{CaptureRegion, DisplayBounds, RegionSpec};

/// A recording whose actual duration falls below this fraction of the target
/// gets a non-fatal warning; the artifact is still usable.
const SHORT_RECORDING_FRACTION: f64 = 0.8;

/// Inputs for one recording run. Immutable once the session starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub duration_seconds: i64,
    pub fps: i64,
    pub quality: u8,
    pub region: Option<RegionSpec>,
    pub output_dir: PathBuf,
}

/// Statistics populated after the capture loop terminates.
#[derive(Debug, Clone, Copy)]
pub struct RecordingStats {
    pub target_duration: Duration,
    pub actual_duration: Duration,
    pub frames_written: u64,
    pub file_size_bytes: u64,
}

/// Result of a completed (possibly cancelled) session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub video_path: PathBuf,
    pub region: CaptureRegion,
    pub stats: RecordingStats,
    /// Actual duration materially below target. Non-fatal.
    pub short_recording: bool,
    pub cancelled: bool,
}

/// One recording run. Parameter validation happens at construction, before
/// any display or file resource is touched.
#[derive(Debug)]
pub struct RecordingSession {
    options: SessionOptions,
    plan: PacingPlan,
}

impl RecordingSession {
    pub fn new(options: SessionOptions) -> Result<Self> {
        let plan = PacingPlan::new(options.duration_seconds, options.fps)?;
        if options.quality > 100 {
            return Err(RecorderError::invalid_parameters(format!(
                "quality must be between 0 and 100, got {}",
                options.quality
            )));
        }
        Ok(Self { options, plan })
    }

    /// The derived pacing plan.
    pub fn plan(&self) -> &PacingPlan {
        &self.plan
    }

    /// Run the session to completion: resolve region, open the encoder sink,
    /// drive the pacing loop, finalize, and compute statistics.
    ///
    /// On a fatal capture or encode error the remaining loop is abandoned
    /// but the sink is still finalized best-effort, so a truncated yet
    /// playable file may exist next to the returned error.
    pub fn record<S, F>(
        &self,
        display: DisplayBounds,
        open_source: F,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(ProgressUpdate),
    ) -> Result<SessionOutcome>
    where
        S: FrameSource,
        F: FnOnce(&CaptureRegion) -> Result<S>,
    {
        let region = CaptureRegion::resolve(self.options.region, display)?;

        std::fs::create_dir_all(&self.options.output_dir)
            .map_err(|e| RecorderError::io(&self.options.output_dir, e))?;
        let video_path = self.options.output_dir.join(format!(
            "screen_record_{}.mp4",
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let mut source = open_source(&region)?;
        let mut sink = EncoderSession::open(
            &video_path,
            self.plan.fps,
            region.width,
            region.height,
            self.options.quality,
        )?;

        info!(
            path = %video_path.display(),
            width = region.width,
            height = region.height,
            fps = self.plan.fps,
            frames = self.plan.target_frames,
            "recording started"
        );

        let scheduler = PacingScheduler::new(self.plan);
        let report = match scheduler.run(&mut source, &mut sink, cancel, &mut on_progress) {
            Ok(report) => report,
            Err(cause) => {
                // Best-effort finalize so a truncated but playable file
                // survives the abort.
                warn!(error = %cause, "recording aborted; finalizing partial file");
                match sink.finalize() {
                    Ok(partial) => info!(
                        path = %partial.path.display(),
                        frames = partial.frames_written,
                        "partial recording finalized"
                    ),
                    Err(finalize_err) => {
                        warn!(error = %finalize_err, "partial finalize failed")
                    }
                }
                return Err(cause);
            }
        };

        let finalized = sink.finalize()?;
        let stats = RecordingStats {
            target_duration: self.plan.target_duration,
            actual_duration: report.elapsed,
            frames_written: finalized.frames_written,
            file_size_bytes: finalized.file_size_bytes,
        };

        let short_recording = is_short_recording(stats.actual_duration, stats.target_duration);
        if short_recording {
            warn!(
                actual_secs = stats.actual_duration.as_secs_f64(),
                target_secs = stats.target_duration.as_secs_f64(),
                "recording is shorter than expected"
            );
        }

        info!(
            frames = stats.frames_written,
            duration_secs = stats.actual_duration.as_secs_f64(),
            size_bytes = stats.file_size_bytes,
            "recording finished"
        );

        Ok(SessionOutcome {
            video_path,
            region,
            stats,
            short_recording,
            cancelled: report.cancelled,
        })
    }
}

/// Whether the recorded span falls materially below the target.
fn is_short_recording(actual: Duration, target: Duration) -> bool {
    actual.as_secs_f64() < target.as_secs_f64() * SHORT_RECORDING_FRACTION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameBuffer;

    struct SolidSource {
        width: u32,
        height: u32,
        calls: u64,
        fail_at: Option<u64>,
    }

    impl FrameSource for SolidSource {
        fn capture(&mut self) -> Result<FrameBuffer> {
            self.calls += 1;
            if self.fail_at == Some(self.calls) {
                return Err(RecorderError::capture_unavailable("injected failure"));
            }
            Ok(FrameBuffer::solid(self.width, self.height, [60, 60, 60]))
        }
    }

    fn options(dir: &std::path::Path, duration: i64, fps: i64) -> SessionOptions {
        SessionOptions {
            duration_seconds: duration,
            fps,
            quality: 80,
            region: None,
            output_dir: dir.to_path_buf(),
        }
    }

    const SMALL_DISPLAY: DisplayBounds = DisplayBounds {
        width: 64,
        height: 48,
    };

    #[test]
    fn invalid_parameters_fail_before_any_resource_is_touched() {
        let dir = tempfile::tempdir().unwrap();
        for (duration, fps) in [(0, 15), (-1, 15), (10, 0), (10, -5)] {
            let err = RecordingSession::new(options(dir.path(), duration, fps)).unwrap_err();
            assert!(matches!(err, RecorderError::InvalidParameters { .. }));
        }
        let mut opts = options(dir.path(), 10, 15);
        opts.quality = 101;
        assert!(RecordingSession::new(opts).is_err());
    }

    #[test]
    fn full_run_produces_stats_and_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(options(dir.path(), 1, 10)).unwrap();
        let cancel = AtomicBool::new(false);

        let outcome = session
            .record(
                SMALL_DISPLAY,
                |region| {
                    Ok(SolidSource {
                        width: region.width,
                        height: region.height,
                        calls: 0,
                        fail_at: None,
                    })
                },
                &cancel,
                |_| {},
            )
            .unwrap();

        assert_eq!(outcome.stats.frames_written, 10);
        assert!(outcome.stats.file_size_bytes > 0);
        assert!(outcome.video_path.exists());
        assert!(!outcome.short_recording);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.region.width, 64);
        assert_eq!(outcome.region.height, 48);
    }

    #[test]
    fn capture_failure_still_finalizes_a_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(options(dir.path(), 1, 20)).unwrap();
        let cancel = AtomicBool::new(false);

        let err = session
            .record(
                SMALL_DISPLAY,
                |region| {
                    Ok(SolidSource {
                        width: region.width,
                        height: region.height,
                        calls: 0,
                        fail_at: Some(5),
                    })
                },
                &cancel,
                |_| {},
            )
            .unwrap_err();

        assert!(matches!(err, RecorderError::CaptureUnavailable { .. }));
        // The partial container was still closed and exists on disk.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn cancellation_is_reported_as_short() {
        let dir = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(options(dir.path(), 60, 10)).unwrap();
        let cancel = AtomicBool::new(true); // stop at the first tick boundary

        let outcome = session
            .record(
                SMALL_DISPLAY,
                |region| {
                    Ok(SolidSource {
                        width: region.width,
                        height: region.height,
                        calls: 0,
                        fail_at: None,
                    })
                },
                &cancel,
                |_| {},
            )
            .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.short_recording);
        assert_eq!(outcome.stats.frames_written, 0);
    }

    #[test]
    fn short_recording_threshold_is_eighty_percent() {
        let target = Duration::from_secs(10);
        assert!(is_short_recording(Duration::from_secs_f64(7.9), target));
        assert!(!is_short_recording(Duration::from_secs_f64(8.1), target));
        assert!(!is_short_recording(Duration::from_secs(10), target));
    }
}
