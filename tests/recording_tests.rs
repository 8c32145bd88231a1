//! End-to-end recording tests: session orchestration into a real MP4 file,
//! verified by reading the container back and decoding the samples.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use openh264::nal_units;

use screenreel::capture::{FrameBuffer, FrameSource};
use screenreel::error::{RecorderError, Result};
use screenreel::region::DisplayBounds;
use screenreel::session::{RecordingSession, SessionOptions};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

/// Produces solid gray frames with strictly increasing brightness, so the
/// decoded video reveals both frame count and frame order.
struct RampSource {
    calls: u64,
    fail_at: Option<u64>,
}

impl RampSource {
    fn shade(index: u64) -> u8 {
        (20 + index * 25).min(255) as u8
    }
}

impl FrameSource for RampSource {
    fn capture(&mut self) -> Result<FrameBuffer> {
        if self.fail_at == Some(self.calls + 1) {
            return Err(RecorderError::CaptureUnavailable {
                reason: "injected failure".into(),
            });
        }
        let shade = Self::shade(self.calls);
        self.calls += 1;
        Ok(FrameBuffer::solid(WIDTH, HEIGHT, [shade, shade, shade]))
    }
}

fn session_options(dir: &Path, duration: i64, fps: i64) -> SessionOptions {
    SessionOptions {
        duration_seconds: duration,
        fps,
        quality: 90,
        region: None,
        output_dir: dir.to_path_buf(),
    }
}

const DISPLAY: DisplayBounds = DisplayBounds {
    width: WIDTH,
    height: HEIGHT,
};

/// Rewrite AVCC length-prefixed NAL units as an annex-b stream.
fn avcc_to_annex_b(sample: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(sample.len() + 16);
    let mut i = 0;
    while i + 4 <= sample.len() {
        let len = u32::from_be_bytes([sample[i], sample[i + 1], sample[i + 2], sample[i + 3]])
            as usize;
        let end = (i + 4 + len).min(sample.len());
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(&sample[i + 4..end]);
        i = end;
    }
    out
}

/// Mean of the decoded luma plane.
fn mean_luma(yuv: &impl YUVSource) -> f64 {
    let (width, height) = yuv.dimensions();
    let stride = yuv.strides().0;
    let y = yuv.y();
    let mut sum = 0u64;
    for row in 0..height {
        for col in 0..width {
            sum += y[row * stride + col] as u64;
        }
    }
    sum as f64 / (width * height) as f64
}

#[test]
fn recorded_file_round_trips_with_count_and_order_intact() {
    let dir = tempfile::tempdir().unwrap();
    let session = RecordingSession::new(session_options(dir.path(), 1, 8)).unwrap();
    let cancel = AtomicBool::new(false);

    let outcome = session
        .record(
            DISPLAY,
            |_region| {
                Ok(RampSource {
                    calls: 0,
                    fail_at: None,
                })
            },
            &cancel,
            |_| {},
        )
        .unwrap();
    assert_eq!(outcome.stats.frames_written, 8);

    // Container structure: one video track, eight samples, right geometry.
    let file = File::open(&outcome.video_path).unwrap();
    let size = file.metadata().unwrap().len();
    let mut mp4 = mp4::Mp4Reader::read_header(BufReader::new(file), size).unwrap();
    let track_id = *mp4.tracks().keys().next().expect("no track in container");
    {
        let track = &mp4.tracks()[&track_id];
        assert_eq!(track.sample_count(), 8);
        assert_eq!(track.width() as u32, WIDTH);
        assert_eq!(track.height() as u32, HEIGHT);
    }

    // Decode the samples in container order. SPS/PPS live in the avcC box,
    // so feed those to the decoder first.
    let parameter_sets = {
        let stsd = &mp4.moov.traks[0].mdia.minf.stbl.stsd;
        let avcc = &stsd.avc1.as_ref().expect("no avc1 entry").avcc;
        let mut buf = Vec::new();
        for sps in &avcc.sequence_parameter_sets {
            buf.extend_from_slice(&[0, 0, 0, 1]);
            buf.extend_from_slice(&sps.bytes);
        }
        for pps in &avcc.picture_parameter_sets {
            buf.extend_from_slice(&[0, 0, 0, 1]);
            buf.extend_from_slice(&pps.bytes);
        }
        buf
    };

    let mut decoder = Decoder::new().unwrap();
    for nal in nal_units(&parameter_sets) {
        let _ = decoder.decode(nal).unwrap();
    }

    let mut lumas = Vec::new();
    for i in 1..=8u32 {
        let sample = mp4.read_sample(track_id, i).unwrap().expect("missing sample");
        let annex_b = avcc_to_annex_b(&sample.bytes);
        for nal in nal_units(&annex_b) {
            if let Some(yuv) = decoder.decode(nal).unwrap() {
                lumas.push(mean_luma(&yuv));
            }
        }
    }

    assert_eq!(lumas.len(), 8, "decoded frame count mismatch: {lumas:?}");
    for pair in lumas.windows(2) {
        assert!(
            pair[1] > pair[0] + 5.0,
            "frames out of order or corrupted: {lumas:?}"
        );
    }
}

#[test]
fn aborted_recording_leaves_a_valid_truncated_container() {
    let dir = tempfile::tempdir().unwrap();
    let session = RecordingSession::new(session_options(dir.path(), 1, 10)).unwrap();
    let cancel = AtomicBool::new(false);

    let err = session
        .record(
            DISPLAY,
            |_region| {
                Ok(RampSource {
                    calls: 0,
                    fail_at: Some(5),
                })
            },
            &cancel,
            |_| {},
        )
        .unwrap_err();
    assert!(matches!(err, RecorderError::CaptureUnavailable { .. }));

    // The best-effort finalize left a readable container with the frames
    // captured before the failure.
    let video_path = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|ext| ext == "mp4"))
        .expect("no container file written");

    let file = File::open(&video_path).unwrap();
    let size = file.metadata().unwrap().len();
    let mp4 = mp4::Mp4Reader::read_header(BufReader::new(file), size).unwrap();
    let track = mp4.tracks().values().next().expect("no track in container");
    assert!(track.sample_count() <= 4);
    assert!(track.sample_count() > 0);
}
