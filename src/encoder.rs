//! Video encoder sink: H.264 encoding (openh264) muxed into MP4 (minimp4).
//!
//! An [`EncoderSession`] is the live, append-only video file: created by
//! [`EncoderSession::open`], fed frames in strict arrival order through
//! [`EncoderSession::append`], and closed exactly once by
//! [`EncoderSession::finalize`], which takes the session by value so a late
//! `append` cannot compile.

use std::fs::File;
use std::path::{Path, PathBuf};

use minimp4::Mp4Muxer;
use openh264::encoder::{Encoder, EncoderConfig, RateControlMode};
use openh264::formats::{RgbSliceU8, YUVBuffer};
use openh264::OpenH264API;
use tracing::debug;

use crate::capture::FrameBuffer;
use crate::error::{RecorderError, Result};

/// Summary of a finalized container file.
#[derive(Debug, Clone)]
pub struct FinalizedVideo {
    pub path: PathBuf,
    pub frames_written: u64,
    pub file_size_bytes: u64,
}

/// Live handle to an in-progress, append-only MP4 file.
pub struct EncoderSession {
    encoder: Encoder,
    muxer: Mp4Muxer<File>,
    path: PathBuf,
    fps: u32,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl std::fmt::Debug for EncoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSession")
            .field("path", &self.path)
            .field("fps", &self.fps)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

impl EncoderSession {
    /// Open the container file and set up the codec.
    ///
    /// `quality` (0-100) selects the quantizer and target bitrate; see
    /// [`quantizer_for_quality`].
    pub fn open(path: &Path, fps: u32, width: u32, height: u32, quality: u8) -> Result<Self> {
        if fps == 0 {
            return Err(RecorderError::invalid_parameters("fps must be positive"));
        }
        if width < 2 || height < 2 || width % 2 != 0 || height % 2 != 0 {
            return Err(RecorderError::encode_failure(format!(
                "frame dimensions must be even and at least 2x2, got {width}x{height}"
            )));
        }

        let bitrate = bitrate_bps(width, height, fps, quality);
        let config = EncoderConfig::new()
            .max_frame_rate(fps as f32)
            .rate_control_mode(RateControlMode::Bitrate)
            .set_bitrate_bps(bitrate);
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| RecorderError::encode_failure(format!("encoder setup failed: {e}")))?;

        let file = File::create(path).map_err(|e| RecorderError::io(path, e))?;
        let mut muxer = Mp4Muxer::new(file);
        muxer.init_video(width as i32, height as i32, false, "screenreel recording");

        debug!(
            path = %path.display(),
            width, height, fps, quality, bitrate,
            "encoder session opened"
        );

        Ok(Self {
            encoder,
            muxer,
            path: path.to_path_buf(),
            fps,
            width,
            height,
            frames_written: 0,
        })
    }

    /// Append one frame as the next sequential sample. Consumes the buffer.
    pub fn append(&mut self, frame: FrameBuffer) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(RecorderError::encode_failure(format!(
                "frame dimensions {}x{} do not match session {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let rgb = RgbSliceU8::new(
            &frame.data,
            (self.width as usize, self.height as usize),
        );
        let yuv = YUVBuffer::from_rgb_source(rgb);
        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| RecorderError::encode_failure(format!("codec rejected frame: {e}")))?;

        let annex_b = bitstream.to_vec();
        if !annex_b.is_empty() {
            self.muxer.write_video_with_fps(&annex_b, self.fps);
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames appended so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush indices and close the file, making it a playable container.
    pub fn finalize(self) -> Result<FinalizedVideo> {
        self.muxer.close();

        let file_size_bytes = std::fs::metadata(&self.path)
            .map_err(|e| RecorderError::io(&self.path, e))?
            .len();

        debug!(
            path = %self.path.display(),
            frames = self.frames_written,
            bytes = file_size_bytes,
            "encoder session finalized"
        );

        Ok(FinalizedVideo {
            path: self.path,
            frames_written: self.frames_written,
            file_size_bytes,
        })
    }
}

impl crate::pacing::FrameSink for EncoderSession {
    fn append(&mut self, frame: FrameBuffer) -> Result<()> {
        EncoderSession::append(self, frame)
    }
}

/// Map a 0-100 quality input to an H.264 quantizer.
///
/// Monotonic, non-increasing: quality 0 gives QP 40, quality 100 gives QP 12.
/// Mirrors the shape of a linear CRF curve (higher quality, lower
/// quantization, larger output).
pub fn quantizer_for_quality(quality: u8) -> u32 {
    let q = quality.min(100) as u32;
    40 - q * 28 / 100
}

/// Derive the target bitrate from region size, frame rate, and quality.
/// Strictly grows as the quantizer drops.
pub fn bitrate_bps(width: u32, height: u32, fps: u32, quality: u8) -> u32 {
    let qp = quantizer_for_quality(quality);
    let pixels_per_second = width as u64 * height as u64 * fps as u64;
    // 0.04 bits/pixel at QP 40 up to 0.32 bits/pixel at QP 12.
    let millibits_per_pixel = 40 + (40 - qp as u64) * 10;
    let bps = pixels_per_second * millibits_per_pixel / 1000;
    bps.clamp(200_000, u32::MAX as u64) as u32
}
