//! Frame capture: one still image of the configured region per call.

#[cfg(target_os = "linux")]
mod x11;

#[cfg(target_os = "linux")]
pub use x11::X11FrameSource;

use crate::error::Result;

/// One decoded still image, ready for encoding.
///
/// Pixels are dense, row-major RGB (3 bytes per pixel), the channel order
/// the encoder expects. Any platform-native order (BGRx and friends) is
/// normalized here at the capture boundary, so downstream components never
/// reason about color layout.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Build a frame from raw RGB bytes. Length must be `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a frame filled with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// A source of display snapshots for the configured capture region.
///
/// Each call produces a fresh snapshot at the moment of the call; nothing is
/// cached across calls. The call blocks for the duration of the underlying
/// screen read.
pub trait FrameSource {
    fn capture(&mut self) -> Result<FrameBuffer>;
}
