//! Capture region resolution.
//!
//! Turns an optional explicit rectangle into a validated [`CaptureRegion`],
//! falling back to the full bounds of the primary display. Validation happens
//! once here; the capture path does not re-check per frame.

use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};

/// Pixel dimensions of the addressable display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub width: u32,
    pub height: u32,
}

/// An explicit capture rectangle as requested by the caller (CLI or config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A validated rectangular subset of display pixels. Immutable once a
/// session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Resolve the capture rectangle: the explicit request if given,
    /// otherwise the full display bounds.
    ///
    /// Width and height are rounded down to even values because the H.264
    /// encoder works on 4:2:0 subsampled frames.
    pub fn resolve(explicit: Option<RegionSpec>, display: DisplayBounds) -> Result<Self> {
        if display.width == 0 || display.height == 0 {
            return Err(RecorderError::invalid_region(format!(
                "display reports empty bounds {}x{}",
                display.width, display.height
            )));
        }

        let (x, y, width, height) = match explicit {
            Some(spec) => {
                if spec.width <= 0 || spec.height <= 0 {
                    return Err(RecorderError::invalid_region(format!(
                        "region extents must be positive, got {}x{}",
                        spec.width, spec.height
                    )));
                }
                if spec.x < 0 || spec.y < 0 {
                    return Err(RecorderError::invalid_region(format!(
                        "region origin ({}, {}) lies outside the display",
                        spec.x, spec.y
                    )));
                }
                let right = spec.x as i64 + spec.width as i64;
                let bottom = spec.y as i64 + spec.height as i64;
                if right > display.width as i64 || bottom > display.height as i64 {
                    return Err(RecorderError::invalid_region(format!(
                        "region {}x{}+{}+{} exceeds display bounds {}x{}",
                        spec.width, spec.height, spec.x, spec.y, display.width, display.height
                    )));
                }
                (spec.x, spec.y, spec.width as u32, spec.height as u32)
            }
            None => (0, 0, display.width, display.height),
        };

        // The X11 GetImage request addresses pixels with i16 coordinates and
        // u16 extents, so anything wider is unservable on the wire.
        if x > i16::MAX as i32 || y > i16::MAX as i32 {
            return Err(RecorderError::invalid_region(format!(
                "region origin ({x}, {y}) exceeds the protocol coordinate range"
            )));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(RecorderError::invalid_region(format!(
                "region extents {width}x{height} exceed the protocol size range"
            )));
        }

        // Round down to even extents for 4:2:0 chroma subsampling.
        let width = width & !1;
        let height = height & !1;
        if width < 2 || height < 2 {
            return Err(RecorderError::invalid_region(format!(
                "region too small to encode: {}x{}",
                width, height
            )));
        }

        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Number of pixels in the region.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
