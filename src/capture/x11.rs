//! Frame source for Linux using X11 (XCB).

use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrConnectionExt;
use x11rb::protocol::xproto::{ConnectionExt, ImageFormat};
use x11rb::rust_connection::RustConnection;

use super::{FrameBuffer, FrameSource};
use crate::error::{RecorderError, Result};
use crate::region::{CaptureRegion, DisplayBounds};

/// Frame source reading the root window via X11 `GetImage`.
///
/// The connection is established once and reused for every frame; the region
/// was validated against the display bounds before construction.
pub struct X11FrameSource {
    conn: RustConnection,
    root: u32,
    region: CaptureRegion,
}

impl X11FrameSource {
    /// Connect to the X server for the given capture region.
    pub fn connect(region: CaptureRegion) -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(|e| {
            RecorderError::capture_unavailable(format!(
                "failed to connect to X11 display (is DISPLAY set?): {e}"
            ))
        })?;
        let root = conn.setup().roots[screen_num].root;

        Ok(Self { conn, root, region })
    }

    /// Query the bounds of the primary display.
    ///
    /// Prefers the RandR primary output's CRTC; falls back to the root
    /// window geometry when RandR gives nothing usable.
    pub fn primary_display_bounds() -> Result<DisplayBounds> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(|e| {
            RecorderError::capture_unavailable(format!(
                "failed to connect to X11 display (is DISPLAY set?): {e}"
            ))
        })?;
        let screen = &conn.setup().roots[screen_num];

        if let Some(bounds) = randr_primary_bounds(&conn, screen.root) {
            return Ok(bounds);
        }

        Ok(DisplayBounds {
            width: screen.width_in_pixels as u32,
            height: screen.height_in_pixels as u32,
        })
    }
}

impl FrameSource for X11FrameSource {
    fn capture(&mut self) -> Result<FrameBuffer> {
        let r = &self.region;
        // GetImage takes i16 coordinates and u16 extents. Region resolution
        // already bounds these, so a failed conversion means a bug upstream;
        // surface it rather than wrapping around on the wire.
        let (x, y, width, height) = (
            i16::try_from(r.x),
            i16::try_from(r.y),
            u16::try_from(r.width),
            u16::try_from(r.height),
        );
        let (Ok(x), Ok(y), Ok(width), Ok(height)) = (x, y, width, height) else {
            return Err(RecorderError::capture_unavailable(format!(
                "capture region {}x{}+{}+{} does not fit the X11 protocol range",
                r.width, r.height, r.x, r.y
            )));
        };
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                x,
                y,
                width,
                height,
                !0, // all planes
            )
            .map_err(|e| {
                RecorderError::capture_unavailable(format!("X11 GetImage request failed: {e}"))
            })?
            .reply()
            .map_err(|e| {
                RecorderError::capture_unavailable(format!("X11 GetImage failed: {e}"))
            })?;

        let rgb = convert_to_rgb(&reply.data, r.width, r.height, reply.depth)?;
        Ok(FrameBuffer::from_rgb(r.width, r.height, rgb))
    }
}

/// Bounds of the primary CRTC, if RandR can report one.
fn randr_primary_bounds(conn: &RustConnection, root: u32) -> Option<DisplayBounds> {
    let primary = conn.randr_get_output_primary(root).ok()?.reply().ok()?;
    let output_info = conn
        .randr_get_output_info(primary.output, 0)
        .ok()?
        .reply()
        .ok()?;
    let crtc_info = conn.randr_get_crtc_info(output_info.crtc, 0).ok()?.reply().ok()?;
    if crtc_info.width == 0 || crtc_info.height == 0 {
        return None;
    }
    Some(DisplayBounds {
        width: crtc_info.width as u32,
        height: crtc_info.height as u32,
    })
}

/// Convert X11 pixel data to dense RGB.
/// X11 typically returns BGRx (32-bit depth) or RGB565 (16-bit depth).
fn convert_to_rgb(data: &[u8], width: u32, height: u32, depth: u8) -> Result<Vec<u8>> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    match depth {
        32 | 24 => {
            // 32-bit Z_PIXMAP: BGRA or BGRx, 4 bytes per pixel
            let bytes_per_pixel = 4;
            if data.len() < pixel_count * bytes_per_pixel {
                return Err(RecorderError::capture_unavailable(format!(
                    "X11 returned a short pixel buffer: {} bytes for {} pixels",
                    data.len(),
                    pixel_count
                )));
            }
            for i in 0..pixel_count {
                let offset = i * bytes_per_pixel;
                rgb.push(data[offset + 2]); // R (from B position)
                rgb.push(data[offset + 1]); // G
                rgb.push(data[offset]); // B (from R position)
            }
        }
        16 => {
            // RGB565, 2 bytes per pixel
            for i in 0..pixel_count {
                let offset = i * 2;
                if offset + 1 < data.len() {
                    let pixel = u16::from_le_bytes([data[offset], data[offset + 1]]);
                    let r = ((pixel >> 11) & 0x1F) as u8;
                    let g = ((pixel >> 5) & 0x3F) as u8;
                    let b = (pixel & 0x1F) as u8;
                    rgb.push((r << 3) | (r >> 2));
                    rgb.push((g << 2) | (g >> 4));
                    rgb.push((b << 3) | (b >> 2));
                }
            }
        }
        other => {
            return Err(RecorderError::capture_unavailable(format!(
                "unsupported X11 pixel depth: {other}"
            )));
        }
    }

    Ok(rgb)
}
