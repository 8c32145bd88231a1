//! Screenreel - frame-paced screen recording and delivery.
//!
//! Captures a region of the display at a fixed target frame rate for a
//! bounded duration, encodes the frames into an H.264/MP4 container, and
//! delivers the finished file to a Telegram chat.

pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod journal;
pub mod pacing;
pub mod region;
pub mod session;
pub mod upload;

pub use error::RecorderError;
