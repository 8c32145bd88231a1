//! Artifact sink: delivers the finished recording to the Telegram Bot API.
//!
//! The sink receives a finalized file plus caption metadata and reports
//! success or failure with a diagnostic. Its failures never invalidate the
//! local file; retention is the caller's policy.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::{RecorderError, Result};
use crate::session::RecordingStats;

/// Outcome of an upload attempt, whether accepted or rejected.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Whether the endpoint accepted the video.
    pub ok: bool,
    /// Human-readable diagnostic from the endpoint or the transport.
    pub diagnostic: String,
    /// Duration of the whole upload operation.
    pub upload_duration_ms: u64,
}

impl UploadReceipt {
    /// Receipt for a delivery that never reached the endpoint, so the
    /// failure still lands in the session journal.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: diagnostic.into(),
            upload_duration_ms: 0,
        }
    }
}

/// Subset of the Bot API response envelope we care about.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram uploader.
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    retry_attempts: u32,
}

impl TelegramSink {
    /// Create a new sink from delivery settings. The token is treated as
    /// opaque and never logged.
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            retry_attempts: 3,
        }
    }

    /// Set the number of retry attempts for transport failures.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Upload the finalized video with its caption.
    ///
    /// Transport errors are retried with exponential backoff; an explicit
    /// rejection from the API is returned as a failed receipt without
    /// retrying.
    pub async fn upload(&self, video_path: &Path, caption: &str) -> Result<UploadReceipt> {
        let start = Instant::now();
        let data = tokio::fs::read(video_path)
            .await
            .map_err(|e| RecorderError::io(video_path, e))?;
        let file_name = video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.mp4".to_string());
        let url = format!("{}/bot{}/sendVideo", self.api_base, self.bot_token);

        let mut last_error = None;
        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                debug!("Retry attempt {} after {:?}", attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }

            let part = Part::bytes(data.clone())
                .file_name(file_name.clone())
                .mime_str("video/mp4")
                .map_err(|e| RecorderError::Upload {
                    diagnostic: format!("invalid upload part: {e}"),
                })?;
            let form = Form::new()
                .text("chat_id", self.chat_id.clone())
                .text("caption", caption.to_string())
                .text("supports_streaming", "true")
                .part("video", part);

            let response = match self.client.post(&url).multipart(form).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Upload attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let status = response.status();
            let body: ApiResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => ApiResponse {
                    ok: false,
                    description: Some(format!("unreadable API response ({status}): {e}")),
                },
            };

            let upload_duration_ms = start.elapsed().as_millis() as u64;
            if body.ok {
                return Ok(UploadReceipt {
                    ok: true,
                    diagnostic: "video delivered".to_string(),
                    upload_duration_ms,
                });
            }

            // The endpoint answered and said no; retrying the same payload
            // will not change its mind.
            let diagnostic = body
                .description
                .unwrap_or_else(|| format!("API rejected the upload ({status})"));
            return Ok(UploadReceipt {
                ok: false,
                diagnostic,
                upload_duration_ms,
            });
        }

        Err(RecorderError::Upload {
            diagnostic: match last_error {
                Some(e) => format!("all {} attempts failed: {e}", self.retry_attempts),
                None => "upload failed with no error".to_string(),
            },
        })
    }
}

/// Format the caption metadata for the delivered video: date, recorded
/// duration, and resolution.
pub fn format_caption(stats: &RecordingStats, width: u32, height: u32) -> String {
    format!(
        "\u{1F4F9} Screen recording\n\
         \u{1F4C5} Date: {}\n\
         \u{23F1} Duration: {:.2} seconds\n\
         \u{1F5A5} Size: {}x{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        stats.actual_duration.as_secs_f64(),
        width,
        height
    )
}
