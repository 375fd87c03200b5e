//! Upload speed derived from progress samples.
//!
//! Speeds are reported in kB/s, computed as bytes per millisecond
//! (1 B/ms = 1000 B/s = 1 kB/s).

use std::time::Instant;

use serde::Serialize;

/// Elapsed time floor, avoids dividing by zero on back-to-back samples.
const MIN_ELAPSED_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Anchor {
    bytes_sent: u64,
    timestamp: Instant,
}

/// Speed figure attached to a progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Speed {
    /// Speed since the current anchor, while the image is still uploading.
    Current { kilobytes_per_second: f64 },
    /// Final figure once the whole image has been sent.
    Completed {
        bytes_sent: u64,
        average_kilobytes_per_second: f64,
    },
}

/// Result of feeding one progress sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedReport {
    /// Fraction of the image sent, 0.0 to 1.0.
    pub progress: f32,
    /// Whether the progress indicator may animate to the new value.
    pub smooth: bool,
    pub speed: Speed,
}

impl SpeedReport {
    /// Text for the speed label.
    pub fn speed_text(&self) -> String {
        match self.speed {
            Speed::Current {
                kilobytes_per_second,
            } => format!("{:.2} kB/s", kilobytes_per_second),
            Speed::Completed {
                bytes_sent,
                average_kilobytes_per_second,
            } => format!(
                "{} bytes sent (avg {:.2} kB/s)",
                bytes_sent, average_kilobytes_per_second
            ),
        }
    }
}

/// Derives instantaneous and average speed from progress callbacks.
///
/// Only two anchors and the last sample are kept:
/// - `image_start`: first sample of the current image
/// - `anchor`: first sample since the image started or the upload resumed
///
/// Time spent before a pause is banked when resuming so the final average
/// covers the whole image without the paused period.
#[derive(Debug, Default)]
pub struct ThroughputTracker {
    image_size: Option<u64>,
    image_start: Option<Anchor>,
    anchor: Option<Anchor>,
    last_timestamp: Option<Instant>,
    banked_ms: f64,
}

fn elapsed_ms(from: Instant, to: Instant) -> f64 {
    to.saturating_duration_since(from).as_secs_f64() * 1000.0
}

fn fraction(bytes_sent: u64, image_size: u64) -> f32 {
    if image_size == 0 {
        1.0
    } else {
        (bytes_sent as f64 / image_size as f64).min(1.0) as f32
    }
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, as before a new upload.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Restart speed measurement after a pause.
    ///
    /// The next sample becomes the new anchor. Active time before the pause
    /// is kept for the final average.
    pub fn resume(&mut self) {
        if let (Some(anchor), Some(last)) = (self.anchor, self.last_timestamp) {
            self.banked_ms += elapsed_ms(anchor.timestamp, last);
        }
        self.anchor = None;
    }

    /// Feed one progress sample.
    pub fn observe(&mut self, bytes_sent: u64, image_size: u64, timestamp: Instant) -> SpeedReport {
        let sample = Anchor {
            bytes_sent,
            timestamp,
        };

        let smooth = if self.image_size != Some(image_size) || self.image_start.is_none() {
            // New image: both anchors start here.
            self.image_size = Some(image_size);
            self.image_start = Some(sample);
            self.anchor = Some(sample);
            self.banked_ms = 0.0;
            false
        } else if self.anchor.is_none() {
            // First sample after resuming.
            self.anchor = Some(sample);
            false
        } else {
            true
        };
        self.last_timestamp = Some(timestamp);

        let anchor = self.anchor.unwrap_or(sample);
        let since_anchor_ms = elapsed_ms(anchor.timestamp, timestamp);

        let speed = if bytes_sent >= image_size {
            let start = self.image_start.unwrap_or(sample);
            let active_ms = (self.banked_ms + since_anchor_ms).max(MIN_ELAPSED_MS);
            Speed::Completed {
                bytes_sent: image_size,
                average_kilobytes_per_second: image_size.saturating_sub(start.bytes_sent) as f64
                    / active_ms,
            }
        } else {
            let sent = bytes_sent.saturating_sub(anchor.bytes_sent);
            Speed::Current {
                kilobytes_per_second: sent as f64 / since_anchor_ms.max(MIN_ELAPSED_MS),
            }
        };

        SpeedReport {
            progress: fraction(bytes_sent, image_size),
            smooth,
            speed,
        }
    }
}
