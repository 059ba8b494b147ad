//! Vehicle Stream State Machine
//!
//! Defines the authoritative per-vehicle streaming states, the events that move
//! between them, and the translation of failure causes into operator-safe
//! messages.

use crate::{CommandKind, RESTART_LIMIT_MARKER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamState {
    /// Never heard from, or silent past the offline threshold while not streaming
    #[default]
    Disconnected,
    Idle,
    Starting,
    Streaming,
    Stopping,
    /// Left only through a fresh operator command
    Error,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// A heartbeat arrived from the vehicle
    HeartbeatReceived,
    /// An operator command was accepted
    Issued(CommandKind),
    /// A heartbeat confirmed the outcome of the pending command
    Acknowledged(CommandKind),
    /// The pending command outlived its TTL
    CommandTimedOut,
    /// The device reported a streaming error
    DeviceError,
    /// Heartbeats absent beyond the offline threshold
    OfflineTimeout,
}

/// Get the next state for an event, or `None` if the event does not apply
/// from `from`.
pub fn next_state(from: StreamState, event: StreamEvent) -> Option<StreamState> {
    use CommandKind::*;
    use StreamEvent::*;
    use StreamState::*;

    match (from, event) {
        (Disconnected, HeartbeatReceived) => Some(Idle),

        (Idle | Error, Issued(Start)) => Some(Starting),
        (Streaming, Issued(Stop)) => Some(Stopping),
        // Camera field changes on ack; no intermediate state
        (Streaming, Issued(SwitchCamera)) => Some(Streaming),

        (Starting, Acknowledged(Start)) => Some(Streaming),
        (Streaming, Acknowledged(SwitchCamera)) => Some(Streaming),
        (Stopping, Acknowledged(Stop)) => Some(Idle),

        (Starting | Stopping | Streaming, CommandTimedOut) => Some(Error),
        (Idle | Starting | Streaming | Stopping, DeviceError) => Some(Error),

        // A streaming vehicle keeps its last known state while silent
        (Idle | Starting | Stopping | Error, OfflineTimeout) => Some(Disconnected),

        _ => None,
    }
}

/// Why a vehicle entered ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    Timeout,
    Encoder,
    CameraNotFound,
    Destination,
    RestartLimit,
    Unknown,
}

impl ErrorCause {
    /// Classify a raw device error. The raw text is only inspected, never
    /// surfaced.
    pub fn classify(raw: &str) -> Self {
        let raw = raw.to_ascii_lowercase();
        let words: Vec<&str> = raw
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |needles: &[&str]| needles.iter().any(|n| raw.contains(n));
        // Short tool and protocol names only count as whole words ("srt" sits inside "insert")
        let names = |needles: &[&str]| needles.iter().any(|n| words.contains(n));

        if raw.contains(RESTART_LIMIT_MARKER) {
            ErrorCause::RestartLimit
        } else if mentions(&["camera", "no such device", "device not found", "/dev/video"]) {
            ErrorCause::CameraNotFound
        } else if mentions(&["encoder", "pipeline", "codec", "ffmpeg"])
            || names(&["gst", "gstreamer"])
        {
            ErrorCause::Encoder
        } else if mentions(&[
            "destination",
            "ingest",
            "connection",
            "refused",
            "unreachable",
            "network",
        ]) || names(&["rtmp", "rtmps", "srt"])
        {
            ErrorCause::Destination
        } else {
            ErrorCause::Unknown
        }
    }

    /// Operator-visible message for this cause
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCause::Timeout => "device did not respond in time",
            ErrorCause::Encoder => "video encoder failed to start",
            ErrorCause::CameraNotFound => "camera not available",
            ErrorCause::Destination => "stream connection failed",
            ErrorCause::RestartLimit => {
                "streaming process kept crashing; restart it manually once the device is checked"
            }
            ErrorCause::Unknown => "device reported a streaming error",
        }
    }
}

/// Presentation tone for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Muted,
    Neutral,
    Pending,
    Live,
    Critical,
}

/// Label and tone for status panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: &'static str,
    pub tone: StatusTone,
}

impl StreamState {
    pub fn display(self) -> StatusDisplay {
        let (label, tone) = match self {
            StreamState::Disconnected => ("Disconnected", StatusTone::Muted),
            StreamState::Idle => ("Ready", StatusTone::Neutral),
            StreamState::Starting => ("Starting", StatusTone::Pending),
            StreamState::Streaming => ("Live", StatusTone::Live),
            StreamState::Stopping => ("Stopping", StatusTone::Pending),
            StreamState::Error => ("Error", StatusTone::Critical),
        };
        StatusDisplay { label, tone }
    }
}
