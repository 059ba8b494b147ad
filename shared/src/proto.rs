//! Wire messages exchanged between edge devices and the control server.
//!
//! Messages are declared directly with prost derives. Tags are part of the
//! wire contract; never renumber an existing field.

use serde::{Deserialize, Serialize};

/// Top-level frame payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(oneof = "envelope::Payload", tags = "2, 3")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Heartbeat(super::Heartbeat),
        #[prost(message, tag = "3")]
        Command(super::Command),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Vehicle identifier for device-originated frames, "server" otherwise
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(uint64, tag = "2")]
    pub sequence_id: u64,
    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,
    #[prost(enumeration = "MessageType", tag = "4")]
    pub msg_type: i32,
}

/// Periodic device status report.
///
/// `streaming_camera` and `streaming_error` are optional on the wire so that
/// "not reported" survives decoding as `None` instead of an empty string.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(enumeration = "StreamingStatus", tag = "1")]
    pub streaming_status: i32,
    #[prost(string, optional, tag = "2")]
    pub streaming_camera: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub streaming_error: Option<String>,
    #[prost(bool, tag = "4")]
    pub destination_configured: bool,
    #[prost(message, repeated, tag = "5")]
    pub cameras: Vec<CameraInfo>,
    #[prost(uint64, tag = "6")]
    pub uptime_ms: u64,
    /// ID of the last command the device executed. Lets the server tell a
    /// report sent before a command arrived from one sent after it.
    #[prost(string, optional, tag = "7")]
    pub last_command_id: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CameraInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "CameraStatus", tag = "2")]
    pub status: i32,
}

/// Operator intent forwarded to a device
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(string, tag = "1")]
    pub command_id: String,
    #[prost(enumeration = "CommandKind", tag = "2")]
    pub kind: i32,
    #[prost(string, optional, tag = "3")]
    pub camera: Option<String>,
    #[prost(uint64, tag = "4")]
    pub expires_at_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    MsgUnknown = 0,
    MsgHeartbeat = 1,
    MsgCommand = 2,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum StreamingStatus {
    #[serde(skip)]
    Unspecified = 0,
    Idle = 1,
    Starting = 2,
    Live = 3,
    Stopping = 4,
    Error = 5,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CameraStatus {
    #[serde(skip)]
    Unspecified = 0,
    Available = 1,
    Active = 2,
    Unavailable = 3,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CommandKind {
    #[serde(skip)]
    Unspecified = 0,
    Start = 1,
    Stop = 2,
    SwitchCamera = 3,
}

impl CommandKind {
    /// Whether the command names a camera to stream from
    pub fn needs_camera(self) -> bool {
        matches!(self, CommandKind::Start | CommandKind::SwitchCamera)
    }
}
