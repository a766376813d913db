//! Protocol identifiers and the protobuf payloads carried in command frames.
//!
//! See <https://gopro.github.io/OpenGoPro/ble/protocol/id_tables.html>. Only
//! the messages this crate sends are declared here.

/// Legacy TLV command setting the shutter; its only parameter is the value.
pub const SET_SHUTTER: u8 = 0x01;
pub const SHUTTER_PARAM: u8 = 0x01;

/// Responses to commands written on the command request characteristic.
pub const COMMAND_RESPONSE_FEATURE: u8 = 0x72;
pub const COMMAND_RESPONSE_ACTIONS: &[u8] = &[0x72, 0x73];

pub const NETWORK_MANAGEMENT_FEATURE: u8 = 0x02;
pub const REQUEST_CONNECT_NEW: u8 = 0x05;
pub const CONNECT_NEW_ACTIONS: &[u8] = &[0x05, 0x85];

pub const COMMAND_FEATURE: u8 = 0xF1;
pub const SET_LIVE_STREAM_MODE: u8 = 0x79;
pub const SET_LIVE_STREAM_MODE_ACTIONS: &[u8] = &[0xF1, 0xF9];

/// Configures where and how the camera livestreams.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestSetLiveStreamMode {
    /// RTMP URL, stream key included.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// Also save the stream to the SD card.
    #[prost(bool, optional, tag = "2")]
    pub encode: Option<bool>,
    #[prost(enumeration = "WindowSize", optional, tag = "3")]
    pub window_size: Option<i32>,
    #[prost(int32, optional, tag = "7")]
    pub minimum_bitrate: Option<i32>,
    #[prost(int32, optional, tag = "8")]
    pub maximum_bitrate: Option<i32>,
    #[prost(int32, optional, tag = "9")]
    pub starting_bitrate: Option<i32>,
    #[prost(enumeration = "Lens", optional, tag = "10")]
    pub lens: Option<i32>,
}

impl RequestSetLiveStreamMode {
    /// Stream to `url` without recording locally, everything else left to the
    /// camera.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            encode: Some(false),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WindowSize {
    Size480 = 4,
    Size720 = 7,
    Size1080 = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Lens {
    Wide = 0,
    Superview = 3,
    Linear = 4,
}

/// Joins an access point the camera has not been provisioned for yet.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestConnectNew {
    #[prost(string, required, tag = "1")]
    pub ssid: String,
    #[prost(string, required, tag = "2")]
    pub password: String,
    #[prost(bool, optional, tag = "10")]
    pub bypass_eula_check: Option<bool>,
}
