use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::proto::{Lens, RequestSetLiveStreamMode, WindowSize};
use crate::Credentials;

/// Timings for one camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub scan_timeout: Duration,
    /// How long a single exchange may wait for its response.
    pub response_timeout: Duration,
    /// Pause after configuring the livestream, before the shutter is set.
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Connect a GoPro to an access point and start livestreaming to an RTMP server.
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// SSID of network to connect to
    pub ssid: String,

    /// Password of network to connect to
    pub password: String,

    /// RTMP server address on the local network the camera will livestream
    /// to, stream key included (e.g. rtmp://127.0.0.1/live/EXAMPLE)
    pub serveraddr: String,

    /// Last 4 digits of the camera serial number. If not used, the first
    /// discovered GoPro is connected to
    #[arg(short, long)]
    pub identifier: Option<String>,

    /// Seconds to scan for the camera
    #[arg(long, env = "GOPRO_SCAN_TIMEOUT_SECS", default_value_t = 5)]
    pub scan_timeout_secs: u64,

    /// Seconds to wait for each response from the camera
    #[arg(long, env = "GOPRO_RESPONSE_TIMEOUT_SECS", default_value_t = 10)]
    pub response_timeout_secs: u64,

    /// Seconds to let the camera apply the livestream configuration
    #[arg(long, env = "GOPRO_SETTLE_SECS", default_value_t = 2)]
    pub settle_secs: u64,

    /// Also record the stream to the SD card
    #[arg(long)]
    pub record: bool,

    #[arg(long, value_enum)]
    pub resolution: Option<Resolution>,

    #[arg(long, value_enum)]
    pub lens: Option<LensArg>,

    /// Kbps
    #[arg(long)]
    pub min_bitrate: Option<i32>,

    /// Kbps
    #[arg(long)]
    pub max_bitrate: Option<i32>,

    /// Kbps
    #[arg(long)]
    pub starting_bitrate: Option<i32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resolution {
    #[value(name = "480")]
    P480,
    #[value(name = "720")]
    P720,
    #[value(name = "1080")]
    P1080,
}

impl From<Resolution> for WindowSize {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::P480 => WindowSize::Size480,
            Resolution::P720 => WindowSize::Size720,
            Resolution::P1080 => WindowSize::Size1080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LensArg {
    Wide,
    Linear,
    Superview,
}

impl From<LensArg> for Lens {
    fn from(lens: LensArg) -> Self {
        match lens {
            LensArg::Wide => Lens::Wide,
            LensArg::Linear => Lens::Linear,
            LensArg::Superview => Lens::Superview,
        }
    }
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            settle_delay: Duration::from_secs(self.settle_secs),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
        }
    }

    pub fn live_stream_request(&self) -> RequestSetLiveStreamMode {
        RequestSetLiveStreamMode {
            encode: Some(self.record),
            window_size: self.resolution.map(|r| WindowSize::from(r) as i32),
            lens: self.lens.map(|l| Lens::from(l) as i32),
            minimum_bitrate: self.min_bitrate,
            maximum_bitrate: self.max_bitrate,
            starting_bitrate: self.starting_bitrate,
            ..RequestSetLiveStreamMode::new(self.serveraddr.as_str())
        }
    }
}
