mod ble;
mod config;
mod controller;
mod correlator;
mod frame;
mod network;
pub mod proto;
mod session;
mod transport;

use std::time::Duration;

pub use ble::*;
pub use config::*;
pub use controller::*;
pub use correlator::*;
pub use frame::*;
pub use network::*;
pub use session::*;
pub use transport::*;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Bluetooth(#[from] btleplug::Error),

    #[error("frame of {len} bytes does not fit the single-byte length prefix")]
    Encoding { len: usize },

    #[error("frame of {len} bytes is too short to carry feature, action and status")]
    MalformedFrame { len: usize },

    #[error(
        "expected feature {expected_feature:#04x} with action in {expected_actions:02x?}, \
         got feature {feature_id:#04x} action {action_id:#04x}"
    )]
    ProtocolViolation {
        expected_feature: u8,
        expected_actions: Vec<u8>,
        feature_id: u8,
        action_id: u8,
    },

    #[error("camera reported error status {0:#04x}")]
    Status(u8),

    #[error("another response is already being awaited on this connection")]
    ConcurrentAwait,

    #[error("cannot {action} while {state:?}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },

    #[error("no response within {after:?}")]
    Timeout { after: Duration },

    #[error("cancelled before streaming started")]
    Cancelled,

    #[error("notification stream closed")]
    NotificationsClosed,

    #[error("no GoPro found while scanning")]
    CameraNotFound,

    #[error("no bluetooth adapter available")]
    NoAdapter,

    #[error("characteristic {0} not found on camera")]
    MissingCharacteristic(uuid::Uuid),
}

#[async_trait::async_trait]
pub trait CameraControl: private::Sealed {
    async fn set_shutter(&mut self, on: bool) -> Result<(), crate::Error>;

    async fn set_live_stream_mode(
        &mut self,
        request: proto::RequestSetLiveStreamMode,
    ) -> Result<(), crate::Error>;
}

mod private {
    pub trait Sealed {}

    impl<T: crate::Transport + ?Sized> Sealed for crate::Controller<T> {}
}
