use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use tracing::debug;
use uuid::Uuid;

use crate::frame::hex_dump;
use crate::proto::{self, RequestConnectNew, RequestSetLiveStreamMode};
use crate::{
    validate_status, CameraControl, Command, Correlator, Error, ResponseFrame,
    Transport, COMMAND_REQ_CHARACTERISTIC, NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
};

/// One request and the response that has to come back for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub characteristic: Uuid,
    pub command: Command,
    pub response_feature: u8,
    pub response_actions: &'static [u8],
}

impl Exchange {
    pub fn set_shutter(on: bool) -> Self {
        Self {
            characteristic: COMMAND_REQ_CHARACTERISTIC,
            command: Command::new(proto::SET_SHUTTER, proto::SHUTTER_PARAM, [u8::from(on)]),
            response_feature: proto::COMMAND_RESPONSE_FEATURE,
            response_actions: proto::COMMAND_RESPONSE_ACTIONS,
        }
    }

    pub fn set_live_stream_mode(request: &RequestSetLiveStreamMode) -> Self {
        Self {
            characteristic: COMMAND_REQ_CHARACTERISTIC,
            command: Command::new(
                proto::COMMAND_FEATURE,
                proto::SET_LIVE_STREAM_MODE,
                request.encode_to_vec(),
            ),
            response_feature: proto::COMMAND_FEATURE,
            response_actions: proto::SET_LIVE_STREAM_MODE_ACTIONS,
        }
    }

    pub fn connect_new(request: &RequestConnectNew) -> Self {
        Self {
            characteristic: NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
            command: Command::new(
                proto::NETWORK_MANAGEMENT_FEATURE,
                proto::REQUEST_CONNECT_NEW,
                request.encode_to_vec(),
            ),
            response_feature: proto::NETWORK_MANAGEMENT_FEATURE,
            response_actions: proto::CONNECT_NEW_ACTIONS,
        }
    }
}

/// Strictly sequential request/response control over a [`Transport`].
pub struct Controller<T: Transport + ?Sized> {
    correlator: Correlator,
    transport: Arc<T>,
}

impl<T: Transport + ?Sized> Controller<T> {
    /// Takes the transport's notification stream and starts draining it.
    pub async fn new(transport: Arc<T>, response_timeout: Duration) -> Result<Self, Error> {
        let notifications = transport.notifications().await?;

        Ok(Self {
            correlator: Correlator::spawn(notifications, response_timeout),
            transport,
        })
    }

    /// Writes the command, waits for its response and checks the status.
    ///
    /// The response slot is claimed before anything is written, so a call
    /// rejected with [`Error::ConcurrentAwait`] leaves the wire untouched.
    pub async fn exchange(&self, exchange: &Exchange) -> Result<ResponseFrame, Error> {
        let bytes = exchange.command.encode()?;
        let mut slot = self.correlator.slot()?;

        debug!(
            characteristic = %exchange.characteristic,
            bytes = %hex_dump(&bytes),
            "writing"
        );
        self.transport.write(exchange.characteristic, &bytes).await?;

        let frame = slot
            .await_response(exchange.response_feature, exchange.response_actions)
            .await?;
        debug!(
            feature = frame.feature_id,
            action = frame.action_id,
            status = ?frame.status,
            "received response"
        );

        validate_status(&frame)?;
        Ok(frame)
    }
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> CameraControl for Controller<T> {
    async fn set_shutter(&mut self, on: bool) -> Result<(), crate::Error> {
        self.exchange(&Exchange::set_shutter(on)).await?;
        Ok(())
    }

    async fn set_live_stream_mode(
        &mut self,
        request: RequestSetLiveStreamMode,
    ) -> Result<(), crate::Error> {
        self.exchange(&Exchange::set_live_stream_mode(&request)).await?;
        Ok(())
    }
}
