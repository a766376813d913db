//! Matching inbound frames to the one request in flight.
//!
//! A pump task drains the notification stream for the whole life of the
//! connection and queues decoded frames. Callers pull the next frame with
//! [`Correlator::await_response`]; the receiving end is a single slot, so a
//! second caller arriving while one is waiting is rejected instead of queued.

use std::time::Duration;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{trace, warn, Instrument};

use crate::{Error, FrameDecoder, Notifications, ResponseFrame, Status};

pub struct Correlator {
    frames: Mutex<mpsc::UnboundedReceiver<Result<ResponseFrame, Error>>>,
    pump: JoinHandle<()>,
    response_timeout: Duration,
}

impl Correlator {
    /// Starts draining `notifications` on the current runtime.
    pub fn spawn(notifications: Notifications, response_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pump = tokio::task::spawn(pump(notifications, sender).in_current_span());

        Self {
            frames: Mutex::new(receiver),
            pump,
            response_timeout,
        }
    }

    /// Claims the single response slot for one exchange.
    ///
    /// Take it before writing the request so a rejected caller never puts a
    /// command on the wire.
    pub fn slot(&self) -> Result<ResponseSlot<'_>, Error> {
        let frames = self.frames.try_lock().map_err(|_| Error::ConcurrentAwait)?;

        Ok(ResponseSlot {
            frames,
            response_timeout: self.response_timeout,
        })
    }

    /// Claims the slot and waits on it, see [`ResponseSlot::await_response`].
    pub async fn await_response(
        &self,
        expected_feature: u8,
        expected_actions: &[u8],
    ) -> Result<ResponseFrame, Error> {
        self.slot()?
            .await_response(expected_feature, expected_actions)
            .await
    }
}

/// Exclusive access to the next inbound frame, held for one exchange.
pub struct ResponseSlot<'a> {
    frames: MutexGuard<'a, mpsc::UnboundedReceiver<Result<ResponseFrame, Error>>>,
    response_timeout: Duration,
}

impl ResponseSlot<'_> {
    /// Waits for the next frame and checks it belongs to the exchange.
    ///
    /// `expected_actions` has to list every action id the camera may answer
    /// with, including its initial acknowledgment. Anything else on the
    /// expected feature, or any other feature, is a protocol violation.
    pub async fn await_response(
        &mut self,
        expected_feature: u8,
        expected_actions: &[u8],
    ) -> Result<ResponseFrame, Error> {
        let frame = match tokio::time::timeout(self.response_timeout, self.frames.recv()).await {
            Err(_) => {
                return Err(Error::Timeout {
                    after: self.response_timeout,
                })
            }
            Ok(None) => return Err(Error::NotificationsClosed),
            Ok(Some(frame)) => frame?,
        };

        if frame.feature_id != expected_feature || !expected_actions.contains(&frame.action_id) {
            return Err(Error::ProtocolViolation {
                expected_feature,
                expected_actions: expected_actions.to_vec(),
                feature_id: frame.feature_id,
                action_id: frame.action_id,
            });
        }

        Ok(frame)
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Surfaces a non-success status as [`Error::Status`].
pub fn validate_status(frame: &ResponseFrame) -> Result<(), Error> {
    match frame.status {
        Status::Success => Ok(()),
        Status::Error(code) => Err(Error::Status(code)),
    }
}

async fn pump(
    mut notifications: Notifications,
    frames: mpsc::UnboundedSender<Result<ResponseFrame, Error>>,
) {
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = notifications.next().await {
        trace!(len = chunk.len(), "notification");

        for frame in decoder.feed(&chunk) {
            if let Err(err) = &frame {
                warn!(%err, "undecodable frame");
            }
            if frames.send(frame).is_err() {
                return;
            }
        }
    }

    if decoder.buffered() > 0 {
        warn!(
            buffered = decoder.buffered(),
            "notification stream ended mid-frame"
        );
    }
}
