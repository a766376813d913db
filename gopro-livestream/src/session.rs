//! Sequencing a camera from connected to livestreaming.
//!
//! ```text
//! Connected -> NetworkJoined -> StreamConfigured -> Settling -> Streaming -> Stopped
//!     \______________\_________________\_______________\____________\_____> Failed
//! ```
//!
//! Any failed step disconnects and leaves the session `Failed`; nothing is
//! retried.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn, Instrument};

use crate::proto::RequestSetLiveStreamMode;
use crate::{AccessPoint, CameraControl, Controller, Credentials, Error, SessionConfig, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    NetworkJoined,
    StreamConfigured,
    /// Fixed pause while the camera applies the livestream configuration.
    Settling,
    Streaming,
    Stopped,
    Failed,
}

/// Disconnects exactly once, whichever way the session ends.
struct DisconnectGuard<T: Transport + 'static> {
    transport: Option<Arc<T>>,
}

impl<T: Transport + 'static> DisconnectGuard<T> {
    async fn release(&mut self) -> Result<(), Error> {
        match self.transport.take() {
            Some(transport) => transport.disconnect().await,
            None => Ok(()),
        }
    }
}

impl<T: Transport + 'static> Drop for DisconnectGuard<T> {
    fn drop(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("session dropped outside a runtime, cannot disconnect");
            return;
        };

        warn!("session dropped while connected, disconnecting");
        runtime.spawn(
            async move {
                if let Err(err) = transport.disconnect().await {
                    warn!(%err, "disconnect failed");
                }
            }
            .in_current_span(),
        );
    }
}

pub struct LivestreamSession<T: Transport + 'static> {
    controller: Controller<T>,
    state: SessionState,
    config: SessionConfig,
    guard: DisconnectGuard<T>,
}

impl<T: Transport + 'static> LivestreamSession<T> {
    /// Takes over a transport that is already connected to the camera.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self, Error> {
        let transport = Arc::new(transport);
        let mut guard = DisconnectGuard {
            transport: Some(transport.clone()),
        };

        let controller = match Controller::new(transport, config.response_timeout).await {
            Ok(controller) => controller,
            Err(err) => {
                if let Err(err) = guard.release().await {
                    warn!(%err, "disconnect failed");
                }
                return Err(err);
            }
        };

        info!(state = ?SessionState::Connected, "session opened");
        Ok(Self {
            controller,
            state: SessionState::Connected,
            config,
            guard,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Joins the network, configures the livestream and sets the shutter.
    pub async fn start<A: AccessPoint>(
        &mut self,
        access_point: &A,
        credentials: &Credentials,
        request: &RequestSetLiveStreamMode,
    ) -> Result<(), Error> {
        self.require_state(SessionState::Connected, "start streaming")?;

        let result = self.advance(access_point, credentials, request).await;
        if let Err(err) = &result {
            self.fail(err).await;
        }
        result
    }

    async fn advance<A: AccessPoint>(
        &mut self,
        access_point: &A,
        credentials: &Credentials,
        request: &RequestSetLiveStreamMode,
    ) -> Result<(), Error> {
        access_point.join(&self.controller, credentials).await?;
        self.transition(SessionState::NetworkJoined);

        info!(url = request.url(), "setting live stream mode");
        self.controller.set_live_stream_mode(request.clone()).await?;
        self.transition(SessionState::StreamConfigured);

        // TODO: poll livestream status (feature 0xF5, action 0x74) until the
        // camera reports ready instead of sleeping a fixed delay.
        self.transition(SessionState::Settling);
        tokio::time::sleep(self.config.settle_delay).await;

        info!("setting the shutter on");
        self.controller.set_shutter(true).await?;
        self.transition(SessionState::Streaming);
        Ok(())
    }

    /// Unsets the shutter, ending the livestream.
    pub async fn stop(&mut self) -> Result<(), Error> {
        self.require_state(SessionState::Streaming, "stop streaming")?;

        info!("setting the shutter off");
        match self.controller.set_shutter(false).await {
            Ok(()) => {
                self.transition(SessionState::Stopped);
                Ok(())
            }
            Err(err) => {
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Disconnects unless a failure already did.
    pub async fn close(&mut self) -> Result<(), Error> {
        let released = self.guard.release().await;
        if !matches!(self.state, SessionState::Stopped | SessionState::Failed) {
            self.transition(SessionState::Disconnected);
        }
        released
    }

    fn require_state(&self, state: SessionState, action: &'static str) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        info!(from = ?self.state, to = ?to, "state change");
        self.state = to;
    }

    async fn fail(&mut self, err: &Error) {
        error!(%err, from = ?self.state, "session failed");
        self.state = SessionState::Failed;

        if let Err(err) = self.guard.release().await {
            warn!(%err, "disconnect after failure failed");
        }
    }
}

/// Runs one complete livestream: start, stream until `shutdown` resolves,
/// stop.
///
/// `shutdown` is raced against the start sequence. Resolving it before the
/// camera is streaming abandons the start with [`Error::Cancelled`]. The
/// transport is disconnected inline on every path out of here.
pub async fn run_livestream<T, A, F>(
    transport: T,
    config: SessionConfig,
    access_point: &A,
    credentials: &Credentials,
    request: &RequestSetLiveStreamMode,
    shutdown: F,
) -> Result<(), Error>
where
    T: Transport + 'static,
    A: AccessPoint,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut session = LivestreamSession::open(transport, config).await?;

    let started = tokio::select! {
        started = session.start(access_point, credentials, request) => started,
        () = &mut shutdown => {
            warn!(state = ?session.state(), "cancelled before streaming");
            Err(Error::Cancelled)
        }
    };

    let outcome = match started {
        Ok(()) => {
            info!("streaming");
            shutdown.await;
            session.stop().await
        }
        Err(err) => Err(err),
    };

    let closed = session.close().await;
    outcome.and(closed)
}
