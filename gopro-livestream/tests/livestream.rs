use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gopro_livestream::proto::RequestSetLiveStreamMode;
use gopro_livestream::{
    run_livestream, AccessPoint, Controller, Credentials, Error, LivestreamSession,
    Notifications, SessionConfig, SessionState, StationMode, Transport,
    COMMAND_REQ_CHARACTERISTIC, NETWORK_MANAGEMENT_REQ_CHARACTERISTIC,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// What the camera sees and how many times it was let go.
#[derive(Default)]
struct Log {
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    disconnects: AtomicUsize,
}

impl Log {
    fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// Answers every write with the next scripted batch of notification chunks.
struct ScriptedCamera {
    log: Arc<Log>,
    replies: Mutex<VecDeque<Vec<Vec<u8>>>>,
    chunks: mpsc::UnboundedSender<Vec<u8>>,
    notifications: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl ScriptedCamera {
    fn new(replies: Vec<Vec<Vec<u8>>>) -> (Self, Arc<Log>) {
        let log = Arc::new(Log::default());
        let (chunks, notifications) = mpsc::unbounded_channel();
        let camera = Self {
            log: log.clone(),
            replies: Mutex::new(replies.into()),
            chunks,
            notifications: Mutex::new(Some(notifications)),
        };
        (camera, log)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedCamera {
    async fn write(&self, characteristic: Uuid, bytes: &[u8]) -> Result<(), Error> {
        self.log
            .writes
            .lock()
            .unwrap()
            .push((characteristic, bytes.to_vec()));

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        for chunk in reply {
            let _ = self.chunks.send(chunk);
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<Notifications, Error> {
        let receiver = self
            .notifications
            .lock()
            .unwrap()
            .take()
            .expect("notifications taken twice");
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The network is joined outside of the scripted exchanges.
struct AlreadyJoined;

#[async_trait::async_trait]
impl AccessPoint for AlreadyJoined {
    async fn join<T: Transport + ?Sized>(
        &self,
        _controller: &Controller<T>,
        _credentials: &Credentials,
    ) -> Result<(), Error> {
        Ok(())
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        response_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

fn credentials() -> Credentials {
    Credentials {
        ssid: "home".into(),
        password: "secret".into(),
    }
}

fn request() -> RequestSetLiveStreamMode {
    RequestSetLiveStreamMode::new("rtmp://127.0.0.1/live/EXAMPLE")
}

const CONFIGURED: [u8; 4] = [0x03, 0xF1, 0xF9, 0x00];
const SHUTTER_SET: [u8; 4] = [0x03, 0x72, 0x73, 0x00];

#[tokio::test]
async fn configure_then_shutter_reaches_streaming() {
    let (camera, log) =
        ScriptedCamera::new(vec![vec![CONFIGURED.to_vec()], vec![SHUTTER_SET.to_vec()]]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session
        .start(&AlreadyJoined, &credentials(), &request())
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Streaming);

    let writes = log.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].0, COMMAND_REQ_CHARACTERISTIC);
    assert_eq!(&writes[0].1[1..3], &[0xF1, 0x79]);
    assert_eq!(writes[1], (COMMAND_REQ_CHARACTERISTIC, vec![3, 1, 1, 1]));
    assert_eq!(log.disconnects(), 0);

    session.close().await.unwrap();
    assert_eq!(log.disconnects(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn fragmented_responses_are_reassembled() {
    let (camera, log) = ScriptedCamera::new(vec![
        vec![vec![0x03], vec![0xF1, 0xF9], vec![0x00]],
        vec![vec![0x04, 0x72, 0x73], vec![0x00, 0x01]],
    ]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    session
        .start(&AlreadyJoined, &credentials(), &request())
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(log.writes().len(), 2);
}

#[tokio::test]
async fn unexpected_action_fails_and_disconnects() {
    let (camera, log) = ScriptedCamera::new(vec![vec![vec![0x03, 0xF1, 0x00, 0x00]]]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    let result = session.start(&AlreadyJoined, &credentials(), &request()).await;

    assert!(matches!(
        result,
        Err(Error::ProtocolViolation {
            feature_id: 0xF1,
            action_id: 0x00,
            ..
        })
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(log.writes().len(), 1, "no shutter after a failed configure");
    assert_eq!(log.disconnects(), 1);

    session.close().await.unwrap();
    assert_eq!(log.disconnects(), 1);
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn error_status_on_shutter_fails_the_session() {
    let (camera, log) = ScriptedCamera::new(vec![
        vec![CONFIGURED.to_vec()],
        vec![vec![0x03, 0x72, 0x73, 0x02]],
    ]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    let result = session.start(&AlreadyJoined, &credentials(), &request()).await;

    assert!(matches!(result, Err(Error::Status(0x02))));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(log.writes().len(), 2);
    assert_eq!(log.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_camera_times_out() {
    let (camera, log) = ScriptedCamera::new(vec![]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    let result = session.start(&AlreadyJoined, &credentials(), &request()).await;

    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(log.disconnects(), 1);
}

#[tokio::test]
async fn station_mode_joins_before_configuring() {
    let (camera, log) = ScriptedCamera::new(vec![
        vec![vec![0x03, 0x02, 0x85, 0x00]],
        vec![CONFIGURED.to_vec()],
        vec![SHUTTER_SET.to_vec()],
    ]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    session
        .start(&StationMode, &credentials(), &request())
        .await
        .unwrap();

    let writes = log.writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].0, NETWORK_MANAGEMENT_REQ_CHARACTERISTIC);
    assert_eq!(&writes[0].1[1..3], &[0x02, 0x05]);
    assert_eq!(session.state(), SessionState::Streaming);
}

#[tokio::test]
async fn stop_unsets_the_shutter() {
    let (camera, log) = ScriptedCamera::new(vec![
        vec![CONFIGURED.to_vec()],
        vec![SHUTTER_SET.to_vec()],
        vec![SHUTTER_SET.to_vec()],
    ]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();
    session
        .start(&AlreadyJoined, &credentials(), &request())
        .await
        .unwrap();

    session.stop().await.unwrap();

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(log.writes()[2].1, vec![3, 1, 1, 0]);
}

#[tokio::test]
async fn stop_before_streaming_is_rejected() {
    let (camera, log) = ScriptedCamera::new(vec![]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    let result = session.stop().await;

    assert!(matches!(
        result,
        Err(Error::InvalidState {
            state: SessionState::Connected,
            ..
        })
    ));
    assert!(log.writes().is_empty());
}

#[tokio::test]
async fn full_run_disconnects_once() {
    let (camera, log) = ScriptedCamera::new(vec![
        vec![CONFIGURED.to_vec()],
        vec![SHUTTER_SET.to_vec()],
        vec![SHUTTER_SET.to_vec()],
    ]);

    run_livestream(
        camera,
        config(),
        &AlreadyJoined,
        &credentials(),
        &request(),
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await
    .unwrap();

    assert_eq!(log.writes().len(), 3);
    assert_eq!(log.disconnects(), 1);
}

#[tokio::test]
async fn failed_run_disconnects_once() {
    let (camera, log) = ScriptedCamera::new(vec![vec![vec![0x03, 0xF1, 0xF9, 0x01]]]);

    let result = run_livestream(
        camera,
        config(),
        &AlreadyJoined,
        &credentials(),
        &request(),
        std::future::pending(),
    )
    .await;

    assert!(matches!(result, Err(Error::Status(0x01))));
    assert_eq!(log.disconnects(), 1);
}

#[test]
fn shutdown_before_streaming_disconnects_before_returning() {
    let (camera, log) = ScriptedCamera::new(vec![]);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let result = runtime.block_on(async {
        run_livestream(
            camera,
            config(),
            &AlreadyJoined,
            &credentials(),
            &request(),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
    });
    // Nothing spawned after this point can run.
    drop(runtime);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(log.writes().len(), 1, "configure was on the wire");
    assert_eq!(log.disconnects(), 1);
}

#[tokio::test]
async fn dropped_session_still_disconnects() {
    let (camera, log) = ScriptedCamera::new(vec![]);
    let session = LivestreamSession::open(camera, config()).await.unwrap();

    drop(session);
    for _ in 0..10 {
        if log.disconnects() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(log.disconnects(), 1);
}

#[tokio::test]
async fn cancelled_start_still_disconnects() {
    let (camera, log) = ScriptedCamera::new(vec![]);
    let mut session = LivestreamSession::open(camera, config()).await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        session.start(&AlreadyJoined, &credentials(), &request()),
    )
    .await;
    assert!(cancelled.is_err());

    drop(session);
    for _ in 0..10 {
        if log.disconnects() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(log.disconnects(), 1);
}
