use std::time::Duration;

use btleplug::api::{
    bleuuid::uuid_from_u16, Central as _, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::{uuid, Uuid};

use crate::{Error, Notifications, Transport};

// See https://gopro.github.io/OpenGoPro/ble/protocol/ble_setup.html#ble-characteristics for these.
pub const COMMAND_REQ_CHARACTERISTIC: Uuid = uuid!("b5f90072-aa8d-11e3-9046-0002a5d5c51b");
pub const COMMAND_RESP_CHARACTERISTIC: Uuid = uuid!("b5f90073-aa8d-11e3-9046-0002a5d5c51b");
pub const NETWORK_MANAGEMENT_REQ_CHARACTERISTIC: Uuid =
    uuid!("b5f90091-aa8d-11e3-9046-0002a5d5c51b");
pub const NETWORK_MANAGEMENT_RESP_CHARACTERISTIC: Uuid =
    uuid!("b5f90092-aa8d-11e3-9046-0002a5d5c51b");

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

lazy_static::lazy_static! {
    static ref CONTROL_QUERY_SERVICE: Uuid = uuid_from_u16(0xFEA6);

    pub static ref GOPRO_SCANFILTER: ScanFilter = ScanFilter {
        services: Vec::from([*CONTROL_QUERY_SERVICE]),
    };
}

/// Scans the first adapter for a GoPro.
///
/// With an `identifier` (the last four digits of the serial number, which
/// also end the camera's advertised name) only that camera is accepted;
/// otherwise the first one seen wins.
pub async fn discover(
    identifier: Option<&str>,
    scan_timeout: Duration,
) -> Result<Peripheral, Error> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(Error::NoAdapter)?;

    info!(identifier = identifier.unwrap_or("any"), "scanning for camera");
    central.start_scan(GOPRO_SCANFILTER.clone()).await?;

    let found = tokio::time::timeout(scan_timeout, scan(&central, identifier)).await;

    central.stop_scan().await?;
    found.map_err(|_| Error::CameraNotFound)?
}

async fn scan(central: &Adapter, identifier: Option<&str>) -> Result<Peripheral, Error> {
    loop {
        for peripheral in central.peripherals().await? {
            let name = peripheral
                .properties()
                .await?
                .and_then(|properties| properties.local_name);

            if let Some(name) = name {
                if is_match(&name, identifier) {
                    info!(%name, "found camera");
                    return Ok(peripheral);
                }
                debug!(%name, "skipping peripheral");
            }
        }
        tokio::time::sleep(SCAN_POLL_INTERVAL).await;
    }
}

fn is_match(name: &str, identifier: Option<&str>) -> bool {
    name.starts_with("GoPro") && identifier.map_or(true, |id| name.ends_with(id))
}

pub struct BluetoothCamera {
    remote: Peripheral,
}

impl BluetoothCamera {
    /// Connects, discovers services and subscribes to the response
    /// characteristics.
    pub async fn connect(p: Peripheral) -> Result<Self, Error> {
        if !p.is_connected().await? {
            p.connect().await?;
        }

        let camera = Self { remote: p };
        if let Err(err) = camera.subscribe().await {
            if let Err(err) = camera.disconnect().await {
                warn!(%err, "disconnect after failed setup failed");
            }
            return Err(err);
        }

        info!("connected");
        Ok(camera)
    }

    async fn subscribe(&self) -> Result<(), Error> {
        self.remote.discover_services().await?;

        for uuid in [
            COMMAND_RESP_CHARACTERISTIC,
            NETWORK_MANAGEMENT_RESP_CHARACTERISTIC,
        ] {
            let c = self.characteristic(uuid)?;
            self.remote.subscribe(&c).await?;
        }
        Ok(())
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, Error> {
        self.remote
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(Error::MissingCharacteristic(uuid))
    }
}

#[async_trait::async_trait]
impl Transport for BluetoothCamera {
    async fn write(&self, characteristic: Uuid, bytes: &[u8]) -> Result<(), Error> {
        let c = self.characteristic(characteristic)?;
        self.remote.write(&c, bytes, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<Notifications, Error> {
        let stream = self.remote.notifications().await?;

        let values = stream.filter_map(|msg| match msg.uuid {
            c if c == COMMAND_RESP_CHARACTERISTIC => Some(msg.value),
            c if c == NETWORK_MANAGEMENT_RESP_CHARACTERISTIC => Some(msg.value),
            other => {
                warn!(uuid = %other, "notification on unexpected characteristic");
                None
            }
        });

        Ok(Box::pin(values))
    }

    async fn disconnect(&self) -> Result<(), Error> {
        if self.remote.is_connected().await? {
            self.remote.disconnect().await?;
            info!("disconnected");
        }
        Ok(())
    }
}
