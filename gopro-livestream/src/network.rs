use std::fmt;

use tracing::info;

use crate::proto::RequestConnectNew;
use crate::{Controller, Error, Exchange, Transport};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Puts the camera on a WiFi network in station mode.
#[async_trait::async_trait]
pub trait AccessPoint: Send + Sync {
    async fn join<T: Transport + ?Sized>(
        &self,
        controller: &Controller<T>,
        credentials: &Credentials,
    ) -> Result<(), Error>;
}

/// Provisions a network the camera has not joined before.
#[derive(Debug, Default, Clone, Copy)]
pub struct StationMode;

#[async_trait::async_trait]
impl AccessPoint for StationMode {
    async fn join<T: Transport + ?Sized>(
        &self,
        controller: &Controller<T>,
        credentials: &Credentials,
    ) -> Result<(), Error> {
        info!(ssid = %credentials.ssid, "joining access point");

        let request = RequestConnectNew {
            ssid: credentials.ssid.clone(),
            password: credentials.password.clone(),
            bypass_eula_check: None,
        };
        controller.exchange(&Exchange::connect_new(&request)).await?;
        Ok(())
    }
}
