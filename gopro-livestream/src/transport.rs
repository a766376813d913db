use std::pin::Pin;

use tokio_stream::Stream;
use uuid::Uuid;

/// Raw notification values, in arrival order.
pub type Notifications = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A connected camera link: characteristic writes out, notification chunks in.
///
/// [`crate::BluetoothCamera`] is the real thing; anything that can move bytes
/// the same way can stand in for it.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Writes `bytes` to the characteristic and waits for the acknowledgment.
    async fn write(&self, characteristic: Uuid, bytes: &[u8]) -> Result<(), crate::Error>;

    /// The inbound chunk stream. Only meant to be taken once per connection.
    async fn notifications(&self) -> Result<Notifications, crate::Error>;

    async fn disconnect(&self) -> Result<(), crate::Error>;
}
