// ── Device directory ──
//
// Lists hub devices of a class. The sync loop binds to the first entry,
// so implementations must preserve the order the hub reports.

use std::future::Future;

use aquila_api::{Device, DeviceQuery, HubClient};

use crate::error::CoreError;

/// Source of device listings.
pub trait DeviceDirectory: Send + Sync + 'static {
    /// All devices matching `query`, in hub order. An empty list is a
    /// valid answer.
    fn all(&self, query: &DeviceQuery)
    -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;
}

impl DeviceDirectory for HubClient {
    async fn all(&self, query: &DeviceQuery) -> Result<Vec<Device>, CoreError> {
        Ok(self.list_devices(query).await?)
    }
}
