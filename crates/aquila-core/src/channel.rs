// ── Service channel ──
//
// Reads and writes one named service on one device. A write answers with
// the state the hub actually applied, which may differ from the request.

use std::future::Future;

use aquila_api::{HubClient, ServicePatch, ServiceState};

use crate::error::CoreError;

/// Access to a device's service state.
pub trait ServiceChannel: Send + Sync + 'static {
    fn read(
        &self,
        device_id: &str,
        service: &str,
    ) -> impl Future<Output = Result<ServiceState, CoreError>> + Send;

    /// Send a partial update; resolves to the hub-reported state.
    fn write(
        &self,
        device_id: &str,
        service: &str,
        patch: &ServicePatch,
    ) -> impl Future<Output = Result<ServiceState, CoreError>> + Send;
}

impl ServiceChannel for HubClient {
    async fn read(&self, device_id: &str, service: &str) -> Result<ServiceState, CoreError> {
        Ok(self.read_service(device_id, service).await?)
    }

    async fn write(
        &self,
        device_id: &str,
        service: &str,
        patch: &ServicePatch,
    ) -> Result<ServiceState, CoreError> {
        Ok(self.write_service(device_id, service, patch).await?)
    }
}
