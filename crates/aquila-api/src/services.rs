// Device service endpoints
//
// A service is a named sub-resource of a device (e.g. "led") exposing a
// small state object.

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::client::HubClient;
use crate::error::Error;
use crate::models::{ServicePatch, ServiceState};
use crate::transport::JSON_CONTENT_TYPE;

impl HubClient {
    /// Read the current state of a device service.
    ///
    /// `GET devices/{id}/services/{name}`
    pub async fn read_service(&self, device_id: &str, service: &str) -> Result<ServiceState, Error> {
        let url = self.endpoint(&["devices", device_id, "services", service])?;
        debug!(device_id, service, "reading service state");
        self.call(self.http().get(url)).await
    }

    /// Merge `patch` into a device service and return the resulting state.
    ///
    /// `PUT devices/{id}/services/{name}`. The hub may coerce or reject
    /// requested values; the returned state is authoritative.
    pub async fn write_service(
        &self,
        device_id: &str,
        service: &str,
        patch: &ServicePatch,
    ) -> Result<ServiceState, Error> {
        let url = self.endpoint(&["devices", device_id, "services", service])?;
        debug!(device_id, service, ?patch, "writing service state");
        // `json()` only sets a bare content type when none is present
        let request = self
            .http()
            .put(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(patch);
        self.call(request).await
    }
}
