// Device directory endpoint
//
// Lists devices by class. Hub order is preserved as returned.

use tracing::debug;

use crate::client::HubClient;
use crate::error::Error;
use crate::models::{Device, DeviceQuery};

impl HubClient {
    /// List every device visible to the session that matches `query`.
    ///
    /// `GET devices?class={class}`
    pub async fn list_devices(&self, query: &DeviceQuery) -> Result<Vec<Device>, Error> {
        let url = self.endpoint(&["devices"])?;
        debug!(class = %query.class, "listing devices");
        self.call(self.http().get(url).query(query)).await
    }
}
