// Hub HTTP client
//
// Wraps `reqwest::Client` with hub URL construction, status mapping, and
// the interceptor hooks. Endpoint groups (devices, services, session) are
// implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::interceptor::{Interceptor, NoopInterceptor};
use crate::transport::TransportConfig;

/// Raw HTTP client for the hub REST surface.
///
/// Cheap to clone. Every request goes through the configured
/// [`Interceptor`]; a 401 surfaces as [`Error::Unauthorized`] after the
/// interceptor has observed it.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
    interceptor: Arc<dyn Interceptor>,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HubClient {
    /// Create a new hub client from a `TransportConfig`.
    ///
    /// `base_url` is the hub API root, e.g. `https://hub.local/api/`.
    /// A missing trailing slash is added so relative endpoints resolve
    /// beneath it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a hub client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            interceptor: Arc::new(NoopInterceptor),
        }
    }

    /// Parse `base_url` and wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let url = Url::parse(base_url)?;
        Ok(Self::with_client(http, url))
    }

    /// Install the interceptor that decorates requests and observes failures.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// The hub API root.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client (for flows that bypass the interceptor).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build an endpoint URL from path segments below the API root.
    ///
    /// Segments are percent-encoded individually, so device ids and
    /// service names can never escape their position in the path.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an intercepted request and decode the JSON body.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let result = match self.dispatch(request).await {
            Ok(body) => decode(&body),
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    /// Send an intercepted request, discarding the body.
    pub(crate) async fn call_unit(&self, request: reqwest::RequestBuilder) -> Result<(), Error> {
        let result = self.dispatch(request).await.map(|_| ());
        self.observe(result)
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<String, Error> {
        let request = self.interceptor.request(request);
        let resp = request.send().await.map_err(Error::Transport)?;
        read_body(resp).await
    }

    fn observe<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(ref e) = result {
            debug!(error = %e, "hub call failed");
            self.interceptor.response_error(e);
        }
        result
    }
}

/// Map the response status, returning the body text on success.
pub(crate) async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> HubClient {
        HubClient::from_reqwest(base, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let c = client("https://hub.local/api");
        assert_eq!(c.base_url().as_str(), "https://hub.local/api/");
    }

    #[test]
    fn endpoint_appends_segments() {
        let c = client("https://hub.local/api/");
        let url = c.endpoint(&["devices", "d1", "services", "led"]).unwrap();
        assert_eq!(url.as_str(), "https://hub.local/api/devices/d1/services/led");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let c = client("https://hub.local/");
        let url = c.endpoint(&["devices", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://hub.local/devices/a%2Fb");
    }

    #[test]
    fn decode_failure_keeps_body() {
        let err = decode::<serde_json::Value>("not json").unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
