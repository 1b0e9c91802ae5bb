// Request/response interception
//
// Every hub call passes through an `Interceptor` twice: once to decorate
// the outbound request, once more if the call fails. The session layer
// plugs its bearer-token handling in here; the transport never reads
// credentials itself.

use crate::error::Error;

/// Hook invoked around every hub request issued by [`HubClient`](crate::HubClient).
pub trait Interceptor: Send + Sync {
    /// Decorate an outbound request (e.g. attach an `Authorization` header).
    ///
    /// Must not block; called synchronously right before `send()`.
    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
    }

    /// Observe a failed call before the error reaches the caller.
    ///
    /// Invoked exactly once per failed call. The error is always
    /// propagated afterwards -- interceptors cannot swallow failures.
    fn response_error(&self, _error: &Error) {}
}

/// Interceptor that leaves requests untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {}
