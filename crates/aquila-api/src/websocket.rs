//! Push channels with auto-reconnect.
//!
//! The hub exposes two real-time channels: one for device notifications and
//! one for serial traffic. Their framing is opaque to this client -- each
//! text frame becomes a [`PushNotification`] carrying the decoded JSON (or
//! the raw text) and is fanned out through a [`tokio::sync::broadcast`]
//! channel. Reconnection uses exponential backoff with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use aquila_api::websocket::{PushChannel, PushHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("wss://hub.local/device")?;
//!
//! let handle = PushHandle::connect(PushChannel::Device, url, ReconnectConfig::default(), cancel, || None);
//! let mut rx = handle.subscribe();
//!
//! while let Ok(note) = rx.recv().await {
//!     println!("{}: {:?}", note.channel, note.event);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

// ── PushChannel ──────────────────────────────────────────────────────

/// The named real-time channels a hub offers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PushChannel {
    /// Device-oriented notifications.
    Device,
    /// Serial-port traffic relayed by the hub.
    Serial,
}

// ── PushNotification ─────────────────────────────────────────────────

/// One out-of-band notification received on a push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    /// Channel the notification arrived on.
    pub channel: PushChannel,

    /// Event name, when the frame carries one (`event`, `name`, or `type`).
    pub event: Option<String>,

    /// Decoded payload. Non-JSON frames are kept as a JSON string.
    pub payload: serde_json::Value,
}

// ── Reconnect schedule ───────────────────────────────────────────────

/// Reconnect schedule for a push channel. Delays double per failed
/// attempt up to `max_delay`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    /// 1s doubling to a 5s ceiling, retrying forever.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push channel.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct PushHandle {
    channel: PushChannel,
    notification_rx: broadcast::Receiver<Arc<PushNotification>>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Spawn the connection loop for `channel` at `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. `token` is called before every connection attempt; a
    /// returned token is sent as a bearer `Authorization` header on the
    /// upgrade request.
    pub fn connect<F>(
        channel: PushChannel,
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        token: F,
    ) -> Self
    where
        F: Fn() -> Option<SecretString> + Send + Sync + 'static,
    {
        let (notification_tx, notification_rx) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            push_loop(channel, url, notification_tx, reconnect, task_cancel, token).await;
        });

        Self {
            channel,
            notification_rx,
            cancel,
        }
    }

    /// Which channel this handle is attached to.
    pub fn channel(&self) -> PushChannel {
        self.channel
    }

    /// Get a new receiver for the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushNotification>> {
        self.notification_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

async fn push_loop<F>(
    channel: PushChannel,
    url: Url,
    notification_tx: broadcast::Sender<Arc<PushNotification>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    token: F,
) where
    F: Fn() -> Option<SecretString>,
{
    let mut attempt: u32 = 0;

    loop {
        // Re-read per attempt so a logout or a refreshed login is honored.
        let bearer = token();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(channel, &url, &notification_tx, &cancel, bearer.as_ref()) => {
                match result {
                    Ok(()) => {
                        tracing::info!(%channel, "push channel disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(%channel, error = %e, attempt, "push channel error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    %channel,
                                    max_retries = max,
                                    "push channel reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::debug!(
                            %channel,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!(%channel, "push loop exiting");
}

async fn connect_and_read(
    channel: PushChannel,
    url: &Url,
    notification_tx: &broadcast::Sender<Arc<PushNotification>>,
    cancel: &CancellationToken,
    token: Option<&SecretString>,
) -> Result<(), Error> {
    tracing::info!(%channel, url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = token {
        request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!(%channel, "push channel connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let _ = notification_tx.send(Arc::new(parse_frame(channel, &text)));
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(%channel, code = %cf.code, reason = %cf.reason, "close frame received");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => return Ok(()),
                    // Binary, Ping, Pong, Frame
                    _ => {}
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(alias = "name", alias = "type")]
    event: Option<String>,
}

/// Turn a text frame into a notification. Never fails: frames that are not
/// JSON are carried verbatim as a string payload.
fn parse_frame(channel: PushChannel, text: &str) -> PushNotification {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(payload) => {
            let event = serde_json::from_value::<Named>(payload.clone())
                .ok()
                .and_then(|n| n.event);
            PushNotification {
                channel,
                event,
                payload,
            }
        }
        Err(_) => PushNotification {
            channel,
            event: None,
            payload: serde_json::Value::String(text.to_owned()),
        },
    }
}

/// Doubling delay with deterministic ±25% jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_names() {
        assert_eq!(PushChannel::Device.to_string(), "device");
        assert_eq!("serial".parse::<PushChannel>().unwrap(), PushChannel::Serial);
    }

    #[test]
    fn reconnect_defaults_retry_forever() {
        let cfg = ReconnectConfig::default();
        assert_eq!(cfg.max_delay, Duration::from_secs(5));
        assert_eq!(cfg.max_retries, None);
    }

    #[test]
    fn backoff_grows_then_plateaus() {
        let cfg = ReconnectConfig::default();
        let delays: Vec<_> = (0..3).map(|n| calculate_backoff(n, &cfg)).collect();
        assert!(delays[0] < delays[1] && delays[1] < delays[2], "{delays:?}");

        let ceiling = cfg.max_delay.mul_f64(1.25);
        assert!(calculate_backoff(40, &cfg) <= ceiling);
    }

    #[test]
    fn json_frame_with_event_name() {
        let note = parse_frame(
            PushChannel::Device,
            r#"{"event": "device:update", "id": "d1", "isOn": true}"#,
        );
        assert_eq!(note.channel, PushChannel::Device);
        assert_eq!(note.event.as_deref(), Some("device:update"));
        assert_eq!(note.payload["id"], "d1");
    }

    #[test]
    fn json_frame_with_name_alias() {
        let note = parse_frame(PushChannel::Serial, r#"{"name": "data", "args": [1]}"#);
        assert_eq!(note.event.as_deref(), Some("data"));
    }

    #[test]
    fn plain_text_frame_is_kept_verbatim() {
        let note = parse_frame(PushChannel::Serial, "AT+OK");
        assert!(note.event.is_none());
        assert_eq!(note.payload, serde_json::Value::String("AT+OK".into()));
    }

    #[tokio::test]
    async fn shutdown_stops_a_handle_that_never_connects() {
        let cancel = CancellationToken::new();
        let url = Url::parse("ws://127.0.0.1:9/device").unwrap();
        let handle = PushHandle::connect(
            PushChannel::Device,
            url,
            ReconnectConfig {
                max_retries: Some(0),
                ..ReconnectConfig::default()
            },
            cancel.clone(),
            || None,
        );
        handle.shutdown();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn token_is_read_before_every_attempt() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Free port with nothing listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/device")).unwrap();

        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let _handle = PushHandle::connect(
            PushChannel::Device,
            url,
            ReconnectConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                max_retries: Some(2),
            },
            CancellationToken::new(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(SecretString::from("t0k"))
            },
        );

        // One initial attempt plus two retries.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while reads.load(Ordering::SeqCst) < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }
}
