//! SSE push channel with auto-reconnect.
//!
//! Connects to the hub's `/api/events` endpoint and streams parsed
//! [`MeshEvent`]s through a [`tokio::sync::broadcast`] channel. Handles
//! reconnection with exponential backoff + jitter automatically.
//!
//! Every (re)connection emits [`PushMessage::Connected`] before any
//! event: consumers must treat it as "new session" and discard their
//! local mirror, because deltas missed while disconnected are never
//! replayed — the hub re-sends a full sync burst instead.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ApiError;
use crate::events::MeshEvent;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── PushMessage ──────────────────────────────────────────────────────

/// One item from the push channel.
#[derive(Debug, Clone)]
pub enum PushMessage {
    /// The stream (re)connected. The local mirror is now stale.
    Connected,
    /// A parsed hub event.
    Event(MeshEvent),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running SSE event stream.
///
/// Drop all receivers and call [`shutdown`](Self::shutdown) to tear
/// down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<PushMessage>>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the reconnection loop against `events_url`.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. Subscribe to the receiver to start consuming.
    pub fn connect(
        http: reqwest::Client,
        events_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(http, events_url, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the push channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushMessage>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn sse_loop(
    http: reqwest::Client,
    url: Url,
    event_tx: broadcast::Sender<Arc<PushMessage>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &url, &event_tx, &cancel) => {
                match result {
                    // Clean disconnect (stream ended). Reset the attempt
                    // counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("event stream ended cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one SSE connection and read frames until it drops.
async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    event_tx: &broadcast::Sender<Arc<PushMessage>>,
    cancel: &CancellationToken,
) -> Result<(), ApiError> {
    tracing::info!(url = %url, "connecting to event stream");

    let response = http
        .get(url.clone())
        .header("Accept", "text/event-stream")
        .send()
        .await
        .map_err(|e| ApiError::StreamConnect(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ApiError::StreamConnect(format!(
            "HTTP {} from {url}",
            response.status()
        )));
    }

    tracing::info!("event stream connected");
    let _ = event_tx.send(Arc::new(PushMessage::Connected));

    let mut body = response.bytes_stream();
    let mut parser = SseParser::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for frame in parser.push(&bytes) {
                            broadcast_frame(&frame, event_tx);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ApiError::StreamConnect(e.to_string()));
                    }
                    None => {
                        // Server closed the response body.
                        tracing::info!("event stream closed by hub");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Parse one SSE frame into a typed event and broadcast it.
fn broadcast_frame(frame: &SseFrame, event_tx: &broadcast::Sender<Arc<PushMessage>>) {
    match MeshEvent::parse(&frame.event, &frame.data) {
        Ok(Some(event)) => {
            // Ignore send errors -- just means no active subscribers.
            let _ = event_tx.send(Arc::new(PushMessage::Event(event)));
        }
        Ok(None) => {
            tracing::debug!(kind = %frame.event, "skipping unknown event kind");
        }
        Err(e) => {
            tracing::debug!(
                kind = %frame.event,
                error = %e,
                "skipping malformed event payload"
            );
        }
    }
}

// ── SSE framing ──────────────────────────────────────────────────────

/// One complete `event:`/`data:` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `"message"` when the server sent none.
    pub event: String,
    /// Joined data payload (multi-line `data:` fields joined with `\n`).
    pub data: String,
}

/// Incremental SSE parser.
///
/// Feed it raw body chunks; it yields complete frames as they close
/// (blank line). Partial lines are buffered as raw bytes across chunks,
/// so a multi-byte UTF-8 character split by the network decodes intact
/// once its line completes. Comment lines (`:` prefix) and fields other
/// than `event`/`data` are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    line_buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Consume a body chunk, returning any frames completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                let bytes = std::mem::take(&mut self.line_buf);
                let line = String::from_utf8_lossy(&bytes);
                if let Some(frame) = self.take_line(line.trim_end_matches('\r')) {
                    frames.push(frame);
                }
            } else {
                self.line_buf.push(byte);
            }
        }

        frames
    }

    /// Process one complete line. A blank line closes the frame.
    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.data.is_empty() && self.event.is_none() {
                return None;
            }
            let frame = SseFrame {
                event: self.event.take().unwrap_or_else(|| "message".to_owned()),
                data: std::mem::take(&mut self.data).join("\n"),
            };
            return Some(frame);
        }

        if line.starts_with(':') {
            return None; // comment / keep-alive
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            _ => {} // id, retry -- unused by the hub
        }

        None
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple
/// dashboard sessions.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn frames(parser: &mut SseParser, input: &str) -> Vec<SseFrame> {
        parser.push(input.as_bytes())
    }

    #[test]
    fn single_frame() {
        let mut p = SseParser::default();
        let out = frames(&mut p, "event: state\ndata: {\"avion_id\":1,\"brightness\":5}\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, "state");
        assert_eq!(out[0].data, "{\"avion_id\":1,\"brightness\":5}");
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut p = SseParser::default();
        assert!(frames(&mut p, "event: me").is_empty());
        assert!(frames(&mut p, "ta\ndata: {\"ble_st").is_empty());
        let out = frames(&mut p, "ate\":4}\n\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, "meta");
        assert_eq!(out[0].data, "{\"ble_state\":4}");
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let mut p = SseParser::default();
        let full = "event: dev_added\ndata: {\"avion_id\":1,\"name\":\"Entré\"}\n\n";
        let bytes = full.as_bytes();
        // Cut one byte into the two-byte 'é'.
        let mid = full.find('é').unwrap() + 1;

        assert!(p.push(&bytes[..mid]).is_empty());
        let out = p.push(&bytes[mid..]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, "{\"avion_id\":1,\"name\":\"Entré\"}");
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut p = SseParser::default();
        let out = frames(
            &mut p,
            "event: sync_complete\ndata: {}\n\nevent: save_result\ndata: {}\n\n",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event, "sync_complete");
        assert_eq!(out[1].event, "save_result");
    }

    #[test]
    fn crlf_line_endings() {
        let mut p = SseParser::default();
        let out = frames(&mut p, "event: meta\r\ndata: {}\r\n\r\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, "meta");
    }

    #[test]
    fn multi_line_data_joined_with_newline() {
        let mut p = SseParser::default();
        let out = frames(&mut p, "data: one\ndata: two\n\n");
        assert_eq!(out[0].data, "one\ntwo");
        assert_eq!(out[0].event, "message");
    }

    #[test]
    fn comments_and_blank_keepalives_ignored() {
        let mut p = SseParser::default();
        let out = frames(&mut p, ": keep-alive\n\n\n\nevent: meta\ndata: {}\n\n");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        // Each step should roughly double (within jitter bounds)
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }
}
