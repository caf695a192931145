//! Async client for the Avion mesh hub's HTTP + SSE API.
//!
//! Two surfaces:
//!
//! - **[`HubClient`]** — fire-and-forget command POSTs (`/api/*`).
//!   Responses only acknowledge that an operation started; the
//!   resulting state change arrives through the push channel.
//! - **[`EventStreamHandle`]** — the push channel: an auto-reconnecting
//!   SSE consumer that broadcasts typed [`MeshEvent`]s. Each
//!   (re)connection is announced with [`PushMessage::Connected`] so
//!   consumers can discard their stale mirror and await the full
//!   resync burst the hub sends to every new session.
//!
//! `meshly-core` builds the reactive data layer on top of both.

pub mod client;
pub mod error;
pub mod events;
pub mod sse;

pub use client::{BackupPayload, HubClient, validate_passphrase};
pub use error::{ApiError, HubErrorCode};
pub use events::{
    ClaimResultPayload, DeviceRecord, DiscoveredDevice, ExaminePayload, GroupRecord,
    ImportResultPayload, MeshEvent, MetaPayload, StatePayload,
};
pub use sse::{EventStreamHandle, PushMessage, ReconnectConfig, SseFrame, SseParser};
