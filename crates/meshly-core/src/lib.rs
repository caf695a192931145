//! Reactive state-sync layer between `meshly-api` and UI consumers.
//!
//! This crate owns the business logic and reactive data infrastructure
//! for the meshly workspace:
//!
//! - **[`Controller`]** — Central facade managing the full lifecycle:
//!   [`connect()`](Controller::connect) opens the hub's push channel and
//!   spawns background tasks (event bridge, command processor);
//!   [`wait_for_sync()`](Controller::wait_for_sync) blocks until the
//!   hub's full-state replay lands.
//!
//! - **[`DataStore`]** — Ordered reactive storage built on
//!   insertion-ordered collections with `tokio::sync::watch` snapshot
//!   channels. All mutations are field-wise merges: a partial update
//!   never erases fields it does not name.
//!
//! - **[`Reconciler`]** / **[`Update`]** — A single dispatch point that
//!   turns every push event into store mutations plus a render effect.
//!   Views react to `Update`s; they never see raw events.
//!
//! - **[`InteractionGuard`]** — Suppresses visual echo writes to
//!   controls the user is actively holding, without losing the data
//!   (the store always takes the echo).
//!
//! - **[`CorrelationTracker`]** — Pairs fire-and-forget scans and
//!   claims with the push events that eventually answer them, and
//!   rejects concurrent operations of the same kind.
//!
//! - **[`Command`]** — Typed mutation requests routed through an
//!   `mpsc` channel to the controller's command processor.

pub mod command;
pub mod config;
pub mod controller;
pub mod correlate;
pub mod error;
pub mod guard;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::HubConfig;
pub use controller::{ConnectionState, Controller, FeedEntry};
pub use correlate::{CorrelationTracker, parse_uuid_hash};
pub use error::CoreError;
pub use guard::{ControlId, ControlKind, ControlTarget, InteractionGuard};
pub use reconcile::{Reconciler, Update};
pub use store::DataStore;
pub use stream::EntityStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BROADCAST_GROUP_ID,
    Device,
    DeviceDelta,
    Group,
    GroupDelta,
    MeshStatus,
    ProductType,
    RadioState,
    StatusDelta,
};
