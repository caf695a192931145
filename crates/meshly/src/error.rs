//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text.

use miette::Diagnostic;
use thiserror::Error;

use meshly_api::{ApiError, HubErrorCode};
use meshly_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the hub at {url}")]
    #[diagnostic(
        code(meshly::connection_failed),
        help(
            "Check that the hub is powered and on the network.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Timed out after {seconds}s waiting for the hub's state replay")]
    #[diagnostic(
        code(meshly::sync_timeout),
        help("Increase the wait with --sync-timeout, or check the hub's BLE radio state.")
    )]
    SyncTimeout { seconds: u64 },

    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(meshly::timeout),
        help("The hub acknowledged the command but its result never arrived on the event stream.")
    )]
    ResultTimeout { seconds: u64, what: String },

    // ── Hub-reported ─────────────────────────────────────────────────
    #[error("The mesh is not initialized")]
    #[diagnostic(
        code(meshly::mesh_not_initialized),
        help("Set a passphrase first: meshly system passphrase <phrase>")
    )]
    MeshNotInitialized,

    #[error("The hub's BLE radio is not ready")]
    #[diagnostic(
        code(meshly::ble_not_ready),
        help("Wait for the radio to reconnect; check with: meshly status")
    )]
    BleNotReady,

    #[error("The hub is busy with another operation")]
    #[diagnostic(code(meshly::busy), help("Wait for the running scan or claim to finish."))]
    Busy,

    #[error("Hub rejected the request: {message}")]
    #[diagnostic(code(meshly::rejected))]
    Rejected { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} {id} not found")]
    #[diagnostic(
        code(meshly::not_found),
        help("Run: meshly {list_command} to see known {resource_type}s")
    )]
    NotFound { resource_type: String, id: String, list_command: String },

    // ── Concurrency ──────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(meshly::operation_pending),
        help("Only one scan or claim can run at a time; wait for its result.")
    )]
    OperationPending { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No hub configured")]
    #[diagnostic(
        code(meshly::no_hub),
        help(
            "Pass --hub <url>, set MESHLY_HUB, or add `hub = \"...\"` to:\n\
             {path}"
        )
    )]
    NoHub { path: String },

    #[error(transparent)]
    #[diagnostic(code(meshly::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(meshly::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Aborted")]
    #[diagnostic(code(meshly::aborted))]
    Aborted,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(meshly::json), help("Check the backup file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SyncTimeout { .. } | Self::ResultTimeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Busy | Self::OperationPending { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Api(api) => api.into(),

            CoreError::ScanPending { .. } | CoreError::ClaimPending(_) => {
                CliError::OperationPending { message: err.to_string() }
            }

            CoreError::UnknownEntity { entity, id } => CliError::NotFound {
                resource_type: entity.to_owned(),
                id: id.to_string(),
                list_command: format!("{entity}s list"),
            },

            CoreError::InvalidUuidHash(raw) => CliError::Validation {
                field: "uuid_hash".into(),
                reason: format!("{raw:?} is not a 0x-prefixed hex hash"),
            },

            CoreError::NotConnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                source: "the push channel is not connected".into(),
            },
        }
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Hub { ref code, .. } => match code {
                HubErrorCode::MeshNotInitialized => CliError::MeshNotInitialized,
                HubErrorCode::BleNotReady => CliError::BleNotReady,
                HubErrorCode::Busy => CliError::Busy,
                HubErrorCode::NotFound => CliError::NotFound {
                    resource_type: "entity".into(),
                    id: "?".into(),
                    list_command: "devices list".into(),
                },
                HubErrorCode::InvalidPassphrase => CliError::Validation {
                    field: "passphrase".into(),
                    reason: err.to_string(),
                },
                _ => CliError::Rejected { message: err.to_string() },
            },
            ApiError::Transport(ref source) => CliError::ConnectionFailed {
                url: source.url().map_or_else(|| "(unknown)".into(), ToString::to_string),
                source: err.to_string().into(),
            },
            ApiError::StreamConnect(ref detail) => CliError::ConnectionFailed {
                url: "(event stream)".into(),
                source: detail.clone().into(),
            },
            ApiError::InvalidRequest(reason) => {
                CliError::Validation { field: "input".into(), reason }
            }
            other => CliError::Rejected { message: other.to_string() },
        }
    }
}
