use thiserror::Error;

/// Top-level error type for the `meshly-api` crate.
///
/// Covers transport failures, hub-reported command rejections, and
/// payload decoding problems. `meshly-core` maps these into user-facing
/// diagnostics.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Hub ─────────────────────────────────────────────────────────
    /// The hub rejected a command with a structured `{"error": code}` body.
    #[error("{}", .code.message())]
    Hub { code: HubErrorCode, status: u16 },

    // ── Push channel ────────────────────────────────────────────────
    /// The SSE stream could not be established.
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Client-side validation ──────────────────────────────────────
    /// A request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::StreamConnect(_) => true,
            Self::Hub { code, .. } => matches!(code, HubErrorCode::Busy),
            _ => false,
        }
    }

    /// Returns `true` if the hub reported the target as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Hub { code: HubErrorCode::NotFound, .. })
    }
}

// ── Hub error codes ──────────────────────────────────────────────────

/// The hub's fixed set of command error codes, plus a raw fallback for
/// codes added by future firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubErrorCode {
    /// No mesh passphrase has been configured yet.
    MeshNotInitialized,
    /// The BLE radio is not in the Ready state.
    BleNotReady,
    /// A conflicting operation (scan, association) is already running.
    Busy,
    /// The request body was empty or unreadable.
    EmptyBody,
    /// A required id field was missing from the request.
    MissingField(String),
    /// Unknown endpoint or entity.
    NotFound,
    /// Passphrase failed the hub's validation rules.
    InvalidPassphrase,
    /// Anything the client does not recognize.
    Other(String),
}

impl HubErrorCode {
    /// Parse the wire code string.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "mesh_not_initialized" => Self::MeshNotInitialized,
            "ble_not_ready" => Self::BleNotReady,
            "busy" => Self::Busy,
            "empty_body" => Self::EmptyBody,
            "not_found" => Self::NotFound,
            "invalid_passphrase" => Self::InvalidPassphrase,
            other => other.strip_prefix("missing_").map_or_else(
                || Self::Other(other.to_owned()),
                |field| Self::MissingField(field.to_owned()),
            ),
        }
    }

    /// Human-readable message for the dashboard / CLI.
    pub fn message(&self) -> String {
        match self {
            Self::MeshNotInitialized => {
                "Mesh not initialized -- set a passphrase first".to_owned()
            }
            Self::BleNotReady => "BLE radio not ready".to_owned(),
            Self::Busy => "Hub is busy with another operation".to_owned(),
            Self::EmptyBody => "Request body was empty".to_owned(),
            Self::MissingField(field) => format!("Missing required field: {field}"),
            Self::NotFound => "Not found".to_owned(),
            Self::InvalidPassphrase => "Invalid passphrase".to_owned(),
            Self::Other(code) => format!("Hub error: {code}"),
        }
    }
}
