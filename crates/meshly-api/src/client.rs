//! HTTP command client for the hub's `/api/*` endpoints.
//!
//! Every command is a fire-and-forget POST: the response only
//! acknowledges that the operation *started* (or reports why it did
//! not). Actual state changes arrive later through the push channel.

use std::time::Duration;

use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ApiError, HubErrorCode};
use crate::events::{DeviceRecord, GroupRecord};

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct ControlRequest {
    avion_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_temp: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct AvionIdRequest {
    avion_id: u16,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct MqttExposedRequest {
    id: u16,
    exposed: bool,
}

#[derive(Debug, Clone, Serialize)]
struct CreateGroupRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GroupIdRequest {
    group_id: u16,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct MembershipRequest {
    avion_id: u16,
    group_id: u16,
}

#[derive(Debug, Clone, Serialize)]
struct AddDiscoveredRequest<'a> {
    device_id: u16,
    name: &'a str,
    product_type: u8,
}

#[derive(Debug, Clone, Serialize)]
struct ClaimRequest<'a> {
    uuid_hash: u32,
    name: &'a str,
    product_type: u8,
}

/// Device/group backup accepted by `/api/import`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
}

#[derive(Debug, Clone, Serialize)]
struct PassphraseRequest<'a> {
    passphrase: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeneratedPassphrase {
    #[serde(default)]
    passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ── HubClient ────────────────────────────────────────────────────────

/// Async client for one mesh hub.
///
/// Cheap to clone; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base: Url,
}

impl HubClient {
    /// Build a client for the hub at `base` (scheme + host, e.g.
    /// `http://avion-hub.local`).
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// Build a client reusing an existing `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// The SSE push channel endpoint.
    pub fn events_url(&self) -> Result<Url, ApiError> {
        Ok(self.base.join("/api/events")?)
    }

    /// The underlying HTTP client (shared with the event stream).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Device / group control ───────────────────────────────────────

    /// Set brightness (0-255) for a device or group id. Group id 0
    /// broadcasts to the whole mesh.
    pub async fn set_brightness(&self, id: u16, brightness: u8) -> Result<(), ApiError> {
        self.post(
            "control",
            &ControlRequest { avion_id: id, brightness: Some(brightness), color_temp: None },
        )
        .await
    }

    /// Set color temperature in Kelvin for a device or group id.
    pub async fn set_color_temp(&self, id: u16, kelvin: u16) -> Result<(), ApiError> {
        self.post(
            "control",
            &ControlRequest { avion_id: id, brightness: None, color_temp: Some(kelvin) },
        )
        .await
    }

    /// Query firmware/identity details; the answer arrives as an
    /// `examine` push event.
    pub async fn examine_device(&self, avion_id: u16) -> Result<(), ApiError> {
        self.post("examine_device", &AvionIdRequest { avion_id }).await
    }

    /// Remove a claimed device from the mesh.
    pub async fn unclaim_device(&self, avion_id: u16) -> Result<(), ApiError> {
        self.post("unclaim_device", &AvionIdRequest { avion_id }).await
    }

    /// Toggle MQTT bridge exposure for a device/group id (0 = mesh).
    pub async fn set_mqtt_exposed(&self, id: u16, exposed: bool) -> Result<(), ApiError> {
        self.post("set_mqtt_exposed", &MqttExposedRequest { id, exposed }).await
    }

    // ── Groups ───────────────────────────────────────────────────────

    pub async fn create_group(&self, name: &str) -> Result<(), ApiError> {
        self.post("create_group", &CreateGroupRequest { name }).await
    }

    pub async fn delete_group(&self, group_id: u16) -> Result<(), ApiError> {
        self.post("delete_group", &GroupIdRequest { group_id }).await
    }

    pub async fn add_to_group(&self, avion_id: u16, group_id: u16) -> Result<(), ApiError> {
        self.post("add_to_group", &MembershipRequest { avion_id, group_id }).await
    }

    pub async fn remove_from_group(&self, avion_id: u16, group_id: u16) -> Result<(), ApiError> {
        self.post("remove_from_group", &MembershipRequest { avion_id, group_id }).await
    }

    // ── Scans & claiming ─────────────────────────────────────────────

    /// Start a mesh ping scan; results arrive as a `discover_mesh`
    /// push event.
    pub async fn discover_mesh(&self) -> Result<(), ApiError> {
        self.post("discover_mesh", &serde_json::json!({})).await
    }

    /// Start an unassociated-device scan; results arrive as a
    /// `scan_unassoc` push event.
    pub async fn scan_unassociated(&self) -> Result<(), ApiError> {
        self.post("scan_unassociated", &serde_json::json!({})).await
    }

    /// Register a device found by a mesh ping scan.
    pub async fn add_discovered(
        &self,
        device_id: u16,
        name: &str,
        product_type: u8,
    ) -> Result<(), ApiError> {
        self.post("add_discovered", &AddDiscoveredRequest { device_id, name, product_type })
            .await
    }

    /// Claim an unassociated device by its uuid-hash; the outcome
    /// arrives as a `claim_result` push event.
    pub async fn claim_device(
        &self,
        uuid_hash: u32,
        name: &str,
        product_type: u8,
    ) -> Result<(), ApiError> {
        self.post("claim_device", &ClaimRequest { uuid_hash, name, product_type })
            .await
    }

    // ── Persistence & setup ──────────────────────────────────────────

    /// Import a device/group backup; counts arrive as an
    /// `import_result` push event.
    pub async fn import_backup(&self, backup: &BackupPayload) -> Result<(), ApiError> {
        self.post("import", backup).await
    }

    /// Persist the device database to flash.
    pub async fn save(&self) -> Result<(), ApiError> {
        self.post("save", &serde_json::json!({})).await
    }

    /// Set the mesh passphrase. Validated client-side first; the hub
    /// reconnects its radio afterwards.
    pub async fn set_passphrase(&self, passphrase: &SecretString) -> Result<(), ApiError> {
        validate_passphrase(passphrase.expose_secret())?;
        self.post("set_passphrase", &PassphraseRequest { passphrase: passphrase.expose_secret() })
            .await
    }

    /// Ask the hub to generate a fresh random passphrase.
    pub async fn generate_passphrase(&self) -> Result<String, ApiError> {
        let body: GeneratedPassphrase = self.post_parsed("generate_passphrase", &serde_json::json!({})).await?;
        body.passphrase
            .ok_or_else(|| ApiError::InvalidRequest("hub did not return a passphrase".into()))
    }

    /// Factory reset: wipes devices, groups, and the passphrase.
    pub async fn factory_reset(&self) -> Result<(), ApiError> {
        self.post("factory_reset", &serde_json::json!({})).await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), ApiError> {
        self.post_raw(endpoint, body).await.map(|_| ())
    }

    async fn post_parsed<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let text = self.post_raw(endpoint, body).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialization {
            message: e.to_string(),
            body: text,
        })
    }

    /// POST JSON, map `{"error": code}` rejections, return the raw body.
    async fn post_raw<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, ApiError> {
        let url = self.base.join(&format!("/api/{endpoint}"))?;
        tracing::debug!(endpoint, "dispatching command");

        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            tracing::trace!(endpoint, body = %truncate(&text, 120), "command accepted");
            return Ok(text);
        }

        let code = serde_json::from_str::<ErrorBody>(&text).map_or_else(
            |_| HubErrorCode::Other(status.to_string()),
            |b| HubErrorCode::from_wire(&b.error),
        );
        tracing::debug!(endpoint, status = status.as_u16(), ?code, "command rejected");
        Err(ApiError::Hub { code, status: status.as_u16() })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Passphrase validation ────────────────────────────────────────────

/// Client-side passphrase rules, matching the dashboard's setup flow:
/// non-empty, at least 8 characters, and anything base64-shaped
/// (length divisible by 4) must decode to at least 16 bytes.
pub fn validate_passphrase(passphrase: &str) -> Result<(), ApiError> {
    if passphrase.is_empty() {
        return Err(ApiError::InvalidRequest("Passphrase cannot be empty".into()));
    }
    if passphrase.len() < 8 {
        return Err(ApiError::InvalidRequest(
            "Passphrase must be at least 8 characters".into(),
        ));
    }
    if passphrase.len() % 4 == 0 {
        match base64::engine::general_purpose::STANDARD.decode(passphrase) {
            Ok(decoded) if decoded.len() < 16 => {
                return Err(ApiError::InvalidRequest(
                    "Base64 passphrase must decode to at least 16 bytes".into(),
                ));
            }
            Ok(_) => {}
            Err(_) => {
                return Err(ApiError::InvalidRequest("Invalid base64 passphrase".into()));
            }
        }
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_empty_rejected() {
        assert!(validate_passphrase("").is_err());
    }

    #[test]
    fn passphrase_short_rejected() {
        assert!(validate_passphrase("abc").is_err());
    }

    #[test]
    fn passphrase_plain_accepted() {
        // 9 chars: not base64-shaped, long enough.
        assert!(validate_passphrase("hunter234").is_ok());
    }

    #[test]
    fn passphrase_base64_too_short_rejected() {
        // Valid base64, decodes to 6 bytes.
        assert!(validate_passphrase("aGVsbG8h").is_err());
    }

    #[test]
    fn passphrase_base64_long_enough_accepted() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8; 18]);
        assert_eq!(encoded.len() % 4, 0);
        assert!(validate_passphrase(&encoded).is_ok());
    }
}
