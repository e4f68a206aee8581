//! Cliente HTTP para la API externa de Fleetmatics
//!
//! Este módulo maneja la comunicación con la API REST del proveedor de
//! rastreo GPS: emisión/refresco de tokens OAuth2 y consultas de flota.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::FleetmaticsConfig;

/// Errores del cliente Fleetmatics
#[derive(Error, Debug)]
pub enum FleetApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// Tipo de grant para POST /auth/token
#[derive(Debug, Clone)]
pub enum TokenGrant {
    ClientCredentials,
    RefreshToken(String),
}

/// Response del endpoint de tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Segundos hasta la expiración
    pub expires_in: i64,
}

/// Vehículo según la API externa
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetVehicle {
    #[serde(rename = "vehicle_id")]
    pub id: String,
    pub name: Option<String>,
    pub registration: Option<String>,
}

/// Ubicación actual de un vehículo según la API externa
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetLocation {
    #[serde(rename = "vehicle_id")]
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub event_time: DateTime<Utc>,
    pub odometer: Option<f64>,
    pub event_id: Option<String>,
}

/// Operaciones contra la API externa de flota.
/// El servicio de sincronización depende de este trait, no del cliente
/// concreto, para poder probarse con implementaciones en memoria.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// POST /auth/token (client-credentials o refresh-token)
    async fn request_token(
        &self,
        config: &FleetmaticsConfig,
        grant: TokenGrant,
    ) -> Result<TokenResponse, FleetApiError>;

    /// GET /fleet/vehicles
    async fn fetch_vehicles(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
    ) -> Result<Vec<FleetVehicle>, FleetApiError>;

    /// GET /fleet/vehicles/{id}/location
    async fn fetch_vehicle_location(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
        external_id: &str,
    ) -> Result<Option<FleetLocation>, FleetApiError>;

    /// GET /fleet/vehicles/locations (bulk, todas las ubicaciones actuales)
    async fn fetch_all_locations(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
    ) -> Result<Vec<FleetLocation>, FleetApiError>;

    /// GET /fleet/vehicles/{id}/history?start_time&end_time
    async fn fetch_vehicle_history(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
        external_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<FleetLocation>, FleetApiError>;
}

/// Cliente reqwest contra la API real
pub struct FleetmaticsClient {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TokenRequestBody<'a> {
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

impl FleetmaticsClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// GET autenticado que deserializa el body o devuelve un error tipado
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, FleetApiError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", Self::bearer(token))
            .header("User-Agent", "FleetTracking/1.0")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FleetApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| FleetApiError::InvalidBody(e.to_string()))
    }
}

impl Default for FleetmaticsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FleetApi for FleetmaticsClient {
    async fn request_token(
        &self,
        config: &FleetmaticsConfig,
        grant: TokenGrant,
    ) -> Result<TokenResponse, FleetApiError> {
        let url = format!("{}/auth/token", config.base_url.trim_end_matches('/'));

        let body = match &grant {
            TokenGrant::ClientCredentials => TokenRequestBody {
                grant_type: "client_credentials",
                client_id: Some(&config.api_key),
                client_secret: Some(&config.api_secret),
                account_id: Some(&config.account_id),
                refresh_token: None,
            },
            TokenGrant::RefreshToken(token) => TokenRequestBody {
                grant_type: "refresh_token",
                client_id: Some(&config.api_key),
                client_secret: None,
                account_id: None,
                refresh_token: Some(token),
            },
        };

        log::info!(
            "🔑 Solicitando token Fleetmatics ({}) para cuenta {}",
            body.grant_type,
            config.account_id
        );

        let response = self
            .client
            .post(&url)
            .header("User-Agent", "FleetTracking/1.0")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(FleetApiError::AuthRejected(response_text));
        }
        if !status.is_success() {
            return Err(FleetApiError::Api {
                status: status.as_u16(),
                body: response_text,
            });
        }

        serde_json::from_str(&response_text)
            .map_err(|e| FleetApiError::InvalidBody(e.to_string()))
    }

    async fn fetch_vehicles(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
    ) -> Result<Vec<FleetVehicle>, FleetApiError> {
        let url = format!("{}/fleet/vehicles", config.base_url.trim_end_matches('/'));
        self.get_json(&url, token).await
    }

    async fn fetch_vehicle_location(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
        external_id: &str,
    ) -> Result<Option<FleetLocation>, FleetApiError> {
        let url = format!(
            "{}/fleet/vehicles/{}/location",
            config.base_url.trim_end_matches('/'),
            external_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", Self::bearer(token))
            .header("User-Agent", "FleetTracking/1.0")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(FleetApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let location = serde_json::from_str(&body)
            .map_err(|e| FleetApiError::InvalidBody(e.to_string()))?;
        Ok(Some(location))
    }

    async fn fetch_all_locations(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
    ) -> Result<Vec<FleetLocation>, FleetApiError> {
        let url = format!(
            "{}/fleet/vehicles/locations",
            config.base_url.trim_end_matches('/')
        );
        self.get_json(&url, token).await
    }

    async fn fetch_vehicle_history(
        &self,
        config: &FleetmaticsConfig,
        token: &str,
        external_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<FleetLocation>, FleetApiError> {
        let url = format!(
            "{}/fleet/vehicles/{}/history?start_time={}&end_time={}",
            config.base_url.trim_end_matches('/'),
            external_id,
            start_time.to_rfc3339(),
            end_time.to_rfc3339()
        );
        self.get_json(&url, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_body_client_credentials() {
        let body = TokenRequestBody {
            grant_type: "client_credentials",
            client_id: Some("key"),
            client_secret: Some("secret"),
            account_id: Some("ACC-1"),
            refresh_token: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["grant_type"], "client_credentials");
        assert_eq!(json["client_id"], "key");
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_token_response_parsing() {
        let raw = r#"{
            "access_token": "abc",
            "refresh_token": "def",
            "token_type": "Bearer",
            "expires_in": 3600
        }"#;
        let parsed: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expires_in, 3600);
    }

    #[test]
    fn test_fleet_location_parsing() {
        let raw = r#"{
            "vehicle_id": "FM-42",
            "latitude": 25.76,
            "longitude": -80.19,
            "speed": 52.5,
            "heading": 180.0,
            "event_time": "2025-08-18T10:30:00Z",
            "odometer": 120034.5,
            "event_id": "evt-99"
        }"#;
        let parsed: FleetLocation = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.vehicle_id, "FM-42");
        assert_eq!(parsed.heading, Some(180.0));
    }
}
