//! Modelos de la integración Fleetmatics
//!
//! Este módulo contiene la configuración OAuth por organización, el historial
//! de ubicaciones y el estado del servicio de sincronización. Mapea
//! exactamente al schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Margen de seguridad antes de la expiración real del token
pub const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Configuración Fleetmatics por organización - mapea a la tabla fleetmatics_configs
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FleetmaticsConfig {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub api_key: String,
    pub api_secret: String,
    pub account_id: String,
    pub base_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub sync_frequency_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FleetmaticsConfig {
    /// Verificar si el token expira dentro del margen de 5 minutos
    /// (o ya expiró, o nunca se emitió).
    pub fn is_token_expiring(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.token_expires_at) {
            (Some(_), Some(expires_at)) => {
                expires_at <= now + Duration::minutes(TOKEN_EXPIRY_BUFFER_MINUTES)
            }
            _ => true,
        }
    }

    /// Verificar si hay un token utilizable ahora mismo
    pub fn has_valid_token(&self, now: DateTime<Utc>) -> bool {
        !self.is_token_expiring(now)
    }
}

/// Estado del servicio de sincronización por organización
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    Authenticating,
    Refreshing,
    Active,
    Stopped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Uninitialized => "uninitialized",
            SyncState::Authenticating => "authenticating",
            SyncState::Refreshing => "refreshing",
            SyncState::Active => "active",
            SyncState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Fila de historial de ubicaciones - mapea a la tabla fleetmatics_location_history.
/// Append-only: una fila por vehículo por ciclo de sincronización.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FleetmaticsLocationHistory {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub event_time: DateTime<Utc>,
    pub odometer: Option<Decimal>,
    pub external_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Datos para insertar una nueva fila de historial
#[derive(Debug, Clone)]
pub struct NewLocationHistory {
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub event_time: DateTime<Utc>,
    pub odometer: Option<Decimal>,
    pub external_event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_expiry(expires_at: Option<DateTime<Utc>>) -> FleetmaticsConfig {
        let now = Utc::now();
        FleetmaticsConfig {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            account_id: "ACC-1".to_string(),
            base_url: "https://fleet.example.com".to_string(),
            access_token: expires_at.map(|_| "token".to_string()),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            token_expires_at: expires_at,
            sync_frequency_minutes: 15,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_expiring_within_buffer() {
        let now = Utc::now();
        let config = config_with_expiry(Some(now + Duration::minutes(4)));
        assert!(config.is_token_expiring(now));
    }

    #[test]
    fn test_token_valid_outside_buffer() {
        let now = Utc::now();
        let config = config_with_expiry(Some(now + Duration::minutes(6)));
        assert!(!config.is_token_expiring(now));
        assert!(config.has_valid_token(now));
    }

    #[test]
    fn test_token_expiring_when_already_expired() {
        let now = Utc::now();
        let config = config_with_expiry(Some(now - Duration::minutes(1)));
        assert!(config.is_token_expiring(now));
    }

    #[test]
    fn test_token_expiring_when_never_issued() {
        let config = config_with_expiry(None);
        assert!(config.is_token_expiring(Utc::now()));
    }
}
