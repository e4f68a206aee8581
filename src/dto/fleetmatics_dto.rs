use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::FleetmaticsConfig;

// Request para crear/actualizar la configuración de una organización
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertFleetmaticsConfigRequest {
    #[validate(length(min = 1, max = 255))]
    pub api_key: String,

    #[validate(length(min = 1, max = 255))]
    pub api_secret: String,

    #[validate(length(min = 1, max = 100))]
    pub account_id: String,

    #[validate(url)]
    pub base_url: String,

    #[validate(range(min = 1, max = 1440))]
    pub sync_frequency_minutes: Option<i32>,

    pub is_active: Option<bool>,
}

// Response de configuración - nunca expone api_secret ni tokens
#[derive(Debug, Serialize)]
pub struct FleetmaticsConfigResponse {
    pub organization_id: Uuid,
    pub account_id: String,
    pub base_url: String,
    pub sync_frequency_minutes: i32,
    pub is_active: bool,
    pub has_token: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<FleetmaticsConfig> for FleetmaticsConfigResponse {
    fn from(config: FleetmaticsConfig) -> Self {
        Self {
            organization_id: config.organization_id,
            account_id: config.account_id,
            base_url: config.base_url,
            sync_frequency_minutes: config.sync_frequency_minutes,
            is_active: config.is_active,
            has_token: config.access_token.is_some(),
            token_expires_at: config.token_expires_at,
            updated_at: config.updated_at,
        }
    }
}

// Request para mapear un vehículo interno a uno externo
#[derive(Debug, Deserialize, Validate)]
pub struct MapVehicleRequest {
    #[validate(length(min = 1, max = 100))]
    pub fleetmatics_vehicle_id: String,
}

// Query del historial externo
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// Última posición conocida de un vehículo
#[derive(Debug, Serialize)]
pub struct VehicleLocationResponse {
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub event_time: DateTime<Utc>,
    /// "cache" o "database"
    pub source: String,
}

// Request de envío de correo
#[derive(Debug, Deserialize, Validate)]
pub struct SendEmailRequest {
    #[validate(email)]
    pub to: String,

    #[validate(length(min = 1, max = 255))]
    pub subject: String,

    #[validate(length(min = 1))]
    pub body: String,
}
