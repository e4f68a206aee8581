//! Modelo de TechnicianVehicle
//!
//! Vehículo interno de un técnico, opcionalmente vinculado a un vehículo
//! externo de Fleetmatics. Mapea exactamente a la tabla technician_vehicles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Vehículo de técnico - como máximo un mapeo externo a la vez.
/// Desvincular limpia fleetmatics_vehicle_id sin borrar el historial.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TechnicianVehicle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub technician_id: Option<Uuid>,
    pub name: String,
    pub license_plate: Option<String>,
    pub fleetmatics_vehicle_id: Option<String>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TechnicianVehicle {
    /// Verificar si el vehículo está vinculado a un vehículo externo
    pub fn is_mapped(&self) -> bool {
        self.fleetmatics_vehicle_id.is_some()
    }
}
