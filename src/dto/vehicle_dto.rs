use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::TechnicianVehicle;

// Request para crear un vehículo de técnico
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTechnicianVehicleRequest {
    pub organization_id: Uuid,
    pub technician_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(min = 2, max = 20))]
    pub license_plate: Option<String>,
}

// Request para actualizar un vehículo de técnico
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTechnicianVehicleRequest {
    pub organization_id: Uuid,
    pub technician_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 2, max = 20))]
    pub license_plate: Option<String>,
}

// Query para listar vehículos de una organización
#[derive(Debug, Deserialize)]
pub struct ListVehiclesQuery {
    pub organization_id: Uuid,
}

// Response de vehículo
#[derive(Debug, Serialize)]
pub struct TechnicianVehicleResponse {
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

impl From<TechnicianVehicle> for TechnicianVehicleResponse {
    fn from(vehicle: TechnicianVehicle) -> Self {
        Self {
            id: vehicle.id,
            organization_id: vehicle.organization_id,
            technician_id: vehicle.technician_id,
            name: vehicle.name,
            license_plate: vehicle.license_plate,
            fleetmatics_vehicle_id: vehicle.fleetmatics_vehicle_id,
            last_latitude: vehicle.last_latitude,
            last_longitude: vehicle.last_longitude,
            last_location_update: vehicle.last_location_update,
            created_at: vehicle.created_at,
        }
    }
}
