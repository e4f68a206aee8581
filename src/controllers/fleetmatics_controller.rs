use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::dto::fleetmatics_dto::{
    FleetmaticsConfigResponse, UpsertFleetmaticsConfigRequest, VehicleLocationResponse,
};
use crate::dto::ApiResponse;
use crate::repositories::{FleetmaticsStorage, PgFleetmaticsStorage};
use crate::services::{CachedVehicleLocation, LocationCacheService};
use crate::services::DEFAULT_SYNC_FREQUENCY_MINUTES;
use crate::utils::errors::{AppError, AppResult};

pub struct FleetmaticsController {
    storage: PgFleetmaticsStorage,
}

impl FleetmaticsController {
    pub fn new(pool: PgPool) -> Self {
        Self {
            storage: PgFleetmaticsStorage::new(pool),
        }
    }

    /// Crear o reemplazar la configuración de una organización. Los tokens
    /// previos se invalidan: las credenciales cambiaron.
    pub async fn upsert_config(
        &self,
        organization_id: Uuid,
        request: UpsertFleetmaticsConfigRequest,
    ) -> AppResult<ApiResponse<FleetmaticsConfigResponse>> {
        request.validate()?;

        let config = self
            .storage
            .upsert_config(
                organization_id,
                request.api_key,
                request.api_secret,
                request.account_id,
                request.base_url,
                request
                    .sync_frequency_minutes
                    .unwrap_or(DEFAULT_SYNC_FREQUENCY_MINUTES),
                request.is_active.unwrap_or(true),
            )
            .await?;

        Ok(ApiResponse::success_with_message(
            config.into(),
            "Configuración Fleetmatics guardada".to_string(),
        ))
    }

    pub async fn get_config(&self, organization_id: Uuid) -> AppResult<FleetmaticsConfigResponse> {
        let config = self
            .storage
            .get_config_by_organization(organization_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Configuración Fleetmatics no encontrada".to_string())
            })?;

        Ok(config.into())
    }

    /// Última posición conocida de un vehículo: primero el caché Redis,
    /// después la última fila de historial en PostgreSQL.
    pub async fn latest_location(
        &self,
        vehicle_id: Uuid,
        cache: &LocationCacheService,
    ) -> AppResult<VehicleLocationResponse> {
        if let Ok(Some(cached)) = cache.get_location(vehicle_id).await {
            return Ok(VehicleLocationResponse {
                vehicle_id: cached.vehicle_id,
                latitude: cached.latitude,
                longitude: cached.longitude,
                speed: cached.speed,
                heading: cached.heading,
                event_time: cached.event_time,
                source: "cache".to_string(),
            });
        }

        let row = self
            .storage
            .get_latest_location_by_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Sin ubicaciones registradas para este vehículo".to_string())
            })?;

        // Rellenar el caché para la próxima consulta
        let cached = CachedVehicleLocation::from(&row);
        if let Err(e) = cache.cache_location(&cached).await {
            log::warn!("⚠️ No se pudo cachear la última posición: {}", e);
        }

        Ok(VehicleLocationResponse {
            vehicle_id: row.vehicle_id,
            latitude: row.latitude,
            longitude: row.longitude,
            speed: row.speed,
            heading: row.heading,
            event_time: row.event_time,
            source: "database".to_string(),
        })
    }
}
