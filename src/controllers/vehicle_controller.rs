use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::dto::vehicle_dto::{
    CreateTechnicianVehicleRequest, TechnicianVehicleResponse, UpdateTechnicianVehicleRequest,
};
use crate::dto::ApiResponse;
use crate::repositories::TechnicianVehicleRepository;
use crate::utils::errors::{AppError, AppResult};

pub struct VehicleController {
    repository: TechnicianVehicleRepository,
}

impl VehicleController {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TechnicianVehicleRepository::new(pool),
        }
    }

    pub async fn create(
        &self,
        request: CreateTechnicianVehicleRequest,
    ) -> AppResult<ApiResponse<TechnicianVehicleResponse>> {
        request.validate()?;

        let vehicle = self
            .repository
            .create(
                request.organization_id,
                request.technician_id,
                request.name,
                request.license_plate,
            )
            .await?;

        Ok(ApiResponse::success_with_message(
            vehicle.into(),
            "Vehículo creado exitosamente".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<TechnicianVehicleResponse> {
        let vehicle = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))?;

        Ok(vehicle.into())
    }

    pub async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<TechnicianVehicleResponse>> {
        let vehicles = self.repository.find_by_organization(organization_id).await?;

        Ok(vehicles.into_iter().map(Into::into).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateTechnicianVehicleRequest,
    ) -> AppResult<ApiResponse<TechnicianVehicleResponse>> {
        request.validate()?;

        let vehicle = self
            .repository
            .update(
                id,
                request.organization_id,
                request.technician_id,
                request.name,
                request.license_plate,
            )
            .await?;

        Ok(ApiResponse::success_with_message(
            vehicle.into(),
            "Vehículo actualizado exitosamente".to_string(),
        ))
    }

    pub async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        self.repository.delete(id, organization_id).await?;
        Ok(())
    }
}
