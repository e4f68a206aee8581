use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::TechnicianVehicle;
use crate::utils::errors::{AppError, AppResult};

pub struct TechnicianVehicleRepository {
    pool: PgPool,
}

impl TechnicianVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        technician_id: Option<Uuid>,
        name: String,
        license_plate: Option<String>,
    ) -> AppResult<TechnicianVehicle> {
        let vehicle = sqlx::query_as::<_, TechnicianVehicle>(
            r#"
            INSERT INTO technician_vehicles
                (id, organization_id, technician_id, name, license_plate, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(technician_id)
        .bind(name)
        .bind(license_plate)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(vehicle)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TechnicianVehicle>> {
        let vehicle = sqlx::query_as::<_, TechnicianVehicle>(
            "SELECT * FROM technician_vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    pub async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<TechnicianVehicle>> {
        let vehicles = sqlx::query_as::<_, TechnicianVehicle>(
            "SELECT * FROM technician_vehicles WHERE organization_id = $1 ORDER BY created_at DESC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    pub async fn update(
        &self,
        id: Uuid,
        organization_id: Uuid,
        technician_id: Option<Uuid>,
        name: Option<String>,
        license_plate: Option<String>,
    ) -> AppResult<TechnicianVehicle> {
        // Obtener vehículo actual
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

        // Verificar que pertenece a la organización
        if current.organization_id != organization_id {
            return Err(AppError::BadRequest(
                "Vehicle does not belong to this organization".to_string(),
            ));
        }

        let vehicle = sqlx::query_as::<_, TechnicianVehicle>(
            r#"
            UPDATE technician_vehicles
            SET technician_id = $2, name = $3, license_plate = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(technician_id.or(current.technician_id))
        .bind(name.unwrap_or(current.name))
        .bind(license_plate.or(current.license_plate))
        .fetch_one(&self.pool)
        .await?;

        Ok(vehicle)
    }

    pub async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        let vehicle = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

        if vehicle.organization_id != organization_id {
            return Err(AppError::BadRequest(
                "Vehicle does not belong to this organization".to_string(),
            ));
        }

        sqlx::query("DELETE FROM technician_vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
