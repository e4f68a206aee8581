//! Almacenamiento de la integración Fleetmatics
//!
//! Define el trait de almacenamiento que consume el servicio de
//! sincronización y su implementación sobre PostgreSQL. El servicio depende
//! del trait para poder probarse con implementaciones en memoria.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    FleetmaticsConfig, FleetmaticsLocationHistory, NewLocationHistory, TechnicianVehicle,
};
use crate::utils::errors::AppResult;

/// Interfaz de almacenamiento consumida por el servicio de sincronización
#[async_trait]
pub trait FleetmaticsStorage: Send + Sync {
    async fn get_config_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<FleetmaticsConfig>>;

    /// Persistir la configuración (tokens incluidos) tras autenticar/refrescar
    async fn update_config(&self, config: &FleetmaticsConfig) -> AppResult<()>;

    async fn get_all_technician_vehicles(&self) -> AppResult<Vec<TechnicianVehicle>>;

    async fn get_technician_vehicle(&self, id: Uuid) -> AppResult<Option<TechnicianVehicle>>;

    /// Persistir mapeo y última posición de un vehículo
    async fn update_technician_vehicle(&self, vehicle: &TechnicianVehicle) -> AppResult<()>;

    /// Insertar una fila append-only de historial de ubicaciones
    async fn create_location_history(&self, row: NewLocationHistory) -> AppResult<()>;

    async fn get_latest_location_by_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> AppResult<Option<FleetmaticsLocationHistory>>;
}

/// Implementación PostgreSQL del almacenamiento
pub struct PgFleetmaticsStorage {
    pool: PgPool,
}

impl PgFleetmaticsStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Crear o actualizar la configuración de una organización
    /// (usado por el endpoint de administración, no por el servicio)
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_config(
        &self,
        organization_id: Uuid,
        api_key: String,
        api_secret: String,
        account_id: String,
        base_url: String,
        sync_frequency_minutes: i32,
        is_active: bool,
    ) -> AppResult<FleetmaticsConfig> {
        let config = sqlx::query_as::<_, FleetmaticsConfig>(
            r#"
            INSERT INTO fleetmatics_configs
                (id, organization_id, api_key, api_secret, account_id, base_url,
                 sync_frequency_minutes, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (organization_id) DO UPDATE SET
                api_key = EXCLUDED.api_key,
                api_secret = EXCLUDED.api_secret,
                account_id = EXCLUDED.account_id,
                base_url = EXCLUDED.base_url,
                sync_frequency_minutes = EXCLUDED.sync_frequency_minutes,
                is_active = EXCLUDED.is_active,
                access_token = NULL,
                refresh_token = NULL,
                token_type = NULL,
                token_expires_at = NULL,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(api_key)
        .bind(api_secret)
        .bind(account_id)
        .bind(base_url)
        .bind(sync_frequency_minutes)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }
}

#[async_trait]
impl FleetmaticsStorage for PgFleetmaticsStorage {
    async fn get_config_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<FleetmaticsConfig>> {
        let config = sqlx::query_as::<_, FleetmaticsConfig>(
            "SELECT * FROM fleetmatics_configs WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn update_config(&self, config: &FleetmaticsConfig) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE fleetmatics_configs
            SET access_token = $2,
                refresh_token = $3,
                token_type = $4,
                token_expires_at = $5,
                sync_frequency_minutes = $6,
                is_active = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(config.id)
        .bind(&config.access_token)
        .bind(&config.refresh_token)
        .bind(&config.token_type)
        .bind(config.token_expires_at)
        .bind(config.sync_frequency_minutes)
        .bind(config.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_all_technician_vehicles(&self) -> AppResult<Vec<TechnicianVehicle>> {
        let vehicles = sqlx::query_as::<_, TechnicianVehicle>(
            "SELECT * FROM technician_vehicles ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn get_technician_vehicle(&self, id: Uuid) -> AppResult<Option<TechnicianVehicle>> {
        let vehicle = sqlx::query_as::<_, TechnicianVehicle>(
            "SELECT * FROM technician_vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn update_technician_vehicle(&self, vehicle: &TechnicianVehicle) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE technician_vehicles
            SET fleetmatics_vehicle_id = $2,
                last_latitude = $3,
                last_longitude = $4,
                last_location_update = $5
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.fleetmatics_vehicle_id)
        .bind(vehicle.last_latitude)
        .bind(vehicle.last_longitude)
        .bind(vehicle.last_location_update)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_location_history(&self, row: NewLocationHistory) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fleetmatics_location_history
                (id, vehicle_id, latitude, longitude, speed, heading,
                 event_time, odometer, external_event_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.vehicle_id)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(row.speed)
        .bind(row.heading)
        .bind(row.event_time)
        .bind(row.odometer)
        .bind(row.external_event_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_latest_location_by_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> AppResult<Option<FleetmaticsLocationHistory>> {
        let location = sqlx::query_as::<_, FleetmaticsLocationHistory>(
            r#"
            SELECT * FROM fleetmatics_location_history
            WHERE vehicle_id = $1
            ORDER BY event_time DESC
            LIMIT 1
            "#,
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }
}
