//! Servicio de caché de ubicaciones
//!
//! Cachea en Redis la última posición conocida de cada vehículo para que el
//! endpoint "dónde está el camión" no toque PostgreSQL en cada consulta.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheOperations, RedisClient};
use crate::models::FleetmaticsLocationHistory;

/// Entrada cacheada de última posición
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVehicleLocation {
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub event_time: DateTime<Utc>,
    pub cached_at: DateTime<Utc>,
}

impl From<&FleetmaticsLocationHistory> for CachedVehicleLocation {
    fn from(row: &FleetmaticsLocationHistory) -> Self {
        Self {
            vehicle_id: row.vehicle_id,
            latitude: row.latitude,
            longitude: row.longitude,
            speed: row.speed,
            heading: row.heading,
            event_time: row.event_time,
            cached_at: Utc::now(),
        }
    }
}

/// Servicio de caché sobre RedisClient
pub struct LocationCacheService {
    redis: RedisClient,
}

impl LocationCacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Guardar la última posición de un vehículo en caché.
    /// TTL atado a la frecuencia de sincronización.
    pub async fn cache_location(&self, location: &CachedVehicleLocation) -> Result<()> {
        let cache_key = self.redis.vehicle_location_key(&location.vehicle_id.to_string());
        self.redis
            .set(&cache_key, location, self.redis.default_ttl())
            .await?;

        log::info!("💾 Última posición cacheada para vehículo {}", location.vehicle_id);
        Ok(())
    }

    /// Recuperar la última posición cacheada de un vehículo
    pub async fn get_location(&self, vehicle_id: Uuid) -> Result<Option<CachedVehicleLocation>> {
        let cache_key = self.redis.vehicle_location_key(&vehicle_id.to_string());

        match self.redis.get::<CachedVehicleLocation>(&cache_key).await? {
            Some(location) => {
                log::info!("✅ Posición encontrada en caché para vehículo {}", vehicle_id);
                Ok(Some(location))
            }
            None => {
                log::info!("❌ Posición no encontrada en caché para vehículo {}", vehicle_id);
                Ok(None)
            }
        }
    }

    /// Invalidar la posición cacheada (por ejemplo al desvincular el vehículo)
    pub async fn invalidate_location(&self, vehicle_id: Uuid) -> Result<()> {
        let cache_key = self.redis.vehicle_location_key(&vehicle_id.to_string());
        self.redis.delete(&cache_key).await?;

        log::info!("🗑️ Posición cacheada invalidada para vehículo {}", vehicle_id);
        Ok(())
    }
}
