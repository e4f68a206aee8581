//! Servicio de sincronización Fleetmatics
//!
//! Mantiene una sesión autenticada contra la API externa de rastreo GPS y
//! sincroniza la posición de los vehículos internos. Máquina de estados por
//! configuración de organización:
//! Uninitialized → Authenticating → Active → (Refreshing → Active) → Stopped.
//!
//! La frontera pública de este servicio nunca lanza errores: los fallos de
//! red/API se registran y degradan a false/None/vacío ("no hubo sync").

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clients::{FleetApi, FleetLocation, TokenGrant, TokenResponse};
use crate::models::{FleetmaticsConfig, NewLocationHistory, SyncState, TechnicianVehicle};
use crate::repositories::FleetmaticsStorage;

/// Frecuencia de sincronización por defecto
pub const DEFAULT_SYNC_FREQUENCY_MINUTES: i32 = 15;

/// Estado observable del servicio (para el endpoint de status)
#[derive(Debug, Clone, Serialize)]
pub struct FleetmaticsStatus {
    pub state: SyncState,
    pub organization_id: Option<Uuid>,
    pub is_active: bool,
    pub sync_frequency_minutes: i32,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub sync_in_flight: bool,
}

/// Servicio de sincronización. Se construye explícitamente con sus
/// dependencias inyectadas; el ciclo de vida (initialize al arrancar,
/// stop_sync al apagar) es responsabilidad del host.
pub struct FleetmaticsService {
    storage: Arc<dyn FleetmaticsStorage>,
    api: Arc<dyn FleetApi>,
    state: RwLock<SyncState>,
    config: RwLock<Option<FleetmaticsConfig>>,
    sync_in_flight: AtomicBool,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl FleetmaticsService {
    pub fn new(storage: Arc<dyn FleetmaticsStorage>, api: Arc<dyn FleetApi>) -> Self {
        Self {
            storage,
            api,
            state: RwLock::new(SyncState::Uninitialized),
            config: RwLock::new(None),
            sync_in_flight: AtomicBool::new(false),
            sync_task: Mutex::new(None),
        }
    }

    /// Cargar la configuración de la organización y dejar el servicio activo.
    /// Sin configuración la integración queda deshabilitada (false). Si el
    /// token expiró se refresca, con fallback a re-autenticación completa.
    pub async fn initialize(self: Arc<Self>, organization_id: Uuid) -> bool {
        log::info!("🚀 Inicializando integración Fleetmatics para organización {}", organization_id);

        let config = match self.storage.get_config_by_organization(organization_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::warn!(
                    "⚠️ Sin configuración Fleetmatics para {} - integración deshabilitada",
                    organization_id
                );
                return false;
            }
            Err(e) => {
                log::error!("❌ Error cargando configuración Fleetmatics: {}", e);
                return false;
            }
        };

        *self.config.write().await = Some(config.clone());

        if config.has_valid_token(Utc::now()) {
            log::info!("✅ Token Fleetmatics vigente, no hace falta autenticar");
            *self.state.write().await = SyncState::Active;
        } else if self.refresh_or_reauthenticate().await.is_none() {
            log::error!("❌ Autenticación inicial Fleetmatics falló para {}", organization_id);
            return false;
        }

        if config.is_active {
            Arc::clone(&self).start_sync().await;
        } else {
            log::info!("⏸️ Sincronización Fleetmatics desactivada por configuración");
        }

        true
    }

    /// Un ciclo de sincronización. Devuelve false cuando no se sincronizó
    /// nada: sin configuración, sin vehículos mapeados, sin token, respuesta
    /// externa vacía o ciclo anterior todavía en curso.
    pub async fn sync_vehicle_locations(&self) -> bool {
        // Guard de solapamiento: si un ciclo tarda más que el intervalo,
        // el siguiente tick se omite en lugar de correr en paralelo.
        if self.sync_in_flight.swap(true, Ordering::SeqCst) {
            log::warn!("⏭️ Ciclo de sincronización todavía en curso, se omite este tick");
            return false;
        }

        let result = self.sync_pass().await;
        self.sync_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn sync_pass(&self) -> bool {
        let config = match self.config.read().await.clone() {
            Some(config) => config,
            None => {
                log::warn!("⚠️ Sync solicitado sin configuración cargada");
                return false;
            }
        };

        let vehicles = match self.storage.get_all_technician_vehicles().await {
            Ok(vehicles) => vehicles,
            Err(e) => {
                log::error!("❌ Error leyendo vehículos de técnicos: {}", e);
                return false;
            }
        };

        let mapped: Vec<TechnicianVehicle> =
            vehicles.into_iter().filter(|v| v.is_mapped()).collect();

        if mapped.is_empty() {
            log::info!("ℹ️ Sin vehículos mapeados a Fleetmatics, nada que sincronizar");
            return false;
        }

        let token = match self.ensure_token().await {
            Some(token) => token,
            None => {
                log::error!("❌ Sin token utilizable, se aborta el ciclo de sincronización");
                return false;
            }
        };

        let locations = match self.api.fetch_all_locations(&config, &token).await {
            Ok(locations) => locations,
            Err(e) => {
                log::error!("❌ Error consultando ubicaciones de la flota: {}", e);
                return false;
            }
        };

        if locations.is_empty() {
            log::info!("ℹ️ Respuesta de ubicaciones vacía, sync sin efecto");
            return false;
        }

        let by_external_id: HashMap<&str, &FleetLocation> = locations
            .iter()
            .map(|loc| (loc.vehicle_id.as_str(), loc))
            .collect();

        // Todas las actualizaciones por vehículo se lanzan concurrentemente
        // y se esperan juntas; no hay orden garantizado entre vehículos.
        let updates = mapped.iter().filter_map(|vehicle| {
            let external_id = vehicle.fleetmatics_vehicle_id.as_deref()?;
            let location = match by_external_id.get(external_id) {
                Some(location) => (*location).clone(),
                None => {
                    // Vehículo mapeado sin ubicación externa: se salta en silencio
                    log::debug!("Sin ubicación externa para vehículo {}", vehicle.id);
                    return None;
                }
            };
            Some(self.apply_location(vehicle.clone(), location))
        });

        let results = futures::future::join_all(updates).await;
        let updated = results.iter().filter(|ok| **ok).count();

        log::info!(
            "✅ Sync Fleetmatics completado: {}/{} vehículos actualizados",
            updated,
            mapped.len()
        );

        true
    }

    /// Actualizar posición del vehículo y agregar la fila de historial,
    /// concurrentemente
    async fn apply_location(&self, mut vehicle: TechnicianVehicle, location: FleetLocation) -> bool {
        vehicle.last_latitude = Some(location.latitude);
        vehicle.last_longitude = Some(location.longitude);
        vehicle.last_location_update = Some(location.event_time);

        let history = NewLocationHistory {
            vehicle_id: vehicle.id,
            latitude: location.latitude,
            longitude: location.longitude,
            speed: location.speed,
            heading: location.heading,
            event_time: location.event_time,
            odometer: location.odometer.and_then(Decimal::from_f64_retain),
            external_event_id: location.event_id,
        };

        let (vehicle_result, history_result) = tokio::join!(
            self.storage.update_technician_vehicle(&vehicle),
            self.storage.create_location_history(history)
        );

        if let Err(e) = &vehicle_result {
            log::error!("❌ Error actualizando posición del vehículo {}: {}", vehicle.id, e);
        }
        if let Err(e) = &history_result {
            log::error!("❌ Error insertando historial del vehículo {}: {}", vehicle.id, e);
        }

        vehicle_result.is_ok() && history_result.is_ok()
    }

    /// Vincular un vehículo interno a un vehículo externo. Valida que el id
    /// externo exista; con un id desconocido no se escribe nada y se devuelve
    /// None. Tras vincular se guarda un snapshot inmediato de ubicación.
    pub async fn map_vehicle(
        &self,
        vehicle_id: Uuid,
        external_id: &str,
    ) -> Option<TechnicianVehicle> {
        let config = self.config.read().await.clone()?;
        let token = self.ensure_token().await?;

        let fleet_vehicles = match self.api.fetch_vehicles(&config, &token).await {
            Ok(vehicles) => vehicles,
            Err(e) => {
                log::error!("❌ Error listando vehículos externos: {}", e);
                return None;
            }
        };

        if !fleet_vehicles.iter().any(|v| v.id == external_id) {
            log::warn!("⚠️ Vehículo externo '{}' no existe en la flota", external_id);
            return None;
        }

        let mut vehicle = match self.storage.get_technician_vehicle(vehicle_id).await {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => {
                log::warn!("⚠️ Vehículo interno {} no encontrado", vehicle_id);
                return None;
            }
            Err(e) => {
                log::error!("❌ Error leyendo vehículo {}: {}", vehicle_id, e);
                return None;
            }
        };

        // Como máximo un mapeo a la vez: el anterior se reemplaza
        vehicle.fleetmatics_vehicle_id = Some(external_id.to_string());

        // Snapshot inmediato de ubicación (si la API la tiene)
        let snapshot = match self.api.fetch_vehicle_location(&config, &token, external_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("⚠️ No se pudo obtener snapshot inicial de {}: {}", external_id, e);
                None
            }
        };

        if let Some(location) = snapshot.clone() {
            vehicle.last_latitude = Some(location.latitude);
            vehicle.last_longitude = Some(location.longitude);
            vehicle.last_location_update = Some(location.event_time);
        }

        if let Err(e) = self.storage.update_technician_vehicle(&vehicle).await {
            log::error!("❌ Error guardando mapeo del vehículo {}: {}", vehicle_id, e);
            return None;
        }

        if let Some(location) = snapshot {
            let history = NewLocationHistory {
                vehicle_id: vehicle.id,
                latitude: location.latitude,
                longitude: location.longitude,
                speed: location.speed,
                heading: location.heading,
                event_time: location.event_time,
                odometer: location.odometer.and_then(Decimal::from_f64_retain),
                external_event_id: location.event_id,
            };
            if let Err(e) = self.storage.create_location_history(history).await {
                log::warn!("⚠️ Snapshot inicial no se pudo persistir: {}", e);
            }
        }

        log::info!("🔗 Vehículo {} mapeado a Fleetmatics '{}'", vehicle_id, external_id);
        Some(vehicle)
    }

    /// Desvincular un vehículo: limpia fleetmatics_vehicle_id sin tocar el
    /// historial previo.
    pub async fn unmap_vehicle(&self, vehicle_id: Uuid) -> bool {
        let mut vehicle = match self.storage.get_technician_vehicle(vehicle_id).await {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => {
                log::warn!("⚠️ Vehículo interno {} no encontrado", vehicle_id);
                return false;
            }
            Err(e) => {
                log::error!("❌ Error leyendo vehículo {}: {}", vehicle_id, e);
                return false;
            }
        };

        vehicle.fleetmatics_vehicle_id = None;

        match self.storage.update_technician_vehicle(&vehicle).await {
            Ok(()) => {
                log::info!("🔓 Vehículo {} desvinculado de Fleetmatics", vehicle_id);
                true
            }
            Err(e) => {
                log::error!("❌ Error desvinculando vehículo {}: {}", vehicle_id, e);
                false
            }
        }
    }

    /// Historial externo de un vehículo mapeado. Cualquier fallo degrada a
    /// lista vacía.
    pub async fn get_vehicle_history(
        &self,
        vehicle_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Vec<FleetLocation> {
        let config = match self.config.read().await.clone() {
            Some(config) => config,
            None => return Vec::new(),
        };

        let external_id = match self.storage.get_technician_vehicle(vehicle_id).await {
            Ok(Some(vehicle)) => match vehicle.fleetmatics_vehicle_id {
                Some(external_id) => external_id,
                None => {
                    log::warn!("⚠️ Vehículo {} no está mapeado, sin historial externo", vehicle_id);
                    return Vec::new();
                }
            },
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::error!("❌ Error leyendo vehículo {}: {}", vehicle_id, e);
                return Vec::new();
            }
        };

        let token = match self.ensure_token().await {
            Some(token) => token,
            None => return Vec::new(),
        };

        match self
            .api
            .fetch_vehicle_history(&config, &token, &external_id, start_time, end_time)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                log::error!("❌ Error consultando historial externo de {}: {}", external_id, e);
                Vec::new()
            }
        }
    }

    /// Arrancar el timer de sincronización: un sync inmediato y luego uno
    /// cada sync_frequency_minutes.
    pub async fn start_sync(self: Arc<Self>) {
        let frequency = self
            .config
            .read()
            .await
            .as_ref()
            .map(|c| c.sync_frequency_minutes)
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SYNC_FREQUENCY_MINUTES) as u64;

        let mut task = self.sync_task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }

        log::info!("⏰ Sincronización Fleetmatics cada {} minutos", frequency);

        let service = Arc::clone(&self);
        *task = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(frequency * 60));
            loop {
                // El primer tick dispara inmediatamente: ese es el sync de arranque
                interval.tick().await;
                service.sync_vehicle_locations().await;
            }
        }));
    }

    /// Detener el timer. Las llamadas HTTP en curso no se cancelan; el guard
    /// de solapamiento lo libera el propio ciclo al terminar.
    pub async fn stop_sync(&self) {
        let mut task = self.sync_task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            log::info!("🛑 Timer de sincronización Fleetmatics detenido");
        }
        *self.state.write().await = SyncState::Stopped;
    }

    /// Estado observable del servicio
    pub async fn status(&self) -> FleetmaticsStatus {
        let config = self.config.read().await.clone();
        FleetmaticsStatus {
            state: *self.state.read().await,
            organization_id: config.as_ref().map(|c| c.organization_id),
            is_active: config.as_ref().map(|c| c.is_active).unwrap_or(false),
            sync_frequency_minutes: config
                .as_ref()
                .map(|c| c.sync_frequency_minutes)
                .unwrap_or(DEFAULT_SYNC_FREQUENCY_MINUTES),
            token_expires_at: config.and_then(|c| c.token_expires_at),
            sync_in_flight: self.sync_in_flight.load(Ordering::SeqCst),
        }
    }

    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Token utilizable para la próxima llamada saliente. Verifica expiración
    /// con margen de 5 minutos y refresca/re-autentica de forma transparente.
    /// None significa "sin datos": el llamador degrada, no falla.
    async fn ensure_token(&self) -> Option<String> {
        let config = self.config.read().await.clone()?;

        if config.has_valid_token(Utc::now()) {
            return config.access_token;
        }

        self.refresh_or_reauthenticate().await
    }

    /// Refrescar el token; si el refresh falla (o no hay refresh token),
    /// re-autenticación completa con client_credentials.
    async fn refresh_or_reauthenticate(&self) -> Option<String> {
        let config = self.config.read().await.clone()?;
        let previous_state = *self.state.read().await;

        if let Some(refresh_token) = config.refresh_token.clone() {
            *self.state.write().await = SyncState::Refreshing;
            match self
                .api
                .request_token(&config, TokenGrant::RefreshToken(refresh_token))
                .await
            {
                Ok(tokens) => {
                    let access_token = self.apply_token(tokens).await?;
                    *self.state.write().await = SyncState::Active;
                    log::info!("🔄 Token Fleetmatics refrescado");
                    return Some(access_token);
                }
                Err(e) => {
                    log::warn!("⚠️ Refresh de token falló, re-autenticando: {}", e);
                }
            }
        }

        *self.state.write().await = SyncState::Authenticating;
        match self
            .api
            .request_token(&config, TokenGrant::ClientCredentials)
            .await
        {
            Ok(tokens) => {
                let access_token = self.apply_token(tokens).await?;
                *self.state.write().await = SyncState::Active;
                log::info!("🔑 Re-autenticación Fleetmatics exitosa");
                Some(access_token)
            }
            Err(e) => {
                log::error!("❌ Re-autenticación Fleetmatics falló: {}", e);
                *self.state.write().await = previous_state;
                None
            }
        }
    }

    /// Aplicar un TokenResponse a la configuración en memoria y persistirla
    async fn apply_token(&self, tokens: TokenResponse) -> Option<String> {
        let snapshot = {
            let mut guard = self.config.write().await;
            let config = guard.as_mut()?;
            config.access_token = Some(tokens.access_token.clone());
            if let Some(refresh_token) = tokens.refresh_token {
                config.refresh_token = Some(refresh_token);
            }
            config.token_type = Some(tokens.token_type);
            config.token_expires_at = Some(Utc::now() + Duration::seconds(tokens.expires_in));
            config.updated_at = Utc::now();
            config.clone()
        };

        // El token sigue siendo utilizable en memoria aunque no se persista
        if let Err(e) = self.storage.update_config(&snapshot).await {
            log::warn!("⚠️ No se pudo persistir el token Fleetmatics: {}", e);
        }

        Some(tokens.access_token)
    }
}
