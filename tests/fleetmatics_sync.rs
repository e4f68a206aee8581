//! Tests del servicio de sincronización Fleetmatics sobre implementaciones
//! en memoria del almacenamiento y de la API externa.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use fleet_tracking::clients::{
    FleetApi, FleetApiError, FleetLocation, FleetVehicle, TokenGrant, TokenResponse,
};
use fleet_tracking::models::{
    FleetmaticsConfig, FleetmaticsLocationHistory, NewLocationHistory, SyncState,
    TechnicianVehicle,
};
use fleet_tracking::repositories::FleetmaticsStorage;
use fleet_tracking::services::FleetmaticsService;
use fleet_tracking::utils::errors::AppResult;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeStorage {
    config: Mutex<Option<FleetmaticsConfig>>,
    vehicles: Mutex<Vec<TechnicianVehicle>>,
    history: Mutex<Vec<NewLocationHistory>>,
    vehicle_updates: AtomicUsize,
}

impl FakeStorage {
    fn with_config(config: FleetmaticsConfig) -> Self {
        Self {
            config: Mutex::new(Some(config)),
            ..Default::default()
        }
    }

    fn add_vehicle(&self, vehicle: TechnicianVehicle) {
        self.vehicles.lock().unwrap().push(vehicle);
    }

    fn vehicle(&self, id: Uuid) -> Option<TechnicianVehicle> {
        self.vehicles.lock().unwrap().iter().find(|v| v.id == id).cloned()
    }

    fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    fn stored_access_token(&self) -> Option<String> {
        self.config.lock().unwrap().as_ref().and_then(|c| c.access_token.clone())
    }
}

#[async_trait]
impl FleetmaticsStorage for FakeStorage {
    async fn get_config_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<FleetmaticsConfig>> {
        Ok(self
            .config
            .lock()
            .unwrap()
            .clone()
            .filter(|c| c.organization_id == organization_id))
    }

    async fn update_config(&self, config: &FleetmaticsConfig) -> AppResult<()> {
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn get_all_technician_vehicles(&self) -> AppResult<Vec<TechnicianVehicle>> {
        Ok(self.vehicles.lock().unwrap().clone())
    }

    async fn get_technician_vehicle(&self, id: Uuid) -> AppResult<Option<TechnicianVehicle>> {
        Ok(self.vehicle(id))
    }

    async fn update_technician_vehicle(&self, vehicle: &TechnicianVehicle) -> AppResult<()> {
        let mut vehicles = self.vehicles.lock().unwrap();
        if let Some(existing) = vehicles.iter_mut().find(|v| v.id == vehicle.id) {
            *existing = vehicle.clone();
            self.vehicle_updates.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn create_location_history(&self, row: NewLocationHistory) -> AppResult<()> {
        self.history.lock().unwrap().push(row);
        Ok(())
    }

    async fn get_latest_location_by_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> AppResult<Option<FleetmaticsLocationHistory>> {
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|row| row.vehicle_id == vehicle_id)
            .max_by_key(|row| row.event_time)
            .map(|row| FleetmaticsLocationHistory {
                id: Uuid::new_v4(),
                vehicle_id: row.vehicle_id,
                latitude: row.latitude,
                longitude: row.longitude,
                speed: row.speed,
                heading: row.heading,
                event_time: row.event_time,
                odometer: row.odometer,
                external_event_id: row.external_event_id.clone(),
                created_at: Utc::now(),
            }))
    }
}

#[derive(Default)]
struct FakeApi {
    fleet: Vec<FleetVehicle>,
    locations: Vec<FleetLocation>,
    fail_refresh: bool,
    fail_auth: bool,
    location_delay_ms: u64,
    grants: Mutex<Vec<String>>,
    location_calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeApi {
    fn grants(&self) -> Vec<String> {
        self.grants.lock().unwrap().clone()
    }

    fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FleetApi for FakeApi {
    async fn request_token(
        &self,
        _config: &FleetmaticsConfig,
        grant: TokenGrant,
    ) -> Result<TokenResponse, FleetApiError> {
        match grant {
            TokenGrant::RefreshToken(_) => {
                self.grants.lock().unwrap().push("refresh_token".to_string());
                if self.fail_refresh {
                    return Err(FleetApiError::AuthRejected("refresh rejected".to_string()));
                }
            }
            TokenGrant::ClientCredentials => {
                self.grants.lock().unwrap().push("client_credentials".to_string());
                if self.fail_auth {
                    return Err(FleetApiError::AuthRejected("bad credentials".to_string()));
                }
            }
        }

        Ok(TokenResponse {
            access_token: "fresh-token".to_string(),
            refresh_token: Some("fresh-refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
    }

    async fn fetch_vehicles(
        &self,
        _config: &FleetmaticsConfig,
        _token: &str,
    ) -> Result<Vec<FleetVehicle>, FleetApiError> {
        Ok(self.fleet.clone())
    }

    async fn fetch_vehicle_location(
        &self,
        _config: &FleetmaticsConfig,
        _token: &str,
        external_id: &str,
    ) -> Result<Option<FleetLocation>, FleetApiError> {
        Ok(self.locations.iter().find(|l| l.vehicle_id == external_id).cloned())
    }

    async fn fetch_all_locations(
        &self,
        _config: &FleetmaticsConfig,
        token: &str,
    ) -> Result<Vec<FleetLocation>, FleetApiError> {
        self.tokens_seen.lock().unwrap().push(token.to_string());
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        if self.location_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.location_delay_ms)).await;
        }
        Ok(self.locations.clone())
    }

    async fn fetch_vehicle_history(
        &self,
        _config: &FleetmaticsConfig,
        _token: &str,
        external_id: &str,
        _start_time: DateTime<Utc>,
        _end_time: DateTime<Utc>,
    ) -> Result<Vec<FleetLocation>, FleetApiError> {
        Ok(self
            .locations
            .iter()
            .filter(|l| l.vehicle_id == external_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config(organization_id: Uuid, token_expires_at: Option<DateTime<Utc>>) -> FleetmaticsConfig {
    let now = Utc::now();
    FleetmaticsConfig {
        id: Uuid::new_v4(),
        organization_id,
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        account_id: "ACC-1".to_string(),
        base_url: "https://fleet.example.com".to_string(),
        access_token: token_expires_at.map(|_| "old-token".to_string()),
        refresh_token: Some("old-refresh".to_string()),
        token_type: Some("Bearer".to_string()),
        token_expires_at,
        sync_frequency_minutes: 15,
        // is_active=false: el timer no arranca y los tests controlan cada sync
        is_active: false,
        created_at: now,
        updated_at: now,
    }
}

fn test_vehicle(external_id: Option<&str>) -> TechnicianVehicle {
    TechnicianVehicle {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        technician_id: None,
        name: "Camioneta 1".to_string(),
        license_plate: Some("ABC-123".to_string()),
        fleetmatics_vehicle_id: external_id.map(|s| s.to_string()),
        last_latitude: None,
        last_longitude: None,
        last_location_update: None,
        created_at: Utc::now(),
    }
}

fn external_location(external_id: &str, latitude: f64, longitude: f64) -> FleetLocation {
    FleetLocation {
        vehicle_id: external_id.to_string(),
        latitude,
        longitude,
        speed: Some(35.0),
        heading: Some(90.0),
        event_time: Utc::now(),
        odometer: Some(120500.0),
        event_id: Some(format!("evt-{}", external_id)),
    }
}

fn valid_expiry() -> Option<DateTime<Utc>> {
    Some(Utc::now() + Duration::hours(1))
}

async fn initialized_service(
    storage: Arc<FakeStorage>,
    api: Arc<FakeApi>,
    organization_id: Uuid,
) -> Arc<FleetmaticsService> {
    let service = Arc::new(FleetmaticsService::new(
        storage as Arc<dyn FleetmaticsStorage>,
        api as Arc<dyn FleetApi>,
    ));
    assert!(service.clone().initialize(organization_id).await);
    service
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_initialize_without_config_is_disabled() {
    let storage = Arc::new(FakeStorage::default());
    let api = Arc::new(FakeApi::default());
    let service = Arc::new(FleetmaticsService::new(
        storage as Arc<dyn FleetmaticsStorage>,
        api as Arc<dyn FleetApi>,
    ));

    assert!(!service.clone().initialize(Uuid::new_v4()).await);
    assert_eq!(service.state().await, SyncState::Uninitialized);
}

#[tokio::test]
async fn test_sync_with_no_mapped_vehicles_skips_external_call() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    storage.add_vehicle(test_vehicle(None));

    let api = Arc::new(FakeApi::default());
    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    assert!(!service.sync_vehicle_locations().await);
    assert_eq!(api.location_calls.load(Ordering::SeqCst), 0);
    assert_eq!(storage.vehicle_updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sync_updates_one_vehicle_and_one_history_row_per_match() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));

    let vehicle_a = test_vehicle(Some("ext-1"));
    let vehicle_b = test_vehicle(Some("ext-2"));
    let vehicle_c = test_vehicle(Some("ext-3")); // sin ubicación externa
    storage.add_vehicle(vehicle_a.clone());
    storage.add_vehicle(vehicle_b.clone());
    storage.add_vehicle(vehicle_c.clone());

    let api = Arc::new(FakeApi {
        locations: vec![
            external_location("ext-1", 25.76, -80.19),
            external_location("ext-2", 26.12, -80.14),
            external_location("ext-9", 0.0, 0.0), // externa sin mapeo interno
        ],
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    assert!(service.sync_vehicle_locations().await);

    // Exactamente una actualización y una fila de historial por vehículo
    // presente en ambos conjuntos
    assert_eq!(storage.vehicle_updates.load(Ordering::SeqCst), 2);
    assert_eq!(storage.history_len(), 2);

    let updated_a = storage.vehicle(vehicle_a.id).unwrap();
    assert_eq!(updated_a.last_latitude, Some(25.76));
    assert_eq!(updated_a.last_longitude, Some(-80.19));
    assert!(updated_a.last_location_update.is_some());

    // El vehículo sin ubicación externa se salta en silencio
    let untouched_c = storage.vehicle(vehicle_c.id).unwrap();
    assert_eq!(untouched_c.last_latitude, None);
    assert_eq!(untouched_c.fleetmatics_vehicle_id, Some("ext-3".to_string()));
}

#[tokio::test]
async fn test_sync_with_empty_external_response_is_noop() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    storage.add_vehicle(test_vehicle(Some("ext-1")));

    let api = Arc::new(FakeApi::default());
    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    assert!(!service.sync_vehicle_locations().await);
    assert_eq!(api.location_calls.load(Ordering::SeqCst), 1);
    assert_eq!(storage.vehicle_updates.load(Ordering::SeqCst), 0);
    assert_eq!(storage.history_len(), 0);
}

#[tokio::test]
async fn test_map_vehicle_with_unknown_external_id_writes_nothing() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    let vehicle = test_vehicle(None);
    storage.add_vehicle(vehicle.clone());

    let api = Arc::new(FakeApi {
        fleet: vec![FleetVehicle {
            id: "ext-1".to_string(),
            name: Some("Truck".to_string()),
            registration: None,
        }],
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    assert!(service.map_vehicle(vehicle.id, "ghost").await.is_none());
    assert_eq!(storage.vehicle_updates.load(Ordering::SeqCst), 0);
    assert_eq!(storage.history_len(), 0);
    assert_eq!(storage.vehicle(vehicle.id).unwrap().fleetmatics_vehicle_id, None);
}

#[tokio::test]
async fn test_map_vehicle_stores_mapping_and_snapshot() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    let vehicle = test_vehicle(None);
    storage.add_vehicle(vehicle.clone());

    let api = Arc::new(FakeApi {
        fleet: vec![FleetVehicle {
            id: "ext-1".to_string(),
            name: Some("Truck".to_string()),
            registration: None,
        }],
        locations: vec![external_location("ext-1", 25.76, -80.19)],
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    let mapped = service.map_vehicle(vehicle.id, "ext-1").await.unwrap();
    assert_eq!(mapped.fleetmatics_vehicle_id, Some("ext-1".to_string()));
    assert_eq!(mapped.last_latitude, Some(25.76));

    // El snapshot inmediato queda en el historial
    assert_eq!(storage.history_len(), 1);
    let stored = storage.vehicle(vehicle.id).unwrap();
    assert_eq!(stored.fleetmatics_vehicle_id, Some("ext-1".to_string()));
}

#[tokio::test]
async fn test_unmap_clears_mapping_but_preserves_history() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    let vehicle = test_vehicle(Some("ext-1"));
    storage.add_vehicle(vehicle.clone());

    let api = Arc::new(FakeApi {
        locations: vec![external_location("ext-1", 25.76, -80.19)],
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    // Dos ciclos de sincronización generan dos filas de historial
    assert!(service.sync_vehicle_locations().await);
    assert!(service.sync_vehicle_locations().await);
    assert_eq!(storage.history_len(), 2);

    assert!(service.unmap_vehicle(vehicle.id).await);

    let unmapped = storage.vehicle(vehicle.id).unwrap();
    assert_eq!(unmapped.fleetmatics_vehicle_id, None);

    // El historial previo sigue consultable
    assert_eq!(storage.history_len(), 2);
    let latest = storage.get_latest_location_by_vehicle(vehicle.id).await.unwrap();
    assert!(latest.is_some());
}

#[tokio::test]
async fn test_refresh_failure_falls_back_to_reauthentication() {
    let organization_id = Uuid::new_v4();
    // Token ya expirado: initialize tiene que renovar credenciales
    let expired = Some(Utc::now() - Duration::minutes(1));
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, expired)));
    storage.add_vehicle(test_vehicle(Some("ext-1")));

    let api = Arc::new(FakeApi {
        fail_refresh: true,
        locations: vec![external_location("ext-1", 25.76, -80.19)],
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    // refresh falló, la re-autenticación completa lo salvó
    assert_eq!(api.grants(), vec!["refresh_token", "client_credentials"]);
    assert_eq!(service.state().await, SyncState::Active);

    // El bearer token nuevo es utilizable en la siguiente llamada
    assert!(service.sync_vehicle_locations().await);
    assert_eq!(api.tokens_seen(), vec!["fresh-token"]);
    assert_eq!(storage.stored_access_token(), Some("fresh-token".to_string()));
}

#[tokio::test]
async fn test_total_auth_failure_disables_initialization() {
    let organization_id = Uuid::new_v4();
    let expired = Some(Utc::now() - Duration::minutes(1));
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, expired)));

    let api = Arc::new(FakeApi {
        fail_refresh: true,
        fail_auth: true,
        ..Default::default()
    });

    let service = Arc::new(FleetmaticsService::new(
        storage as Arc<dyn FleetmaticsStorage>,
        api as Arc<dyn FleetApi>,
    ));

    assert!(!service.clone().initialize(organization_id).await);
    assert_eq!(service.state().await, SyncState::Uninitialized);
}

#[tokio::test]
async fn test_overlapping_sync_cycles_are_skipped() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    storage.add_vehicle(test_vehicle(Some("ext-1")));

    let api = Arc::new(FakeApi {
        locations: vec![external_location("ext-1", 25.76, -80.19)],
        location_delay_ms: 200,
        ..Default::default()
    });

    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    let first = service.clone();
    let second = service.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.sync_vehicle_locations().await }),
        tokio::spawn(async move { second.sync_vehicle_locations().await }),
    );

    let results = [a.unwrap(), b.unwrap()];
    assert_eq!(results.iter().filter(|ok| **ok).count(), 1, "solo un ciclo debe correr");
    assert_eq!(api.location_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_history_proxy_degrades_to_empty_for_unmapped_vehicle() {
    let organization_id = Uuid::new_v4();
    let storage = Arc::new(FakeStorage::with_config(test_config(organization_id, valid_expiry())));
    let vehicle = test_vehicle(None);
    storage.add_vehicle(vehicle.clone());

    let api = Arc::new(FakeApi::default());
    let service = initialized_service(storage.clone(), api.clone(), organization_id).await;

    let history = service
        .get_vehicle_history(vehicle.id, Utc::now() - Duration::hours(2), Utc::now())
        .await;
    assert!(history.is_empty());
}
