use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::clients::FleetLocation;
use crate::controllers::FleetmaticsController;
use crate::dto::fleetmatics_dto::{
    FleetmaticsConfigResponse, HistoryQuery, MapVehicleRequest, UpsertFleetmaticsConfigRequest,
    VehicleLocationResponse,
};
use crate::dto::vehicle_dto::TechnicianVehicleResponse;
use crate::dto::ApiResponse;
use crate::services::{FleetmaticsStatus, LocationCacheService};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_fleetmatics_router() -> Router<AppState> {
    Router::new()
        .route("/config/:organization_id", put(upsert_config))
        .route("/config/:organization_id", get(get_config))
        .route("/initialize/:organization_id", post(initialize))
        .route("/sync", post(trigger_sync))
        .route("/status", get(get_status))
        .route("/vehicles/:id/map", post(map_vehicle))
        .route("/vehicles/:id/map", delete(unmap_vehicle))
        .route("/vehicles/:id/location", get(latest_location))
        .route("/vehicles/:id/history", get(vehicle_history))
}

async fn upsert_config(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
    Json(request): Json<UpsertFleetmaticsConfigRequest>,
) -> Result<Json<ApiResponse<FleetmaticsConfigResponse>>, AppError> {
    let controller = FleetmaticsController::new(state.pool.clone());
    let response = controller.upsert_config(organization_id, request).await?;
    Ok(Json(response))
}

async fn get_config(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<FleetmaticsConfigResponse>, AppError> {
    let controller = FleetmaticsController::new(state.pool.clone());
    let response = controller.get_config(organization_id).await?;
    Ok(Json(response))
}

async fn initialize(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Json<serde_json::Value> {
    let initialized = state.fleetmatics.clone().initialize(organization_id).await;
    Json(serde_json::json!({
        "success": initialized,
        "initialized": initialized
    }))
}

/// Ciclo de sincronización manual. `synced: false` también cubre los casos
/// benignos (sin vehículos mapeados, respuesta externa vacía, ciclo en curso).
async fn trigger_sync(State(state): State<AppState>) -> Json<serde_json::Value> {
    let synced = state.fleetmatics.sync_vehicle_locations().await;
    Json(serde_json::json!({
        "success": true,
        "synced": synced
    }))
}

async fn get_status(State(state): State<AppState>) -> Json<FleetmaticsStatus> {
    Json(state.fleetmatics.status().await)
}

async fn map_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MapVehicleRequest>,
) -> Result<Json<ApiResponse<TechnicianVehicleResponse>>, AppError> {
    request.validate()?;

    match state
        .fleetmatics
        .map_vehicle(id, &request.fleetmatics_vehicle_id)
        .await
    {
        Some(vehicle) => Ok(Json(ApiResponse::success_with_message(
            vehicle.into(),
            "Vehículo mapeado exitosamente".to_string(),
        ))),
        None => Err(AppError::NotFound(
            "Vehículo externo desconocido o integración no disponible".to_string(),
        )),
    }
}

async fn unmap_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.fleetmatics.unmap_vehicle(id).await {
        return Err(AppError::NotFound("Vehículo no encontrado".to_string()));
    }

    // La posición cacheada ya no representa un vehículo rastreado
    let cache = LocationCacheService::new(state.redis.clone());
    if let Err(e) = cache.invalidate_location(id).await {
        log::warn!("⚠️ No se pudo invalidar el caché de posición: {}", e);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Vehículo desvinculado, el historial se conserva"
    })))
}

async fn latest_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VehicleLocationResponse>, AppError> {
    let controller = FleetmaticsController::new(state.pool.clone());
    let cache = LocationCacheService::new(state.redis.clone());
    let response = controller.latest_location(id, &cache).await?;
    Ok(Json(response))
}

async fn vehicle_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<FleetLocation>>, AppError> {
    if query.end_time <= query.start_time {
        return Err(AppError::BadRequest(
            "end_time debe ser posterior a start_time".to_string(),
        ));
    }

    let history = state
        .fleetmatics
        .get_vehicle_history(id, query.start_time, query.end_time)
        .await;
    Ok(Json(history))
}
