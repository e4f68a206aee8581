use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use dotenvy::dotenv;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use fleet_tracking::cache::{CacheConfig, RedisClient};
use fleet_tracking::clients::FleetmaticsClient;
use fleet_tracking::config::EnvironmentConfig;
use fleet_tracking::database::DatabaseConnection;
use fleet_tracking::middleware::cors::{cors_middleware, cors_middleware_with_origins};
use fleet_tracking::repositories::PgFleetmaticsStorage;
use fleet_tracking::routes;
use fleet_tracking::services::{FleetmaticsService, MailerService};
use fleet_tracking::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("🏊 Fleet Tracking - integración GPS y notificaciones");
    info!("====================================================");

    let config = EnvironmentConfig::default();

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::new_default().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    let pool = db_connection.pool().clone();

    // Inicializar Redis y cache
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let redis_config = CacheConfig {
        redis_url,
        ..CacheConfig::default()
    };

    let redis_client = match RedisClient::new(redis_config).await {
        Ok(client) => client,
        Err(e) => {
            error!("❌ Error conectando a Redis: {}", e);
            return Err(anyhow::anyhow!("Error de Redis: {}", e));
        }
    };

    // Servicio de sincronización Fleetmatics con dependencias inyectadas.
    // El ciclo de vida es del host: initialize al arrancar, stop_sync al apagar.
    let storage = Arc::new(PgFleetmaticsStorage::new(pool.clone()));
    let api = Arc::new(FleetmaticsClient::new());
    let fleetmatics = Arc::new(FleetmaticsService::new(storage, api));

    if let Some(organization_id) = config.fleetmatics_organization_id {
        if Arc::clone(&fleetmatics).initialize(organization_id).await {
            info!("✅ Integración Fleetmatics activa para {}", organization_id);
        } else {
            info!("⏸️ Integración Fleetmatics deshabilitada para {}", organization_id);
        }
    } else {
        info!("ℹ️ FLEETMATICS_ORGANIZATION_ID no definido, sin sync al arrancar");
    }

    // Mailer Gmail (deshabilitado explícitamente si faltan credenciales)
    let mailer = Arc::new(MailerService::from_environment(&config));

    // Crear router de la API
    let cors = if config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(config.cors_origins.clone())
    };

    let app_state = AppState::new(
        pool,
        config.clone(),
        redis_client,
        Arc::clone(&fleetmatics),
        mailer,
    );

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/fleetmatics",
            routes::fleetmatics_routes::create_fleetmatics_router(),
        )
        .nest("/api/vehicle", routes::vehicle_routes::create_vehicle_router())
        .nest(
            "/api/notifications",
            routes::notification_routes::create_notification_router(),
        )
        .layer(cors)
        .with_state(app_state);

    // Puerto del servidor
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("🛰️ Endpoints - Fleetmatics:");
    info!("   PUT  /api/fleetmatics/config/:org - Guardar configuración");
    info!("   GET  /api/fleetmatics/config/:org - Leer configuración");
    info!("   POST /api/fleetmatics/initialize/:org - Inicializar integración");
    info!("   POST /api/fleetmatics/sync - Sincronización manual");
    info!("   GET  /api/fleetmatics/status - Estado del servicio de sync");
    info!("   POST /api/fleetmatics/vehicles/:id/map - Mapear vehículo");
    info!("   DELETE /api/fleetmatics/vehicles/:id/map - Desvincular vehículo");
    info!("   GET  /api/fleetmatics/vehicles/:id/location - Última posición");
    info!("   GET  /api/fleetmatics/vehicles/:id/history - Historial externo");
    info!("🚗 Endpoints - Vehicle:");
    info!("   POST /api/vehicle - Crear vehículo");
    info!("   GET  /api/vehicle - Listar vehículos");
    info!("   GET  /api/vehicle/:id - Obtener vehículo");
    info!("   PUT  /api/vehicle/:id - Actualizar vehículo");
    info!("   DELETE /api/vehicle/:id - Eliminar vehículo");
    info!("📧 Endpoints - Notificaciones:");
    info!("   POST /api/notifications/email - Enviar correo");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Apagado ordenado: detener el timer de sincronización
    fleetmatics.stop_sync().await;
    info!("👋 Servidor detenido");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("❌ Error esperando señal de apagado: {}", e);
    }
    info!("🛑 Señal de apagado recibida");
}

/// Health check: base de datos y Redis
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let redis_ok = state.redis.is_connected().await;

    Json(json!({
        "status": if database_ok && redis_ok { "healthy" } else { "degraded" },
        "database": database_ok,
        "redis": redis_ok,
        "mailer_enabled": state.mailer.is_enabled(),
    }))
}
