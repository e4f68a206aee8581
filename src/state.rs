//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use sqlx::PgPool;
use std::sync::Arc;

use crate::cache::RedisClient;
use crate::config::EnvironmentConfig;
use crate::services::{FleetmaticsService, MailerService};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: EnvironmentConfig,
    pub redis: RedisClient,
    pub fleetmatics: Arc<FleetmaticsService>,
    pub mailer: Arc<MailerService>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: EnvironmentConfig,
        redis: RedisClient,
        fleetmatics: Arc<FleetmaticsService>,
        mailer: Arc<MailerService>,
    ) -> Self {
        Self {
            pool,
            config,
            redis,
            fleetmatics,
            mailer,
        }
    }
}
