//! Rutas de la API
//!
//! Routers por recurso, anidados bajo /api en main.

pub mod fleetmatics_routes;
pub mod notification_routes;
pub mod vehicle_routes;
