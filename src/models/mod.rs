//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL con las convenciones estándar.

pub mod fleetmatics;
pub mod technician_vehicle;

pub use fleetmatics::{
    FleetmaticsConfig, FleetmaticsLocationHistory, NewLocationHistory, SyncState,
};
pub use technician_vehicle::TechnicianVehicle;
