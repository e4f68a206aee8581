//! Repositorios de acceso a datos
//!
//! Este módulo contiene los repositorios que encapsulan el acceso
//! a PostgreSQL.

pub mod fleetmatics_repository;
pub mod technician_vehicle_repository;

pub use fleetmatics_repository::{FleetmaticsStorage, PgFleetmaticsStorage};
pub use technician_vehicle_repository::TechnicianVehicleRepository;
