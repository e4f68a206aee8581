//! Controllers
//!
//! Orquestan los repositorios y servicios detrás de los endpoints HTTP.

pub mod fleetmatics_controller;
pub mod vehicle_controller;

pub use fleetmatics_controller::FleetmaticsController;
pub use vehicle_controller::VehicleController;
