//! DTOs de la API
//!
//! Requests y responses de los endpoints HTTP.

pub mod common_dto;
pub mod fleetmatics_dto;
pub mod vehicle_dto;

pub use common_dto::ApiResponse;
