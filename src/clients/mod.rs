//! Clientes HTTP externos
//!
//! Este módulo contiene los clientes para APIs de terceros.

pub mod fleetmatics_client;

pub use fleetmatics_client::{
    FleetApi, FleetApiError, FleetLocation, FleetVehicle, FleetmaticsClient, TokenGrant,
    TokenResponse,
};
