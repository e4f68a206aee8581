//! Services module
//!
//! Este módulo contiene la lógica de negocio y servicios de la aplicación.
//! Los servicios encapsulan operaciones complejas que pueden involucrar
//! múltiples modelos o integraciones externas.

pub mod fleetmatics_service;
pub mod location_cache_service;
pub mod mailer_service;

pub use fleetmatics_service::{FleetmaticsService, FleetmaticsStatus, DEFAULT_SYNC_FREQUENCY_MINUTES};
pub use location_cache_service::{CachedVehicleLocation, LocationCacheService};
pub use mailer_service::{GmailCredentials, MailOutcome, MailerService};
