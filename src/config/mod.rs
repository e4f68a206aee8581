//! Configuración
//!
//! Este módulo contiene la configuración del entorno de la aplicación.

pub mod environment;

pub use environment::EnvironmentConfig;
