//! Backend de rastreo de flota para la aplicación de gestión de servicio
//! de piscinas: integración Fleetmatics (tokens OAuth2, sincronización de
//! ubicaciones, mapeo de vehículos) y envío de correo vía Gmail.

pub mod cache;
pub mod clients;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
