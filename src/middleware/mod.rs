//! Middleware
//!
//! Capas compartidas del router.

pub mod cors;
