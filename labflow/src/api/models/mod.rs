//! Request and response payloads of the HTTP API.
//!
//! API models are separate from [`crate::db::models`]: they carry `utoipa` schemas and serde
//! attributes for the wire format, and convert from the database models with `From`.

pub mod analyses;
pub mod auth;
pub mod benchmarks;
pub mod clients;
pub mod pagination;
pub mod settings;
pub mod uploads;
pub mod users;
