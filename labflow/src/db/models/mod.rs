//! Database record models matching table schemas.
//!
//! Database models are kept apart from the API models in [`crate::api::models`] so storage and
//! wire representations can change independently. Requests are named `*DBRequest` and rows
//! `*DBResponse`.

pub mod analyses;
pub mod clients;
pub mod custom_benchmarks;
pub mod settings;
pub mod users;
