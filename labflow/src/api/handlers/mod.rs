//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its input, runs repository operations inside a transaction scoped to
//! the authenticated user (see [`crate::db::begin_scoped`]) and converts the result into an API
//! model. Rows that belong to another user are reported as not found.
//!
//! # Handler Modules
//!
//! - [`auth`]: registration, login and logout
//! - [`users`]: the authenticated user
//! - [`settings`]: per-user settings, including the stored extraction API key
//! - [`clients`]: client CRUD, trends and matching
//! - [`uploads`]: report upload, extraction and automatic matching
//! - [`analyses`]: confirmation, listing and deletion of stored analyses
//! - [`benchmarks`]: custom benchmark CRUD and default seeding
//!
//! # Authentication
//!
//! Handlers taking a [`crate::api::models::users::CurrentUser`] argument require a session,
//! presented as the session cookie or an `Authorization: Bearer` header.

pub mod analyses;
pub mod auth;
pub mod benchmarks;
pub mod clients;
pub mod settings;
pub mod uploads;
pub mod users;
