//! Repository implementations for database access.
//!
//! Each repository wraps a connection or transaction and returns models from
//! [`crate::db::models`]. Owner-scoped repositories take the owning user's id at construction
//! and put it in every statement.
//!
//! # Available Repositories
//!
//! - [`Users`]: accounts and credential lookup
//! - [`Settings`]: the per-user settings row
//! - [`Clients`]: the people lab reports belong to
//! - [`Analyses`]: confirmed lab report extractions
//! - [`CustomBenchmarks`]: per-user optimal ranges
//!
//! # Common Pattern
//!
//! ```ignore
//! use labflow::db::handlers::{Clients, Repository};
//!
//! let mut tx = labflow::db::begin_scoped(&pool, user_id).await?;
//! let client = Clients::new(&mut tx, user_id).get_by_id(client_id).await?;
//! tx.commit().await?;
//! ```

pub mod analyses;
pub mod clients;
pub mod custom_benchmarks;
pub mod repository;
pub mod settings;
pub mod users;

pub use analyses::Analyses;
pub use clients::Clients;
pub use custom_benchmarks::CustomBenchmarks;
pub use repository::Repository;
pub use settings::Settings;
pub use users::Users;
